mod parse;
mod response;

use std::io::{Read, Write};
use std::time::{Duration, Instant};

pub use parse::parse_request;
pub use response::read_response;

use crate::error::Error;

/// A parsed raw HTTP/1.1 request, ready to be rendered to wire bytes.
#[derive(Debug, Clone)]
pub struct Request {
	pub method: String,
	pub path: String,
	pub version: String,
	pub headers: Vec<(String, String)>,
	pub body: Vec<u8>,
}

impl Request {
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
	}

	/// Renders the request to CRLF-terminated wire bytes, defaulting `Host`
	/// from `default_host` and filling in `Content-Length` when a body is
	/// present and the header was not already rendered by the template.
	pub fn to_wire_bytes(&self, default_host: &str) -> Vec<u8> {
		let mut out = format!("{} {} {}\r\n", self.method, self.path, self.version);
		let mut saw_host = false;
		let mut saw_content_length = false;
		for (k, v) in &self.headers {
			if k.eq_ignore_ascii_case("host") {
				saw_host = true;
			}
			if k.eq_ignore_ascii_case("content-length") {
				saw_content_length = true;
			}
			out.push_str(&format!("{k}: {v}\r\n"));
		}
		if !saw_host {
			out.push_str(&format!("Host: {default_host}\r\n"));
		}
		if !saw_content_length && !self.body.is_empty() {
			out.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
		}
		out.push_str("\r\n");
		let mut bytes = out.into_bytes();
		bytes.extend_from_slice(&self.body);
		bytes
	}
}

#[derive(Debug, Clone)]
pub struct Response {
	pub status: u16,
	pub reason: String,
	pub headers: Vec<(String, String)>,
	pub body: Vec<u8>,
	pub elapsed_ms: u64,
	pub started_at_ns: u64,
}

impl Response {
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
	}
}

/// Writes a rendered request and reads back a full response on the given
/// transport, enforcing `read_timeout`. `started_at` is the caller's release
/// instant, used to compute `elapsed_ms`.
pub fn send_and_receive<S: Read + Write>(stream: &mut S, wire: &[u8], read_timeout: Duration, started_at: Instant) -> Result<Response, Error> {
	stream.write_all(wire).map_err(|e| Error::http(format!("write failed: {e}")))?;
	let mut resp = read_response(stream, read_timeout)?;
	resp.elapsed_ms = started_at.elapsed().as_millis() as u64;
	Ok(resp)
}
