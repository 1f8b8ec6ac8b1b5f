use std::io::Read;
use std::time::{Duration, Instant};

use super::Response;
use crate::error::Error;

/// Reads one full HTTP/1.1 response from `stream`, honoring either
/// `Content-Length` or `Transfer-Encoding: chunked` framing. `deadline` bounds
/// the whole read, not each individual `read()` call, since a slow server can
/// trickle bytes one at a time.
pub fn read_response<R: Read>(stream: &mut R, deadline: Duration) -> Result<Response, Error> {
	let start = Instant::now();
	let mut buf = Vec::new();
	let header_end = loop {
		if let Some(idx) = find_header_end(&buf) {
			break idx;
		}
		if start.elapsed() > deadline {
			return Err(Error::HttpTimeout { elapsed_ms: start.elapsed().as_millis() as u64 });
		}
		let mut chunk = [0u8; 4096];
		let n = stream.read(&mut chunk).map_err(|e| Error::http(format!("read failed: {e}")))?;
		if n == 0 {
			return Err(Error::http("connection closed before headers completed"));
		}
		buf.extend_from_slice(&chunk[..n]);
	};

	let header_text = String::from_utf8_lossy(&buf[..header_end]).to_string();
	let mut lines = header_text.lines();
	let status_line = lines.next().ok_or_else(|| Error::http("missing status line"))?;
	let (status, reason) = parse_status_line(status_line)?;

	let mut headers = Vec::new();
	for line in lines {
		if line.trim().is_empty() {
			continue;
		}
		if let Some((name, value)) = line.split_once(':') {
			headers.push((name.trim().to_string(), value.trim().to_string()));
		}
	}

	let body_so_far = buf[header_end + 4..].to_vec();
	let chunked = headers
		.iter()
		.any(|(k, v)| k.eq_ignore_ascii_case("transfer-encoding") && v.eq_ignore_ascii_case("chunked"));

	let body = if chunked {
		read_chunked_body(stream, body_so_far, start, deadline)?
	} else {
		let content_length = headers
			.iter()
			.find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
			.and_then(|(_, v)| v.trim().parse::<usize>().ok())
			.unwrap_or(0);
		read_fixed_body(stream, body_so_far, content_length, start, deadline)?
	};

	Ok(Response { status, reason, headers, body, elapsed_ms: 0, started_at_ns: 0 })
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
	buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_status_line(line: &str) -> Result<(u16, String), Error> {
	let mut parts = line.splitn(3, ' ');
	let _version = parts.next().ok_or_else(|| Error::http("missing HTTP version"))?;
	let status = parts
		.next()
		.ok_or_else(|| Error::http("missing status code"))?
		.parse::<u16>()
		.map_err(|_| Error::http("non-numeric status code"))?;
	let reason = parts.next().unwrap_or("").to_string();
	Ok((status, reason))
}

fn read_fixed_body<R: Read>(stream: &mut R, mut body: Vec<u8>, content_length: usize, start: Instant, deadline: Duration) -> Result<Vec<u8>, Error> {
	while body.len() < content_length {
		if start.elapsed() > deadline {
			return Err(Error::HttpTimeout { elapsed_ms: start.elapsed().as_millis() as u64 });
		}
		let mut chunk = [0u8; 4096];
		let n = stream.read(&mut chunk).map_err(|e| Error::http(format!("read failed: {e}")))?;
		if n == 0 {
			break;
		}
		body.extend_from_slice(&chunk[..n]);
	}
	if content_length > 0 {
		body.truncate(content_length);
	}
	Ok(body)
}

fn read_chunked_body<R: Read>(stream: &mut R, mut buf: Vec<u8>, start: Instant, deadline: Duration) -> Result<Vec<u8>, Error> {
	let mut out = Vec::new();
	loop {
		if start.elapsed() > deadline {
			return Err(Error::HttpTimeout { elapsed_ms: start.elapsed().as_millis() as u64 });
		}
		let Some(line_end) = buf.windows(2).position(|w| w == b"\r\n") else {
			fill(stream, &mut buf, start, deadline)?;
			continue;
		};
		let size_line = String::from_utf8_lossy(&buf[..line_end]).to_string();
		let size = usize::from_str_radix(size_line.trim(), 16).map_err(|_| Error::http("malformed chunk size"))?;
		let needed = line_end + 2 + size + 2;
		while buf.len() < needed {
			if start.elapsed() > deadline {
				return Err(Error::HttpTimeout { elapsed_ms: start.elapsed().as_millis() as u64 });
			}
			fill(stream, &mut buf, start, deadline)?;
		}
		if size == 0 {
			break;
		}
		out.extend_from_slice(&buf[line_end + 2..line_end + 2 + size]);
		buf = buf[needed..].to_vec();
	}
	Ok(out)
}

fn fill<R: Read>(stream: &mut R, buf: &mut Vec<u8>, start: Instant, deadline: Duration) -> Result<(), Error> {
	if start.elapsed() > deadline {
		return Err(Error::HttpTimeout { elapsed_ms: start.elapsed().as_millis() as u64 });
	}
	let mut chunk = [0u8; 4096];
	let n = stream.read(&mut chunk).map_err(|e| Error::http(format!("read failed: {e}")))?;
	if n == 0 {
		return Err(Error::http("connection closed mid-chunk"));
	}
	buf.extend_from_slice(&chunk[..n]);
	Ok(())
}
