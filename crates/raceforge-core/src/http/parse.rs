use super::Request;
use crate::error::Error;

/// Parses a raw HTTP/1.1 request blob (as written in a config's `request`
/// field) into its parts. Accepts either CRLF or bare LF line endings.
pub fn parse_request(blob: &str) -> Result<Request, Error> {
	let normalized = blob.replace("\r\n", "\n");
	let mut lines = normalized.splitn(2, '\n');
	let request_line = lines.next().ok_or_else(|| Error::http("empty request"))?;
	let rest = lines.next().unwrap_or("");

	let mut parts = request_line.split_whitespace();
	let method = parts.next().ok_or_else(|| Error::http("missing method in request line"))?.to_string();
	let path = parts.next().ok_or_else(|| Error::http("missing path in request line"))?.to_string();
	let version = parts.next().unwrap_or("HTTP/1.1").to_string();

	let (header_block, body) = match rest.find("\n\n") {
		Some(idx) => (&rest[..idx], &rest[idx + 2..]),
		None => (rest, ""),
	};

	let mut headers = Vec::new();
	for line in header_block.lines() {
		if line.trim().is_empty() {
			continue;
		}
		let (name, value) = line.split_once(':').ok_or_else(|| Error::http(format!("malformed header line: {line}")))?;
		headers.push((name.trim().to_string(), value.trim().to_string()));
	}

	Ok(Request { method, path, version, headers, body: body.as_bytes().to_vec() })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_request_with_body() {
		let blob = "POST /login HTTP/1.1\nHost: example.com\nContent-Type: application/json\n\n{\"u\":\"a\"}";
		let req = parse_request(blob).unwrap();
		assert_eq!(req.method, "POST");
		assert_eq!(req.path, "/login");
		assert_eq!(req.header("Host"), Some("example.com"));
		assert_eq!(req.body, b"{\"u\":\"a\"}");
	}

	#[test]
	fn parses_bodyless_get() {
		let blob = "GET /health HTTP/1.1\nHost: example.com\n\n";
		let req = parse_request(blob).unwrap();
		assert_eq!(req.method, "GET");
		assert!(req.body.is_empty());
	}
}
