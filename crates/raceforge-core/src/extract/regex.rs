use regex::Regex;

use crate::context::Value;
use crate::error::Error;
use crate::http::Response;

/// Searches the response body; returns capture group 1 if the pattern has
/// one, else the whole match. Mirrors the reference extractor's coercion
/// order: bool, then int, then float, then string.
pub fn extract(pattern_data: &str, response: &Response) -> Result<Option<Value>, Error> {
	let re = Regex::new(pattern_data).map_err(|e| Error::Extract { pattern: format!("{pattern_data}: {e}") })?;
	let body = String::from_utf8_lossy(&response.body);
	let Some(caps) = re.captures(&body) else {
		return Ok(None);
	};
	let matched = if caps.len() > 1 {
		caps.get(1).map(|m| m.as_str())
	} else {
		caps.get(0).map(|m| m.as_str())
	};
	Ok(matched.map(Value::coerce_from_str))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::http::Response;

	fn response(body: &str) -> Response {
		Response { status: 200, reason: "OK".into(), headers: vec![], body: body.as_bytes().to_vec(), elapsed_ms: 0, started_at_ns: 0 }
	}

	#[test]
	fn extracts_capture_group() {
		let r = response("token=abc123;");
		let v = extract(r"token=(\w+);", &r).unwrap().unwrap();
		assert_eq!(v, Value::String("abc123".into()));
	}

	#[test]
	fn coerces_integers() {
		let r = response("count: 42");
		let v = extract(r"count: (\d+)", &r).unwrap().unwrap();
		assert_eq!(v, Value::Int(42));
	}

	#[test]
	fn missing_match_is_none() {
		let r = response("nothing here");
		assert!(extract(r"token=(\w+)", &r).unwrap().is_none());
	}
}
