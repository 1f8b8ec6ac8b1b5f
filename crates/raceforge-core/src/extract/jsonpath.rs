use serde_json::Value as Json;

use crate::context::Value;
use crate::error::Error;
use crate::http::Response;

/// Navigates a parsed JSON body by a dotted path with optional `[n]` index
/// segments, e.g. `data.items[0].id`.
pub fn extract(pattern_data: &str, response: &Response) -> Result<Option<Value>, Error> {
	let root: Json = match serde_json::from_slice(&response.body) {
		Ok(v) => v,
		Err(_) => return Ok(None),
	};
	let mut current = &root;
	for segment in parse_segments(pattern_data) {
		match segment {
			Segment::Key(key) => match current.get(&key) {
				Some(next) => current = next,
				None => return Ok(None),
			},
			Segment::Index(idx) => match current.get(idx) {
				Some(next) => current = next,
				None => return Ok(None),
			},
		}
	}
	Ok(json_to_value(current))
}

enum Segment {
	Key(String),
	Index(usize),
}

fn parse_segments(path: &str) -> Vec<Segment> {
	let mut segments = Vec::new();
	for part in path.split('.') {
		let mut rest = part;
		if let Some(bracket) = rest.find('[') {
			let key = &rest[..bracket];
			if !key.is_empty() {
				segments.push(Segment::Key(key.to_string()));
			}
			rest = &rest[bracket..];
			while let Some(open) = rest.find('[') {
				let close = match rest[open..].find(']') {
					Some(c) => open + c,
					None => break,
				};
				if let Ok(idx) = rest[open + 1..close].parse::<usize>() {
					segments.push(Segment::Index(idx));
				}
				rest = &rest[close + 1..];
			}
		} else if !rest.is_empty() {
			segments.push(Segment::Key(rest.to_string()));
		}
	}
	segments
}

fn json_to_value(j: &Json) -> Option<Value> {
	match j {
		Json::Null => None,
		Json::Bool(b) => Some(Value::Bool(*b)),
		Json::Number(n) => {
			if let Some(i) = n.as_i64() {
				Some(Value::Int(i))
			} else {
				n.as_f64().map(Value::Float)
			}
		}
		Json::String(s) => Some(Value::String(s.clone())),
		Json::Array(items) => Some(Value::List(items.iter().filter_map(json_to_value).collect())),
		Json::Object(_) => Some(Value::String(j.to_string())),
	}
}
