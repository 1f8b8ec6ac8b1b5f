use std::collections::HashMap;

use crate::error::Error;

/// Renders `{{name}}` placeholders in `body` against `vars`, one textual pass.
///
/// `{{len(body)}}` is handled as a dedicated primitive by the caller (see
/// [`render_request`]) since it depends on the rendered body, not on `vars`.
pub fn render(body: &str, vars: &HashMap<String, String>) -> Result<String, Error> {
	let mut out = String::with_capacity(body.len());
	let mut rest = body;
	loop {
		match rest.find("{{") {
			None => {
				out.push_str(rest);
				break;
			}
			Some(start) => {
				out.push_str(&rest[..start]);
				let after = &rest[start + 2..];
				let end = after.find("}}").ok_or_else(|| Error::template("unterminated {{ placeholder"))?;
				let name = after[..end].trim();
				if name == "len(body)" {
					// handled by render_request; leave the marker for the second pass
					out.push_str("{{len(body)}}");
				} else {
					let value = vars
						.get(name)
						.ok_or_else(|| Error::template(format!("undefined template variable `{name}`")))?;
					out.push_str(value);
				}
				rest = &after[end + 2..];
			}
		}
	}
	Ok(out)
}

/// Renders a raw HTTP request blob: first substitutes ordinary variables,
/// then resolves `{{len(body)}}` against the byte length of the body that
/// follows the header/body separator.
pub fn render_request(blob: &str, vars: &HashMap<String, String>) -> Result<String, Error> {
	let rendered = render(blob, vars)?;
	if !rendered.contains("{{len(body)}}") {
		return Ok(rendered);
	}
	let separator = rendered
		.find("\r\n\r\n")
		.map(|i| (i, 4))
		.or_else(|| rendered.find("\n\n").map(|i| (i, 2)))
		.ok_or_else(|| Error::template("{{len(body)}} used but no header/body separator found"))?;
	let (sep_idx, sep_len) = separator;
	let body_len = rendered[sep_idx + sep_len..].as_bytes().len();
	Ok(rendered.replace("{{len(body)}}", &body_len.to_string()))
}

/// Collects every placeholder name referenced in `body`, used at config-load
/// time to eagerly validate that every template variable is reachable.
pub fn referenced_names(body: &str) -> Result<Vec<String>, Error> {
	let mut names = Vec::new();
	let mut rest = body;
	while let Some(start) = rest.find("{{") {
		let after = &rest[start + 2..];
		let end = after.find("}}").ok_or_else(|| Error::template("unterminated {{ placeholder"))?;
		let name = after[..end].trim();
		if name != "len(body)" {
			names.push(name.to_string());
		}
		rest = &after[end + 2..];
	}
	Ok(names)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn substitutes_known_variables() {
		let mut vars = HashMap::new();
		vars.insert("user".to_string(), "alice".to_string());
		let out = render("hello {{user}}", &vars).unwrap();
		assert_eq!(out, "hello alice");
	}

	#[test]
	fn fails_on_unknown_variable() {
		let vars = HashMap::new();
		assert!(render("hello {{user}}", &vars).is_err());
	}

	#[test]
	fn computes_content_length() {
		let mut vars = HashMap::new();
		vars.insert("token".to_string(), "abc".to_string());
		let blob = "POST /x HTTP/1.1\r\nContent-Length: {{len(body)}}\r\n\r\n{\"t\":\"{{token}}\"}";
		let out = render_request(blob, &vars).unwrap();
		let body = out.split_once("\r\n\r\n").unwrap().1;
		assert_eq!(body, "{\"t\":\"abc\"}");
		assert!(out.contains(&format!("Content-Length: {}", body.as_bytes().len())));
	}

	#[test]
	fn referenced_names_skips_len_body() {
		let names = referenced_names("{{a}} {{len(body)}} {{b}}").unwrap();
		assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
	}
}
