mod jsonpath;
mod regex;

use serde::{Deserialize, Serialize};

use crate::context::Value;
use crate::error::Error;
use crate::http::Response;

/// How to pull one value out of a response. Tagged by `pattern_type` in
/// configuration; unrecognized tags surface as [`Error::UnknownExtractor`]
/// rather than a generic YAML parse error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawExtractPattern", into = "RawExtractPattern")]
pub enum ExtractPattern {
	Regex { pattern_data: String },
	Jsonpath { pattern_data: String },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
struct RawExtractPattern {
	pattern_type: String,
	pattern_data: String,
}

impl TryFrom<RawExtractPattern> for ExtractPattern {
	type Error = Error;

	fn try_from(raw: RawExtractPattern) -> Result<Self, Self::Error> {
		match raw.pattern_type.as_str() {
			"regex" => Ok(ExtractPattern::Regex { pattern_data: raw.pattern_data }),
			"jpath" => Ok(ExtractPattern::Jsonpath { pattern_data: raw.pattern_data }),
			other => Err(Error::UnknownExtractor { pattern_type: other.to_string() }),
		}
	}
}

impl From<ExtractPattern> for RawExtractPattern {
	fn from(pattern: ExtractPattern) -> Self {
		match pattern {
			ExtractPattern::Regex { pattern_data } => RawExtractPattern { pattern_type: "regex".to_string(), pattern_data },
			ExtractPattern::Jsonpath { pattern_data } => RawExtractPattern { pattern_type: "jpath".to_string(), pattern_data },
		}
	}
}

impl ExtractPattern {
	/// Extracts a single value, or `Ok(None)` if the pattern legitimately
	/// found nothing (a miss downgrades to a warning at the orchestrator
	/// level, not a hard error).
	pub fn extract(&self, response: &Response) -> Result<Option<Value>, Error> {
		match self {
			ExtractPattern::Regex { pattern_data } => regex::extract(pattern_data, response),
			ExtractPattern::Jsonpath { pattern_data } => jsonpath::extract(pattern_data, response),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_unknown_pattern_type() {
		let raw = RawExtractPattern { pattern_type: "xpath".to_string(), pattern_data: "//a".to_string() };
		let err = ExtractPattern::try_from(raw).unwrap_err();
		assert!(matches!(err, Error::UnknownExtractor { .. }));
	}
}
