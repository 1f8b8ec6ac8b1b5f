use thiserror::Error;

/// Top level error type returned by every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum Error {
	#[error("config error: {message}")]
	Config { message: String },

	#[error("template error: {message}")]
	Template { message: String },

	#[error("extract error: pattern {pattern:?} did not match")]
	Extract { pattern: String },

	#[error("unknown extractor type: {pattern_type}")]
	UnknownExtractor { pattern_type: String },

	#[error("http error: {message}")]
	Http { message: String },

	#[error("http request timed out after {elapsed_ms}ms")]
	HttpTimeout { elapsed_ms: u64 },

	#[error("loop limit of {limit} iterations exceeded in state {state}")]
	LoopLimitExceeded { state: String, limit: u64 },

	#[error("cancelled")]
	Cancelled,
}

impl Error {
	pub fn config(message: impl Into<String>) -> Self {
		Error::Config { message: message.into() }
	}

	pub fn template(message: impl Into<String>) -> Self {
		Error::Template { message: message.into() }
	}

	pub fn http(message: impl Into<String>) -> Self {
		Error::Http { message: message.into() }
	}
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
