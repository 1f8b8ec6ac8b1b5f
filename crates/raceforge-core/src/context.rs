use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Reserved variable names written by the orchestrator itself; configs may not
/// declare an `extracts` target with one of these names.
pub const RESERVED_NAMES: &[&str] = &["__iter__", "__status__", "__elapsed_ms__", "__race_results__", "__totp__"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	Null,
	List(Vec<Value>),
	Map(Vec<(String, Value)>),
}

impl Value {
	pub fn as_str_rendered(&self) -> String {
		match self {
			Value::Bool(b) => b.to_string(),
			Value::Int(i) => i.to_string(),
			Value::Float(f) => f.to_string(),
			Value::String(s) => s.clone(),
			Value::Null => "null".to_string(),
			Value::List(items) => items
				.iter()
				.map(|v| v.as_str_rendered())
				.collect::<Vec<_>>()
				.join(","),
			Value::Map(entries) => {
				let rendered = entries.iter().map(|(k, v)| format!("{k}={}", v.as_str_rendered())).collect::<Vec<_>>().join(",");
				format!("{{{rendered}}}")
			}
		}
	}

	/// Attempts bool -> int -> float -> string coercion, in that order, as the
	/// regex extractor's default type inference does.
	pub fn coerce_from_str(raw: &str) -> Value {
		if let Ok(b) = raw.parse::<bool>() {
			return Value::Bool(b);
		}
		if let Ok(i) = raw.parse::<i64>() {
			return Value::Int(i);
		}
		if let Ok(f) = raw.parse::<f64>() {
			return Value::Float(f);
		}
		Value::String(raw.to_string())
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::String(s.to_string())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Value::String(s)
	}
}

impl From<i64> for Value {
	fn from(i: i64) -> Self {
		Value::Int(i)
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Value::Bool(b)
	}
}

type Frame = HashMap<String, Value>;

/// Thread-safe, scoped variable store.
///
/// Writes go through a single global frame guarded by a lock; reads against a
/// worker's view are served from an immutable snapshot cloned before a race
/// burst's barrier, so in-flight workers never observe a write the
/// orchestrator makes while the burst is still running.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
	global: Arc<RwLock<Frame>>,
}

impl VariableContext {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_map(vars: HashMap<String, Value>) -> Self {
		Self { global: Arc::new(RwLock::new(vars)) }
	}

	pub fn set(&self, key: impl Into<String>, value: Value) {
		self.global.write().insert(key.into(), value);
	}

	pub fn get(&self, key: &str) -> Option<Value> {
		self.global.read().get(key).cloned()
	}

	/// Clones the current state into a read-only snapshot for handing to
	/// race workers. Overlaying group-local variables does not mutate this
	/// context.
	pub fn snapshot(&self) -> Snapshot {
		Snapshot { base: self.global.read().clone(), local: HashMap::new() }
	}

	pub fn merge(&self, values: HashMap<String, Value>) {
		let mut guard = self.global.write();
		for (k, v) in values {
			guard.insert(k, v);
		}
	}

	pub fn as_map(&self) -> HashMap<String, Value> {
		self.global.read().clone()
	}
}

/// An immutable, per-worker view of the context overlaid with group-local
/// variables. Local lookups shadow the base frame.
#[derive(Debug, Clone)]
pub struct Snapshot {
	base: Frame,
	local: Frame,
}

impl Snapshot {
	pub fn with_locals(mut self, locals: HashMap<String, Value>) -> Self {
		self.local.extend(locals);
		self
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.local.get(key).or_else(|| self.base.get(key))
	}

	pub fn as_render_map(&self) -> HashMap<String, String> {
		let mut out: HashMap<String, String> = self.base.iter().map(|(k, v)| (k.clone(), v.as_str_rendered())).collect();
		out.extend(self.local.iter().map(|(k, v)| (k.clone(), v.as_str_rendered())));
		out
	}
}
