use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::StrategyKind;
use crate::context::{Value, RESERVED_NAMES};
use crate::error::Error;
use crate::predicate::Predicate;
use crate::race::SyncMechanism;
use crate::template::referenced_names;
use crate::extract::ExtractPattern;

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_READ_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_RACE_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_LOOP_LIMIT: u64 = 10_000;

// --- Raw (all-optional) layer, mirroring the file schema exactly -----------

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawConfig {
	pub metadata: Option<RawMetadata>,
	pub target: Option<RawTarget>,
	pub entrypoint: Option<RawEntrypoint>,
	pub states: Option<HashMap<String, RawState>>,
	pub globals: Option<HashMap<String, Value>>,
	pub logging: Option<RawLogging>,
	pub metrics: Option<RawMetrics>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawMetadata {
	pub name: Option<String>,
	pub version: Option<String>,
	pub author: Option<String>,
	pub vulnerability: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawTarget {
	pub host: String,
	pub port: u16,
	#[serde(default)]
	pub tls: Option<RawTls>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct RawTls {
	#[serde(default)]
	pub enabled: bool,
	pub verify_cert: Option<bool>,
	pub client_cert: Option<String>,
	pub client_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawEntrypoint {
	pub state: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawLogging {
	pub filter: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawMetrics {
	#[serde(default)]
	pub enabled: bool,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawState {
	pub description: Option<String>,
	pub request: Option<String>,
	pub race: Option<RawRace>,
	pub extracts: Option<HashMap<String, ExtractPattern>>,
	pub next: Option<Vec<RawTransition>>,
	pub repeat: Option<u64>,
	pub r#while: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawTransition {
	pub predicate: Option<String>,
	pub goto: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct RawRace {
	pub sync_mechanism: Option<SyncMechanism>,
	pub connection_strategy: Option<StrategyKind>,
	pub threads: Option<usize>,
	pub thread_groups: Option<Vec<RawThreadGroup>>,
	pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct RawThreadGroup {
	pub name: String,
	pub threads: usize,
	pub delay_ms: Option<u64>,
	pub request: Option<String>,
	pub variables: Option<HashMap<String, Value>>,
}

// --- Strict (validated) layer ----------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
	pub metadata: Metadata,
	pub target: Target,
	pub entrypoint: String,
	pub states: HashMap<String, State>,
	pub globals: HashMap<String, Value>,
	pub logging_filter: Option<String>,
	pub metrics_enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Metadata {
	pub name: String,
	pub version: String,
	pub author: String,
	pub vulnerability: String,
}

#[derive(Debug, Clone)]
pub struct Target {
	pub host: String,
	pub port: u16,
	pub tls: bool,
	pub verify_cert: bool,
	pub client_cert: Option<String>,
	pub client_key: Option<String>,
	pub connect_timeout: Duration,
	pub read_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct State {
	pub description: String,
	pub operation: Operation,
	pub extracts: HashMap<String, ExtractPattern>,
	pub next: Vec<Transition>,
	pub loop_kind: Option<LoopKind>,
}

#[derive(Debug, Clone)]
pub enum Operation {
	Request(String),
	Race(Race),
}

#[derive(Debug, Clone)]
pub struct Race {
	pub sync: SyncMechanism,
	pub strategy: StrategyKind,
	pub groups: Vec<ThreadGroup>,
	pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ThreadGroup {
	pub name: String,
	pub threads: usize,
	pub delay: Duration,
	pub request: String,
	pub variables: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct Transition {
	pub predicate: Option<Predicate>,
	pub goto: String,
}

#[derive(Debug, Clone)]
pub enum LoopKind {
	Repeat(u64),
	While(Predicate),
}

/// CLI/env overrides layered over the file in increasing precedence:
/// file < environment < explicit CLI flags.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
	pub user: Option<String>,
	pub password: Option<String>,
	pub threads: Option<usize>,
	pub host: Option<String>,
	pub port: Option<u16>,
}

pub fn load_from_path(path: &Path, overrides: &Overrides) -> Result<Config, Error> {
	let text = std::fs::read_to_string(path).map_err(|e| Error::config(format!("failed to read {}: {e}", path.display())))?;
	load_from_str(&text, overrides)
}

pub fn load_from_str(text: &str, overrides: &Overrides) -> Result<Config, Error> {
	let raw: RawConfig = serde_yaml::from_str(text).map_err(|e| Error::config(format!("invalid YAML: {e}")))?;
	validate(raw, overrides)
}

fn validate(raw: RawConfig, overrides: &Overrides) -> Result<Config, Error> {
	let metadata = raw.metadata.map(|m| Metadata {
		name: m.name.unwrap_or_default(),
		version: m.version.unwrap_or_default(),
		author: m.author.unwrap_or_default(),
		vulnerability: m.vulnerability.unwrap_or_default(),
	}).unwrap_or_default();

	let raw_target = raw.target.ok_or_else(|| Error::config("missing `target`"))?;
	let tls = raw_target.tls.unwrap_or_default();
	let target = Target {
		host: overrides.host.clone().unwrap_or(raw_target.host),
		port: overrides.port.unwrap_or(raw_target.port),
		tls: tls.enabled,
		verify_cert: tls.verify_cert.unwrap_or(true),
		client_cert: tls.client_cert,
		client_key: tls.client_key,
		connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
		read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
	};

	let entrypoint = raw.entrypoint.ok_or_else(|| Error::config("missing `entrypoint`"))?.state;

	let mut globals: HashMap<String, Value> = raw.globals.unwrap_or_default();
	if let Some(user) = &overrides.user {
		globals.insert("user".to_string(), Value::String(user.clone()));
	}
	if let Some(password) = &overrides.password {
		globals.insert("password".to_string(), Value::String(password.clone()));
	}

	let raw_states = raw.states.ok_or_else(|| Error::config("missing `states`"))?;
	let mut states = HashMap::with_capacity(raw_states.len());
	for (name, raw_state) in raw_states {
		states.insert(name.clone(), validate_state(&name, raw_state, overrides)?);
	}

	if !states.contains_key(&entrypoint) {
		return Err(Error::config(format!("entrypoint state `{entrypoint}` does not exist")));
	}
	for (name, state) in &states {
		for transition in &state.next {
			if !states.contains_key(&transition.goto) {
				return Err(Error::config(format!("state `{name}` transitions to unknown state `{}`", transition.goto)));
			}
		}
	}

	let group_vars = states.values().flat_map(|s| match &s.operation {
		Operation::Race(race) => race.groups.iter().flat_map(|g| g.variables.keys()).collect(),
		Operation::Request(_) => Vec::new(),
	});
	let available: std::collections::HashSet<&str> = globals
		.keys()
		.map(|s| s.as_str())
		.chain(RESERVED_NAMES.iter().copied())
		.chain(states.values().flat_map(|s| s.extracts.keys()).map(|s| s.as_str()))
		.chain(group_vars.map(|s| s.as_str()))
		.collect();
	for (name, state) in &states {
		for text in request_texts(state) {
			for referenced in referenced_names(text)? {
				if !available.contains(referenced.as_str()) {
					return Err(Error::config(format!("state `{name}` references undeclared variable `{referenced}`")));
				}
			}
		}
	}

	let metrics_enabled = raw.metrics.map(|m| m.enabled).unwrap_or(false);
	let logging_filter = raw.logging.and_then(|l| l.filter);

	Ok(Config { metadata, target, entrypoint, states, globals, logging_filter, metrics_enabled })
}

fn request_texts(state: &State) -> Vec<&str> {
	match &state.operation {
		Operation::Request(text) => vec![text.as_str()],
		Operation::Race(race) => race.groups.iter().map(|g| g.request.as_str()).collect(),
	}
}

fn validate_state(name: &str, raw: RawState, overrides: &Overrides) -> Result<State, Error> {
	let extracts = raw.extracts.unwrap_or_default();
	for key in extracts.keys() {
		if RESERVED_NAMES.contains(&key.as_str()) {
			return Err(Error::config(format!("state `{name}` extract `{key}` shadows a reserved name")));
		}
	}

	// A `race` block takes priority; in its legacy `threads` form the
	// sibling `request` field supplies the one request shared by all
	// workers, so `request` and `race` coexisting is expected there, not an
	// error.
	let operation = match (raw.request, raw.race) {
		(request, Some(race)) => Operation::Race(validate_race(name, race, request, overrides)?),
		(Some(request), None) => Operation::Request(request),
		(None, None) => return Err(Error::config(format!("state `{name}` declares neither `request` nor `race`"))),
	};

	let next = raw
		.next
		.unwrap_or_default()
		.into_iter()
		.map(|t| {
			Ok(Transition { predicate: t.predicate.as_deref().map(Predicate::parse).transpose()?, goto: t.goto })
		})
		.collect::<Result<Vec<_>, Error>>()?;

	let loop_kind = match (raw.repeat, raw.r#while) {
		(Some(_), Some(_)) => return Err(Error::config(format!("state `{name}` declares both `repeat` and `while`"))),
		(Some(n), None) => Some(LoopKind::Repeat(n)),
		(None, Some(expr)) => Some(LoopKind::While(Predicate::parse(&expr)?)),
		(None, None) => None,
	};

	Ok(State { description: raw.description.unwrap_or_default(), operation, extracts, next, loop_kind })
}

fn validate_race(state_name: &str, raw: RawRace, legacy_request: Option<String>, overrides: &Overrides) -> Result<Race, Error> {
	let legacy = raw.threads.is_some();
	let grouped = raw.thread_groups.is_some();
	if legacy && grouped {
		return Err(Error::config(format!(
			"state `{state_name}` race block declares both legacy `threads` and `thread_groups`; use exactly one"
		)));
	}

	let groups = if let Some(raw_groups) = raw.thread_groups {
		raw_groups
			.into_iter()
			.map(|g| {
				Ok(ThreadGroup {
					name: g.name,
					threads: overrides.threads.unwrap_or(g.threads),
					delay: Duration::from_millis(g.delay_ms.unwrap_or(0)),
					request: g.request.ok_or_else(|| Error::config(format!("state `{state_name}` thread group missing `request`")))?,
					variables: g.variables.unwrap_or_default(),
				})
			})
			.collect::<Result<Vec<_>, Error>>()?
	} else if let Some(threads) = raw.threads {
		let request = legacy_request.ok_or_else(|| Error::config(format!("state `{state_name}` legacy race form needs a sibling `request`")))?;
		vec![ThreadGroup {
			name: "default".to_string(),
			threads: overrides.threads.unwrap_or(threads),
			delay: Duration::ZERO,
			request,
			variables: HashMap::new(),
		}]
	} else {
		return Err(Error::config(format!("state `{state_name}` race block needs `threads` or `thread_groups`")));
	};

	let strategy = raw.connection_strategy.unwrap_or(StrategyKind::Preconnect);
	let total_threads: usize = groups.iter().map(|g| g.threads).sum();
	if strategy == StrategyKind::Pooled && total_threads > crate::connection::MAX_POOL_SIZE {
		return Err(Error::config(format!(
			"state `{state_name}` races {total_threads} workers with the pooled connection strategy, which supports at most {} (all workers share one release barrier, so a bigger burst would deadlock)",
			crate::connection::MAX_POOL_SIZE
		)));
	}

	Ok(Race { sync: raw.sync_mechanism.unwrap_or_default(), strategy, groups, timeout: Duration::from_millis(raw.timeout_ms.unwrap_or(DEFAULT_RACE_TIMEOUT_MS)) })
}

pub const fn default_loop_limit() -> u64 {
	DEFAULT_LOOP_LIMIT
}

impl From<&Target> for crate::connection::TargetAddr {
	fn from(target: &Target) -> Self {
		crate::connection::TargetAddr {
			host: target.host.clone(),
			port: target.port,
			tls: target.tls,
			verify_cert: target.verify_cert,
			connect_timeout: target.connect_timeout,
			read_timeout: target.read_timeout,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
target:
  host: localhost
  port: 8080
entrypoint:
  state: start
states:
  start:
    request: "GET / HTTP/1.1\nHost: localhost\n\n"
    next: []
"#;

	#[test]
	fn loads_minimal_config() {
		let cfg = load_from_str(MINIMAL, &Overrides::default()).unwrap();
		assert_eq!(cfg.entrypoint, "start");
		assert_eq!(cfg.target.port, 8080);
	}

	#[test]
	fn rejects_unknown_goto() {
		let bad = MINIMAL.replace("next: []", "next:\n      - goto: missing");
		assert!(load_from_str(&bad, &Overrides::default()).is_err());
	}

	#[test]
	fn rejects_both_threads_and_thread_groups() {
		let text = r#"
target:
  host: localhost
  port: 8080
entrypoint:
  state: start
states:
  start:
    race:
      threads: 5
      thread_groups:
        - name: a
          threads: 5
          request: "GET / HTTP/1.1\n\n"
    next: []
"#;
		let err = load_from_str(text, &Overrides::default()).unwrap_err();
		assert!(matches!(err, Error::Config { .. }));
	}

	#[test]
	fn rejects_undeclared_template_variable() {
		let text = r#"
target:
  host: localhost
  port: 8080
entrypoint:
  state: start
states:
  start:
    request: "GET /{{missing}} HTTP/1.1\n\n"
    next: []
"#;
		assert!(load_from_str(text, &Overrides::default()).is_err());
	}

	#[test]
	fn accepts_template_variable_declared_only_in_a_thread_group() {
		let text = r#"
target:
  host: localhost
  port: 8080
entrypoint:
  state: start
states:
  start:
    race:
      thread_groups:
        - name: a
          threads: 5
          request: "GET /{{session_id}} HTTP/1.1\n\n"
          variables:
            session_id: abc123
    next: []
"#;
		assert!(load_from_str(text, &Overrides::default()).is_ok());
	}
}
