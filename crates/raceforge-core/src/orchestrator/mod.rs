mod designate;

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::config::{Config, LoopKind, Operation, Race, State};
use crate::connection::{connect_plain, make_strategy, upgrade_tls, ConnectionStrategy, TargetAddr};
use crate::context::{Value, VariableContext};
use crate::error::Error;
use crate::http::{parse_request, send_and_receive, Response};
use crate::metrics::Metrics;
use crate::race::{dispatch, relative_start_ns, SyncMechanism, WorkerSpec};
use crate::template::render_request;

pub use designate::designated_response;

/// One state visit recorded for the returned trace.
#[derive(Debug, Clone)]
pub struct StepRecord {
	pub state: String,
	pub iteration: u64,
	pub outcome: StepOutcome,
}

#[derive(Debug, Clone)]
pub enum StepOutcome {
	Request { status: u16, elapsed_ms: u64 },
	Race { results: Vec<RaceSummary> },
}

#[derive(Debug, Clone)]
pub struct RaceSummary {
	pub worker_id: usize,
	pub group: String,
	pub status: Option<u16>,
	pub elapsed_ns: u64,
	pub relative_start_ns: u64,
	pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Trace {
	pub steps: Vec<StepRecord>,
}

const DEFAULT_GLOBAL_LOOP_LIMIT: u64 = 10_000;

pub struct Orchestrator {
	config: Config,
	context: VariableContext,
	metrics: Metrics,
	cancel: Arc<AtomicBool>,
	loop_limit: u64,
}

impl Orchestrator {
	pub fn new(config: Config, cancel: Arc<AtomicBool>) -> Self {
		let metrics = Metrics::new(config.metrics_enabled);
		let context = VariableContext::from_map(config.globals.clone());
		Self { config, context, metrics, cancel, loop_limit: DEFAULT_GLOBAL_LOOP_LIMIT }
	}

	/// Overrides the global iteration cap. Production callers should use the
	/// default; this exists so tests can exercise [`Error::LoopLimitExceeded`]
	/// without looping ten thousand times.
	pub fn with_loop_limit(mut self, limit: u64) -> Self {
		self.loop_limit = limit;
		self
	}

	pub fn metrics(&self) -> &Metrics {
		&self.metrics
	}

	pub fn context(&self) -> &VariableContext {
		&self.context
	}

	/// Executes the state graph from `config.entrypoint` to a terminal
	/// state, per SPEC_FULL.md §4.6.
	pub fn run(&mut self) -> Result<Trace, Error> {
		let mut trace = Trace::default();
		let mut current = self.config.entrypoint.clone();
		let mut global_iterations: u64 = 0;
		let global_loop_limit = self.loop_limit;

		loop {
			if self.cancel.load(std::sync::atomic::Ordering::Relaxed) {
				return Err(Error::Cancelled);
			}

			let state = self
				.config
				.states
				.get(&current)
				.cloned()
				.ok_or_else(|| Error::config(format!("state `{current}` does not exist")))?;

			let mut iteration: u64 = 0;
			loop {
				global_iterations += 1;
				if global_iterations > global_loop_limit {
					return Err(Error::LoopLimitExceeded { state: current.clone(), limit: global_loop_limit });
				}

				self.context.set("__iter__", Value::Int(iteration as i64));
				let outcome = self.execute_state(&current, &state)?;
				trace.steps.push(StepRecord { state: current.clone(), iteration, outcome });
				iteration += 1;

				let should_continue = match &state.loop_kind {
					None => false,
					Some(LoopKind::Repeat(k)) => iteration < *k,
					Some(LoopKind::While(predicate)) => predicate.eval(&self.context.snapshot()),
				};
				if !should_continue {
					break;
				}
			}

			let next = state
				.next
				.iter()
				.find(|t| t.predicate.as_ref().is_none_or(|p| p.eval(&self.context.snapshot())));

			match next {
				Some(transition) => current = transition.goto.clone(),
				None => break,
			}
		}

		Ok(trace)
	}

	fn execute_state(&mut self, name: &str, state: &State) -> Result<StepOutcome, Error> {
		match &state.operation {
			Operation::Request(template) => self.execute_request(name, state, template),
			Operation::Race(race) => self.execute_race(name, state, race),
		}
	}

	fn execute_request(&mut self, name: &str, state: &State, template: &str) -> Result<StepOutcome, Error> {
		let vars = self.context.snapshot().as_render_map();
		let rendered = render_request(template, &vars)?;
		let request = parse_request(&rendered)?;
		let target: TargetAddr = (&self.config.target).into();

		let stream = connect_plain(&target)?;
		let mut transport = upgrade_tls(stream, &target)?;
		let wire = request.to_wire_bytes(&self.config.target.host);
		let start = Instant::now();
		let response = send_and_receive(&mut transport, &wire, self.config.target.read_timeout, start)?;

		self.metrics.incr_counter(&format!("state.{name}.requests"));
		self.metrics.record_timer(&format!("state.{name}.latency"), response.elapsed_ms.saturating_mul(1_000_000));

		self.apply_extracts(state, &response)?;
		Ok(StepOutcome::Request { status: response.status, elapsed_ms: response.elapsed_ms })
	}

	fn execute_race(&mut self, name: &str, state: &State, race: &Race) -> Result<StepOutcome, Error> {
		let snapshot = self.context.snapshot();
		let target: TargetAddr = (&self.config.target).into();
		let total_workers: usize = race.groups.iter().map(|g| g.threads).sum();

		let mut strategy = make_strategy(race.strategy);
		strategy.prepare(total_workers, &target)?;
		let strategy: Arc<Mutex<Box<dyn ConnectionStrategy>>> = Arc::new(Mutex::new(strategy));

		let mut specs = Vec::with_capacity(total_workers);
		let mut worker_id = 0usize;
		for group in &race.groups {
			let local_snapshot = snapshot.clone().with_locals(group.variables.clone());
			let vars = local_snapshot.as_render_map();
			let rendered = render_request(&group.request, &vars)?;
			let request = parse_request(&rendered)?;
			let wire_bytes = request.to_wire_bytes(&self.config.target.host);
			for _ in 0..group.threads {
				specs.push(WorkerSpec {
					worker_id,
					group: group.name.clone(),
					wire_bytes: wire_bytes.clone(),
					group_delay: group.delay,
					local_vars: group.variables.clone(),
				});
				worker_id += 1;
			}
		}

		let results = dispatch(specs, race.sync, Arc::clone(&strategy), race.timeout, Arc::clone(&self.cancel));
		strategy.lock().unwrap_or_else(|p| p.into_inner()).cleanup();

		let relative = relative_start_ns(&results);
		let summaries: Vec<RaceSummary> = results
			.iter()
			.zip(relative.iter())
			.map(|(r, &rel)| match &r.outcome {
				Ok(resp) => RaceSummary {
					worker_id: r.worker_id,
					group: r.group.clone(),
					status: Some(resp.status),
					elapsed_ns: r.elapsed_ns(),
					relative_start_ns: rel,
					error: None,
				},
				Err(e) => RaceSummary { worker_id: r.worker_id, group: r.group.clone(), status: None, elapsed_ns: 0, relative_start_ns: rel, error: Some(e.to_string()) },
			})
			.collect();

		self.metrics.incr_counter(&format!("state.{name}.races"));

		let race_results_value = Value::List(
			summaries
				.iter()
				.map(|s| {
					Value::Map(vec![
						("worker_id".to_string(), Value::Int(s.worker_id as i64)),
						("status".to_string(), s.status.map(|st| Value::Int(st as i64)).unwrap_or(Value::Null)),
						("elapsed_ns".to_string(), Value::Int(s.elapsed_ns as i64)),
					])
				})
				.collect(),
		);
		self.context.set("__race_results__", race_results_value);

		if let Some((_, response)) = designated_response(&results, &relative) {
			self.apply_extracts(state, response)?;
		}

		Ok(StepOutcome::Race { results: summaries })
	}

	fn apply_extracts(&mut self, state: &State, response: &Response) -> Result<(), Error> {
		let mut merged = HashMap::new();
		for (name, pattern) in &state.extracts {
			match pattern.extract(response)? {
				Some(value) => {
					merged.insert(name.clone(), value);
				}
				None => {
					tracing::warn!(extract = name.as_str(), "extract pattern did not match");
				}
			}
		}
		self.context.merge(merged);
		Ok(())
	}
}
