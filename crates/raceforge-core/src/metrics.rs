use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// A monotonic labelled counter and a labelled timer accumulator, scoped to
/// one orchestrator run rather than a process-wide singleton (SPEC_FULL.md
/// §9 — the distilled spec's registry is a classvar-based global; this
/// redesigns it to an explicit, cheaply cloneable handle so multiple
/// orchestrator runs in one process, e.g. in tests, never share state).
#[derive(Clone)]
pub struct Metrics {
	enabled: bool,
	counters: Arc<RwLock<HashMap<String, Arc<AtomicU64>>>>,
	timers: Arc<RwLock<HashMap<String, Arc<TimerState>>>>,
}

#[derive(Default)]
struct TimerState {
	total_ns: AtomicU64,
	samples: AtomicU64,
}

impl Metrics {
	pub fn new(enabled: bool) -> Self {
		Self { enabled, counters: Arc::new(RwLock::new(HashMap::new())), timers: Arc::new(RwLock::new(HashMap::new())) }
	}

	pub fn disabled() -> Self {
		Self::new(false)
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	pub fn incr_counter(&self, label: &str) {
		if !self.enabled {
			return;
		}
		self.counter_handle(label).fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_timer(&self, label: &str, elapsed_ns: u64) {
		if !self.enabled {
			return;
		}
		let state = self.timer_handle(label);
		state.total_ns.fetch_add(elapsed_ns, Ordering::Relaxed);
		state.samples.fetch_add(1, Ordering::Relaxed);
	}

	fn counter_handle(&self, label: &str) -> Arc<AtomicU64> {
		if let Some(existing) = self.counters.read().get(label) {
			return Arc::clone(existing);
		}
		let mut guard = self.counters.write();
		Arc::clone(guard.entry(label.to_string()).or_insert_with(|| Arc::new(AtomicU64::new(0))))
	}

	fn timer_handle(&self, label: &str) -> Arc<TimerState> {
		if let Some(existing) = self.timers.read().get(label) {
			return Arc::clone(existing);
		}
		let mut guard = self.timers.write();
		Arc::clone(guard.entry(label.to_string()).or_insert_with(|| Arc::new(TimerState::default())))
	}

	/// Produces a final report: label -> (count, mean_ns) for timers, and
	/// label -> count for counters. A no-op registry always reports empty.
	pub fn report(&self) -> Report {
		let counters = self.counters.read().iter().map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed))).collect();
		let timers = self
			.timers
			.read()
			.iter()
			.map(|(k, v)| {
				let samples = v.samples.load(Ordering::Relaxed);
				let total = v.total_ns.load(Ordering::Relaxed);
				let mean_ns = if samples == 0 { 0 } else { total / samples };
				(k.clone(), TimerReport { samples, total_ns: total, mean_ns })
			})
			.collect();
		Report { counters, timers }
	}
}

#[derive(Debug, Default)]
pub struct Report {
	pub counters: HashMap<String, u64>,
	pub timers: HashMap<String, TimerReport>,
}

#[derive(Debug)]
pub struct TimerReport {
	pub samples: u64,
	pub total_ns: u64,
	pub mean_ns: u64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn disabled_registry_is_a_no_op() {
		let m = Metrics::disabled();
		m.incr_counter("races");
		m.record_timer("burst", 1_000_000);
		let report = m.report();
		assert!(report.counters.is_empty());
		assert!(report.timers.is_empty());
	}

	#[test]
	fn enabled_registry_accumulates() {
		let m = Metrics::new(true);
		m.incr_counter("races");
		m.incr_counter("races");
		m.record_timer("burst", 10);
		m.record_timer("burst", 20);
		let report = m.report();
		assert_eq!(report.counters["races"], 2);
		assert_eq!(report.timers["burst"].samples, 2);
		assert_eq!(report.timers["burst"].mean_ns, 15);
	}
}
