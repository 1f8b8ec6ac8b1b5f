mod worker;

pub use worker::{RaceResult, WorkerSpec};

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionStrategy;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMechanism {
	#[default]
	Barrier,
	SendAllFirst,
}

/// Runs a barrier-synchronised burst of `specs.len()` workers against a
/// prepared connection strategy, per SPEC_FULL.md §4.5.
///
/// Rendering must already have happened (step 1 of §4.5 — each worker's
/// request bytes are final before this function is called, so a template
/// failure never happens mid-burst). `cancel` is checked at each worker's
/// pre-barrier suspension points; once a worker reaches the barrier it runs
/// to completion or its own read timeout.
pub fn dispatch(
	specs: Vec<WorkerSpec>,
	sync: SyncMechanism,
	strategy: Arc<Mutex<Box<dyn ConnectionStrategy>>>,
	read_timeout: Duration,
	cancel: Arc<AtomicBool>,
) -> Vec<RaceResult> {
	let n = specs.len();
	let barrier = Arc::new(Barrier::new(n));

	std::thread::scope(|scope| {
		let handles: Vec<_> = specs
			.into_iter()
			.map(|spec| {
				let barrier = Arc::clone(&barrier);
				let strategy = Arc::clone(&strategy);
				let cancel = Arc::clone(&cancel);
				scope.spawn(move || run_worker(spec, sync, barrier, strategy, read_timeout, cancel))
			})
			.collect();

		handles.into_iter().map(|h| h.join().unwrap_or_else(|_| panic!("race worker thread panicked"))).collect()
	})
}

fn run_worker(
	spec: WorkerSpec,
	sync: SyncMechanism,
	barrier: Arc<Barrier>,
	strategy: Arc<Mutex<Box<dyn ConnectionStrategy>>>,
	read_timeout: Duration,
	cancel: Arc<AtomicBool>,
) -> RaceResult {
	let worker_id = spec.worker_id;
	let group = spec.group.clone();

	if cancel.load(Ordering::Relaxed) {
		return RaceResult { worker_id, group, released_at: Instant::now(), outcome: Err(Error::Cancelled) };
	}

	let transport = {
		let mut guard = strategy.lock().unwrap_or_else(|p| p.into_inner());
		guard.acquire(worker_id)
	};
	let mut transport = match transport {
		Ok(t) => t,
		Err(e) => {
			// Still join the barrier so the other N-1 workers are not stuck
			// waiting on a party that will never arrive.
			barrier.wait();
			return RaceResult { worker_id, group, released_at: Instant::now(), outcome: Err(e) };
		}
	};

	if sync == SyncMechanism::SendAllFirst {
		let all_but_last = &spec.wire_bytes[..spec.wire_bytes.len().saturating_sub(1)];
		if let Err(e) = transport.write_all(all_but_last) {
			barrier.wait();
			return RaceResult { worker_id, group, released_at: Instant::now(), outcome: Err(Error::http(format!("pre-write failed: {e}"))) };
		}
	}

	barrier.wait();

	let pre_written = if sync == SyncMechanism::SendAllFirst {
		Some(&spec.wire_bytes[..spec.wire_bytes.len().saturating_sub(1)])
	} else {
		None
	};
	let (released_at, outcome) = worker::fire(&mut transport, &spec, sync, pre_written, read_timeout);

	let mut guard = strategy.lock().unwrap_or_else(|p| p.into_inner());
	guard.release(worker_id, transport);

	RaceResult { worker_id, group, released_at, outcome }
}

/// Normalises raw per-worker release instants into relative nanoseconds from
/// the earliest release in the burst, as required for designated-response
/// selection (§4.6) and skew assertions (§8).
pub fn relative_start_ns(results: &[RaceResult]) -> Vec<u64> {
	let Some(t0) = results.iter().map(|r| r.released_at).min() else {
		return Vec::new();
	};
	results.iter().map(|r| r.released_at.saturating_duration_since(t0).as_nanos() as u64).collect()
}
