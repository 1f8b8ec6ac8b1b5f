mod support;

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use raceforge_core::connection::{make_strategy, ConnectionStrategy, StrategyKind, TargetAddr};
use raceforge_core::race::{dispatch, relative_start_ns, SyncMechanism, WorkerSpec};
use support::MockServer;

fn target(server: &MockServer) -> TargetAddr {
	TargetAddr { host: server.host(), port: server.port(), tls: false, verify_cert: false, connect_timeout: Duration::from_secs(2), read_timeout: Duration::from_secs(2) }
}

fn specs(n: usize, request: &str) -> Vec<WorkerSpec> {
	(0..n)
		.map(|worker_id| WorkerSpec {
			worker_id,
			group: "default".to_string(),
			wire_bytes: request.as_bytes().to_vec(),
			group_delay: Duration::ZERO,
			local_vars: Default::default(),
		})
		.collect()
}

#[test]
fn preconnect_race_returns_all_workers_with_tight_skew() {
	let server = MockServer::start_fixed(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");
	let target = target(&server);

	let mut strategy = make_strategy(StrategyKind::Preconnect);
	strategy.prepare(10, &target).unwrap();
	let strategy: Arc<Mutex<Box<dyn ConnectionStrategy>>> = Arc::new(Mutex::new(strategy));

	let request = "GET / HTTP/1.1\r\nHost: x\r\n\r\n";
	let results = dispatch(specs(10, request), SyncMechanism::Barrier, strategy, Duration::from_secs(2), Arc::new(AtomicBool::new(false)));

	assert_eq!(results.len(), 10);
	let mut worker_ids: Vec<usize> = results.iter().map(|r| r.worker_id).collect();
	worker_ids.sort();
	assert_eq!(worker_ids, (0..10).collect::<Vec<_>>());
	for r in &results {
		let resp = r.outcome.as_ref().expect("worker should have received a response");
		assert_eq!(resp.status, 200);
	}

	let relative = relative_start_ns(&results);
	let skew = relative.iter().max().copied().unwrap_or(0);
	// Generous bound for a loopback CI box; the point under test is that all
	// workers are released from one barrier, not a specific latency number.
	assert!(skew < Duration::from_millis(250).as_nanos() as u64, "release skew too large: {skew}ns");
}

#[test]
fn send_all_first_writes_identical_bytes_to_barrier() {
	let server = MockServer::start_fixed(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");
	let target = target(&server);

	let mut strategy = make_strategy(StrategyKind::Preconnect);
	strategy.prepare(4, &target).unwrap();
	let strategy: Arc<Mutex<Box<dyn ConnectionStrategy>>> = Arc::new(Mutex::new(strategy));

	let request = "POST /login HTTP/1.1\r\nHost: x\r\nContent-Length: 2\r\n\r\nhi";
	let results = dispatch(specs(4, request), SyncMechanism::SendAllFirst, strategy, Duration::from_secs(2), Arc::new(AtomicBool::new(false)));

	assert_eq!(results.len(), 4);
	for r in &results {
		assert_eq!(r.outcome.as_ref().unwrap().status, 200);
	}
}

#[test]
fn pooled_race_within_pool_size_succeeds() {
	let server = MockServer::start_fixed(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");
	let target = target(&server);

	let mut strategy = make_strategy(StrategyKind::Pooled);
	strategy.prepare(raceforge_core::connection::MAX_POOL_SIZE, &target).unwrap();
	let strategy: Arc<Mutex<Box<dyn ConnectionStrategy>>> = Arc::new(Mutex::new(strategy));

	let request = "GET / HTTP/1.1\r\nHost: x\r\n\r\n";
	let results = dispatch(
		specs(raceforge_core::connection::MAX_POOL_SIZE, request),
		SyncMechanism::Barrier,
		strategy,
		Duration::from_secs(2),
		Arc::new(AtomicBool::new(false)),
	);

	assert_eq!(results.len(), raceforge_core::connection::MAX_POOL_SIZE);
	for r in &results {
		assert_eq!(r.outcome.as_ref().unwrap().status, 200);
	}
}

#[test]
fn pooled_race_above_pool_size_is_rejected_at_prepare() {
	let server = MockServer::start_fixed(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");
	let target = target(&server);

	let mut strategy = make_strategy(StrategyKind::Pooled);
	let err = strategy.prepare(raceforge_core::connection::MAX_POOL_SIZE + 1, &target).unwrap_err();
	assert!(matches!(err, raceforge_core::error::Error::Config { .. }));
}
