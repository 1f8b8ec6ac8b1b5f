mod support;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use raceforge_core::config::{load_from_str, Overrides};
use raceforge_core::error::Error;
use raceforge_core::orchestrator::{Orchestrator, StepOutcome};
use support::MockServer;

fn no_cancel() -> Arc<AtomicBool> {
	Arc::new(AtomicBool::new(false))
}

#[test]
fn single_request_state_extracts_and_terminates() {
	let server = MockServer::start_fixed(b"HTTP/1.1 200 OK\r\nContent-Length: 15\r\n\r\n{\"token\":\"abc\"}");
	let yaml = format!(
		r#"
target:
  host: {host}
  port: {port}
entrypoint:
  state: start
states:
  start:
    request: "GET /login HTTP/1.1\nHost: x\n\n"
    extracts:
      token:
        pattern_type: jpath
        pattern_data: token
    next: []
"#,
		host = server.host(),
		port = server.port()
	);

	let config = load_from_str(&yaml, &Overrides::default()).unwrap();
	let mut orchestrator = Orchestrator::new(config, no_cancel());
	let trace = orchestrator.run().unwrap();

	assert_eq!(trace.steps.len(), 1);
	match &trace.steps[0].outcome {
		StepOutcome::Request { status, .. } => assert_eq!(*status, 200),
		other => panic!("expected a Request outcome, got {other:?}"),
	}
	assert_eq!(orchestrator.context().get("token"), Some(raceforge_core::context::Value::String("abc".to_string())));
}

#[test]
fn predicate_branches_to_correct_next_state() {
	let server = MockServer::start_fixed(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
	let yaml = format!(
		r#"
target:
  host: {host}
  port: {port}
entrypoint:
  state: start
globals:
  mode: attack
states:
  start:
    request: "GET / HTTP/1.1\nHost: x\n\n"
    next:
      - predicate: "mode == \"attack\""
        goto: attack
      - goto: idle
  attack:
    request: "GET /attack HTTP/1.1\nHost: x\n\n"
    next: []
  idle:
    request: "GET /idle HTTP/1.1\nHost: x\n\n"
    next: []
"#,
		host = server.host(),
		port = server.port()
	);

	let config = load_from_str(&yaml, &Overrides::default()).unwrap();
	let mut orchestrator = Orchestrator::new(config, no_cancel());
	let trace = orchestrator.run().unwrap();

	assert_eq!(trace.steps.len(), 2);
	assert_eq!(trace.steps[0].state, "start");
	assert_eq!(trace.steps[1].state, "attack");
}

#[test]
fn repeat_loop_runs_exact_count_before_advancing() {
	let server = MockServer::start_fixed(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
	let yaml = format!(
		r#"
target:
  host: {host}
  port: {port}
entrypoint:
  state: poll
states:
  poll:
    request: "GET /poll HTTP/1.1\nHost: x\n\n"
    repeat: 3
    next: []
"#,
		host = server.host(),
		port = server.port()
	);

	let config = load_from_str(&yaml, &Overrides::default()).unwrap();
	let mut orchestrator = Orchestrator::new(config, no_cancel());
	let trace = orchestrator.run().unwrap();

	assert_eq!(trace.steps.len(), 3);
	assert_eq!(trace.steps.iter().map(|s| s.iteration).collect::<Vec<_>>(), vec![0, 1, 2]);
}

#[test]
fn while_true_forever_hits_loop_limit() {
	let server = MockServer::start_fixed(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
	let yaml = format!(
		r#"
target:
  host: {host}
  port: {port}
entrypoint:
  state: spin
globals:
  always: true
states:
  spin:
    request: "GET /spin HTTP/1.1\nHost: x\n\n"
    while: "always == true"
    next: []
"#,
		host = server.host(),
		port = server.port()
	);

	let config = load_from_str(&yaml, &Overrides::default()).unwrap();
	let mut orchestrator = Orchestrator::new(config, no_cancel()).with_loop_limit(25);
	let err = orchestrator.run().unwrap_err();
	assert!(matches!(err, Error::LoopLimitExceeded { limit: 25, .. }));
}

#[test]
fn race_state_designates_first_2xx_response() {
	let server = MockServer::start_with(|id| {
		if id == 0 {
			b"HTTP/1.1 409 Conflict\r\nContent-Length: 0\r\n\r\n".to_vec()
		} else {
			format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\nwinner-{id}", format!("winner-{id}").len()).into_bytes()
		}
	});
	let yaml = format!(
		r#"
target:
  host: {host}
  port: {port}
entrypoint:
  state: race
states:
  race:
    race:
      connection_strategy: preconnect
      sync_mechanism: barrier
      threads: 5
    request: "GET /claim HTTP/1.1\nHost: x\n\n"
    next: []
"#,
		host = server.host(),
		port = server.port()
	);

	let config = load_from_str(&yaml, &Overrides::default()).unwrap();
	let mut orchestrator = Orchestrator::new(config, no_cancel());
	let trace = orchestrator.run().unwrap();

	match &trace.steps[0].outcome {
		StepOutcome::Race { results } => assert_eq!(results.len(), 5),
		other => panic!("expected a Race outcome, got {other:?}"),
	}
}
