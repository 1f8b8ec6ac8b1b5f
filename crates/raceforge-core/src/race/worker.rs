use std::io::Write;
use std::time::{Duration, Instant};

use crate::context::Value;
use crate::error::Error;
use crate::http::{read_response, Response};

use super::SyncMechanism;

/// A single worker's share of a race burst: its rendered request bytes, the
/// group it belongs to, and any delay applied after the barrier.
pub struct WorkerSpec {
	pub worker_id: usize,
	pub group: String,
	pub wire_bytes: Vec<u8>,
	pub group_delay: Duration,
	pub local_vars: std::collections::HashMap<String, Value>,
}

/// What a worker produced, including raw timing for skew analysis.
pub struct RaceResult {
	pub worker_id: usize,
	pub group: String,
	pub released_at: Instant,
	pub outcome: Result<Response, Error>,
}

impl RaceResult {
	pub fn elapsed_ns(&self) -> u64 {
		match &self.outcome {
			Ok(resp) => resp.elapsed_ms.saturating_mul(1_000_000),
			Err(_) => 0,
		}
	}
}

/// Runs one worker's post-barrier protocol: optional group delay, the final
/// write (withheld bytes for `send_all_first`, full bytes for `barrier`),
/// then the response read. Returns the release instant and the outcome.
pub fn fire<S: std::io::Read + Write>(
	stream: &mut S,
	spec: &WorkerSpec,
	sync: SyncMechanism,
	pre_written_all_but_last: Option<&[u8]>,
	read_timeout: Duration,
) -> (Instant, Result<Response, Error>) {
	if !spec.group_delay.is_zero() {
		std::thread::sleep(spec.group_delay);
	}
	let released_at = Instant::now();
	let outcome = (|| -> Result<Response, Error> {
		match sync {
			SyncMechanism::Barrier => {
				stream.write_all(&spec.wire_bytes).map_err(|e| Error::http(format!("write failed: {e}")))?;
			}
			SyncMechanism::SendAllFirst => {
				let last = spec.wire_bytes.last().copied().ok_or_else(|| Error::http("empty rendered request"))?;
				debug_assert_eq!(pre_written_all_but_last.map(|b| b.len()), Some(spec.wire_bytes.len() - 1));
				stream.write_all(&[last]).map_err(|e| Error::http(format!("write failed: {e}")))?;
			}
		}
		let mut resp = read_response(stream, read_timeout)?;
		resp.elapsed_ms = released_at.elapsed().as_millis() as u64;
		resp.started_at_ns = 0;
		Ok(resp)
	})();
	(released_at, outcome)
}
