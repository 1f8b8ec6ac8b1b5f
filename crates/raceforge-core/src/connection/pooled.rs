use std::sync::mpsc::{self, Receiver, Sender};

use super::{connect_plain, upgrade_tls, ConnectionStrategy, TargetAddr, Transport};
use crate::error::Error;

pub const MAX_POOL_SIZE: usize = 5;

/// A bounded pool of up to `MAX_POOL_SIZE` transports shared across the
/// burst's workers, queue-backed like a connection pool you'd reuse across
/// many requests. All `n` workers still meet at one release barrier
/// (`race::dispatch`), so the pool can only ever supply one transport per
/// worker up front — a burst with more workers than the pool can prepare
/// would leave the extra workers blocked on `acquire` forever, since nothing
/// calls `release` before the barrier. `prepare` rejects that case instead of
/// deadlocking.
pub struct PooledStrategy {
	sender: Option<Sender<Transport>>,
	receiver: Option<Receiver<Transport>>,
}

impl PooledStrategy {
	pub fn new() -> Self {
		Self { sender: None, receiver: None }
	}
}

impl Default for PooledStrategy {
	fn default() -> Self {
		Self::new()
	}
}

impl ConnectionStrategy for PooledStrategy {
	fn prepare(&mut self, n: usize, target: &TargetAddr) -> Result<(), Error> {
		if n > MAX_POOL_SIZE {
			return Err(Error::config(format!(
				"pooled connection strategy supports at most {MAX_POOL_SIZE} workers per race burst (all workers meet at one barrier, so a larger burst would deadlock waiting on a pool that nothing refills before release); got {n}"
			)));
		}
		tracing::warn!(pool_size = n, "pooled connection strategy reuses a fixed-size pool; each worker still meets the others at the release barrier");
		let (tx, rx) = mpsc::channel();
		for _ in 0..n {
			let stream = connect_plain(target)?;
			tx.send(upgrade_tls(stream, target)?).map_err(|_| Error::http("pool channel closed during prepare"))?;
		}
		self.sender = Some(tx);
		self.receiver = Some(rx);
		Ok(())
	}

	fn acquire(&mut self, _worker_id: usize) -> Result<Transport, Error> {
		let rx = self.receiver.as_ref().ok_or_else(|| Error::http("pooled strategy not prepared"))?;
		rx.recv().map_err(|_| Error::http("pool exhausted: no transports available"))
	}

	fn release(&mut self, _worker_id: usize, transport: Transport) {
		if let Some(tx) = &self.sender {
			let _ = tx.send(transport);
		}
	}

	fn cleanup(&mut self) {
		self.sender = None;
		self.receiver = None;
	}
}
