use super::{connect_plain, upgrade_tls, ConnectionStrategy, TargetAddr, Transport};
use crate::error::Error;

/// Opens all `n` transports up front, fully handshaked (TCP and, if
/// configured, TLS) before the race burst starts. `acquire` hands back the
/// exact pre-opened transport — there is no adapter layer in between, which
/// is what makes this the strategy capable of sub-microsecond release skew.
pub struct PreconnectStrategy {
	transports: Vec<Option<Transport>>,
}

impl PreconnectStrategy {
	pub fn new() -> Self {
		Self { transports: Vec::new() }
	}
}

impl Default for PreconnectStrategy {
	fn default() -> Self {
		Self::new()
	}
}

impl ConnectionStrategy for PreconnectStrategy {
	fn prepare(&mut self, n: usize, target: &TargetAddr) -> Result<(), Error> {
		let mut transports = Vec::with_capacity(n);
		for _ in 0..n {
			let stream = connect_plain(target)?;
			transports.push(Some(upgrade_tls(stream, target)?));
		}
		self.transports = transports;
		Ok(())
	}

	fn acquire(&mut self, worker_id: usize) -> Result<Transport, Error> {
		self.transports
			.get_mut(worker_id)
			.and_then(|slot| slot.take())
			.ok_or_else(|| Error::http(format!("no pre-warmed transport for worker {worker_id}")))
	}

	fn cleanup(&mut self) {
		self.transports.clear();
	}
}
