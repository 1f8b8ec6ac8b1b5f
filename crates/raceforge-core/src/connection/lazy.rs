use super::{connect_plain, upgrade_tls, ConnectionStrategy, TargetAddr, Transport};
use crate::error::Error;

/// Opens a connection on demand in `acquire`, during the race itself. Release
/// skew is dominated by TCP/TLS handshake time and is unsuitable for tight
/// races; kept for parity with workflows that intentionally race over cold
/// connections.
pub struct LazyStrategy {
	target: Option<TargetAddr>,
}

impl LazyStrategy {
	pub fn new() -> Self {
		Self { target: None }
	}
}

impl Default for LazyStrategy {
	fn default() -> Self {
		Self::new()
	}
}

impl ConnectionStrategy for LazyStrategy {
	fn prepare(&mut self, _n: usize, target: &TargetAddr) -> Result<(), Error> {
		tracing::warn!("lazy connection strategy defeats tight release skew; each worker handshakes during the race");
		self.target = Some(target.clone());
		Ok(())
	}

	fn acquire(&mut self, _worker_id: usize) -> Result<Transport, Error> {
		let target = self.target.as_ref().ok_or_else(|| Error::http("lazy strategy not prepared"))?;
		let stream = connect_plain(target)?;
		upgrade_tls(stream, target)
	}
}
