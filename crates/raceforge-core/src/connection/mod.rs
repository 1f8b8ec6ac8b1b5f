mod lazy;
mod pooled;
mod preconnect;

pub use lazy::LazyStrategy;
pub use pooled::{PooledStrategy, MAX_POOL_SIZE};
pub use preconnect::PreconnectStrategy;

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, StreamOwned};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Which connection strategy a race block uses, per §4.4. Tagged by
/// `connection_strategy` in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
	Preconnect,
	Lazy,
	Pooled,
	/// Treated as preconnect-equivalent pending genuine HTTP/2 stream
	/// interleaving (SPEC_FULL.md §9).
	Multiplexed,
}

/// A transport handed to a single race worker: either a plain TCP stream or
/// one wrapped in TLS.
pub enum Transport {
	Plain(TcpStream),
	Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Read for Transport {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		match self {
			Transport::Plain(s) => s.read(buf),
			Transport::Tls(s) => s.read(buf),
		}
	}
}

impl Write for Transport {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		match self {
			Transport::Plain(s) => s.write(buf),
			Transport::Tls(s) => s.write(buf),
		}
	}

	fn flush(&mut self) -> std::io::Result<()> {
		match self {
			Transport::Plain(s) => s.flush(),
			Transport::Tls(s) => s.flush(),
		}
	}
}

/// Everything a connection strategy needs to open a transport to the target.
#[derive(Debug, Clone)]
pub struct TargetAddr {
	pub host: String,
	pub port: u16,
	pub tls: bool,
	pub verify_cert: bool,
	pub connect_timeout: Duration,
	pub read_timeout: Duration,
}

/// Common contract implemented by every connection strategy (§4.4).
pub trait ConnectionStrategy: Send {
	/// Opens/registers whatever `n` transports require before a burst.
	fn prepare(&mut self, n: usize, target: &TargetAddr) -> Result<(), Error>;
	/// Hands a transport to worker `worker_id`. Called from the worker's own
	/// thread, strictly before the release barrier.
	fn acquire(&mut self, worker_id: usize) -> Result<Transport, Error>;
	/// Returns a transport after use. Most strategies no-op here.
	fn release(&mut self, _worker_id: usize, _transport: Transport) {}
	/// Tears down any transports `prepare` opened but `acquire` never
	/// claimed.
	fn cleanup(&mut self) {}
}

pub fn connect_plain(target: &TargetAddr) -> Result<TcpStream, Error> {
	let stream = TcpStream::connect_timeout(&resolve(target)?, target.connect_timeout).map_err(|e| Error::http(format!("connect failed: {e}")))?;
	stream.set_nodelay(true).map_err(|e| Error::http(format!("failed to set TCP_NODELAY: {e}")))?;
	stream.set_read_timeout(Some(target.read_timeout)).map_err(|e| Error::http(format!("failed to set read timeout: {e}")))?;
	stream.set_write_timeout(Some(target.read_timeout)).map_err(|e| Error::http(format!("failed to set write timeout: {e}")))?;
	Ok(stream)
}

pub fn upgrade_tls(stream: TcpStream, target: &TargetAddr) -> Result<Transport, Error> {
	if !target.tls {
		return Ok(Transport::Plain(stream));
	}
	let config = tls_config(target)?;
	let server_name = ServerName::try_from(target.host.clone()).map_err(|e| Error::http(format!("invalid TLS server name: {e}")))?;
	let conn = ClientConnection::new(std::sync::Arc::new(config), server_name).map_err(|e| Error::http(format!("TLS handshake setup failed: {e}")))?;
	Ok(Transport::Tls(Box::new(StreamOwned::new(conn, stream))))
}

fn tls_config(target: &TargetAddr) -> Result<ClientConfig, Error> {
	if target.verify_cert {
		let mut roots = rustls::RootCertStore::empty();
		for cert in rustls_native_certs::load_native_certs().certs {
			let _ = roots.add(cert);
		}
		Ok(ClientConfig::builder().with_root_certificates(roots).with_no_client_auth())
	} else {
		Ok(ClientConfig::builder()
			.dangerous()
			.with_custom_certificate_verifier(std::sync::Arc::new(NoVerify))
			.with_no_client_auth())
	}
}

fn resolve(target: &TargetAddr) -> Result<std::net::SocketAddr, Error> {
	use std::net::ToSocketAddrs;
	(target.host.as_str(), target.port)
		.to_socket_addrs()
		.map_err(|e| Error::http(format!("dns resolution failed: {e}")))?
		.next()
		.ok_or_else(|| Error::http("dns resolution returned no addresses"))
}

#[derive(Debug)]
struct NoVerify;

impl rustls::client::danger::ServerCertVerifier for NoVerify {
	fn verify_server_cert(
		&self,
		_end_entity: &rustls::pki_types::CertificateDer<'_>,
		_intermediates: &[rustls::pki_types::CertificateDer<'_>],
		_server_name: &ServerName<'_>,
		_ocsp_response: &[u8],
		_now: rustls::pki_types::UnixTime,
	) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
		Ok(rustls::client::danger::ServerCertVerified::assertion())
	}

	fn verify_tls12_signature(
		&self,
		_message: &[u8],
		_cert: &rustls::pki_types::CertificateDer<'_>,
		_dss: &rustls::DigitallySignedStruct,
	) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
		Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
	}

	fn verify_tls13_signature(
		&self,
		_message: &[u8],
		_cert: &rustls::pki_types::CertificateDer<'_>,
		_dss: &rustls::DigitallySignedStruct,
	) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
		Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
	}

	fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
		rustls::crypto::aws_lc_rs::default_provider().signature_verification_algorithms.supported_schemes()
	}
}

pub fn make_strategy(kind: StrategyKind) -> Box<dyn ConnectionStrategy> {
	match kind {
		StrategyKind::Preconnect => Box::new(PreconnectStrategy::new()),
		StrategyKind::Multiplexed => {
			tracing::info!("multiplexed connection strategy requested; using preconnect (no HTTP/2 stream interleaving yet)");
			Box::new(PreconnectStrategy::new())
		}
		StrategyKind::Lazy => Box::new(LazyStrategy::new()),
		StrategyKind::Pooled => Box::new(PooledStrategy::new()),
	}
}
