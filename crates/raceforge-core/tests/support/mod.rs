use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;

/// A minimal single-purpose HTTP/1.1 test double: accepts connections on a
/// background thread and answers every request with the same canned bytes.
/// Mirrors the shape of the teacher's wiremock-based test harness (a struct
/// owning a background server, torn down when the test ends) without an
/// async runtime, since this crate's HTTP client is synchronous.
pub struct MockServer {
	addr: SocketAddr,
}

impl MockServer {
	/// Starts a server that answers every request on a fresh connection with
	/// `response_bytes`, e.g. `b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok"`.
	pub fn start_fixed(response_bytes: &'static [u8]) -> Self {
		let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
		let addr = listener.local_addr().expect("local addr");
		std::thread::spawn(move || {
			for stream in listener.incoming() {
				let Ok(mut stream) = stream else { break };
				std::thread::spawn(move || {
					let _ = read_request(&mut stream);
					let _ = stream.write_all(response_bytes);
				});
			}
		});
		Self { addr }
	}

	/// Starts a server whose responder closure is invoked once per
	/// connection and returns the raw response bytes to send back.
	pub fn start_with(responder: impl Fn(usize) -> Vec<u8> + Send + Sync + 'static) -> Self {
		let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
		let addr = listener.local_addr().expect("local addr");
		let responder = Arc::new(responder);
		let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
		std::thread::spawn(move || {
			for stream in listener.incoming() {
				let Ok(mut stream) = stream else { break };
				let responder = Arc::clone(&responder);
				let counter = Arc::clone(&counter);
				std::thread::spawn(move || {
					let _ = read_request(&mut stream);
					let id = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
					let _ = stream.write_all(&responder(id));
				});
			}
		});
		Self { addr }
	}

	pub fn host(&self) -> String {
		self.addr.ip().to_string()
	}

	pub fn port(&self) -> u16 {
		self.addr.port()
	}
}

fn read_request(stream: &mut std::net::TcpStream) -> std::io::Result<Vec<u8>> {
	let mut buf = Vec::new();
	let mut chunk = [0u8; 4096];
	loop {
		let n = stream.read(&mut chunk)?;
		if n == 0 {
			break;
		}
		buf.extend_from_slice(&chunk[..n]);
		if buf.windows(4).any(|w| w == b"\r\n\r\n") {
			break;
		}
	}
	Ok(buf)
}
