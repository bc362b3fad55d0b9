//! Stream server started from one `address:port` string.

use crate::addr::{AddressValue, Endpoint, parse_endpoint};
use crate::error::{Result, SocketError};
use crate::multiplexer::{Handler, Multiplexer, MultiplexerConfig};
use crate::socket::{DEFAULT_BACKLOG, Kind, SocketBuilder};

/// A listening stream socket driven by a `Multiplexer`.
///
/// # Example
/// ```ignore
/// use unisock::{Action, Handler, Server, Socket, AddressValue};
///
/// struct Echo;
///
/// impl Handler for Echo {
///     fn on_request(&mut self, peer: &Socket, _addr: Option<&AddressValue>) -> Action {
///         let mut wb = false;
///         match peer.read(4096, Some(&mut wb)) {
///             Ok(data) if !data.is_empty() => { let _ = peer.write(&data, Some(&mut wb)); Action::Keep }
///             _ => Action::Close,
///         }
///     }
/// }
///
/// Server::bind("127.0.0.1:8080")?.run(&mut Echo)?;
/// ```
#[derive(Debug)]
pub struct Server {
	endpoint: Endpoint,
	multiplexer: Multiplexer,
}

impl Server {
	/// Parses `text`, binds a stream socket of the inferred family with
	/// `SO_REUSEADDR` and listens with `DEFAULT_BACKLOG`.
	pub fn bind(text: &str) -> Result<Self> {
		Self::bind_with_backlog(text, DEFAULT_BACKLOG)
	}

	pub fn bind_with_backlog(text: &str, backlog: i32) -> Result<Self> {
		Self::bind_with(text, backlog, MultiplexerConfig::default())
	}

	pub fn bind_with(text: &str, backlog: i32, config: MultiplexerConfig) -> Result<Self> {
		let endpoint = parse_endpoint(text)?;
		let mut socket = SocketBuilder::new(endpoint.family(), Kind::Stream).backlog(backlog).build()?;
		socket.bind(|addr| endpoint.fill(addr))?;
		socket.listen(backlog)?;

		let multiplexer = Multiplexer::with_config(socket, config)?;
		let server = Self { endpoint, multiplexer };
		match server.local_address() {
			Ok(addr) => log::info!("listening on {}", addr),
			Err(_) => log::info!("listening on {}:{}", server.endpoint.host(), server.endpoint.port()),
		}
		Ok(server)
	}

	/// The endpoint parsed from the bind string.
	pub fn endpoint(&self) -> &Endpoint {
		&self.endpoint
	}

	/// Address the listener is bound to, with the kernel-assigned port when
	/// the endpoint asked for port 0.
	pub fn local_address(&self) -> Result<AddressValue> {
		self.multiplexer
			.listener()
			.ok_or(SocketError::InvalidInput { reason: "server is no longer listening" })?
			.local_address()
	}

	pub fn multiplexer(&self) -> &Multiplexer {
		&self.multiplexer
	}

	/// Serves peers until the handler stops or every entry is gone.
	pub fn run<H: Handler>(&mut self, handler: &mut H) -> Result<()> {
		self.multiplexer.run(handler)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::addr::Family;

	#[test]
	fn binds_ephemeral_loopback() {
		let server = Server::bind("127.0.0.1:0").unwrap();
		assert_eq!(server.endpoint().family(), Family::Ipv4);
		let addr = server.local_address().unwrap();
		assert_ne!(addr.port(), Some(0));
		assert_eq!(server.multiplexer().live(), 1);
	}

	#[test]
	fn rejects_malformed_endpoint() {
		assert!(Server::bind("localhost").is_err());
		assert!(Server::bind("300.1.1.1:80").is_err());
	}
}
