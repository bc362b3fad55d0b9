use std::time::Duration;

use crate::addr::Family;
use crate::error::Result;
use super::{DEFAULT_BACKLOG, Kind, Modifiers, Opt, SockOpt, Socket};

// ============================================================================
// Shared Configuration Structs
// ============================================================================

/// `SO_RCVBUF` / `SO_SNDBUF` sizes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferConfig {
	pub recv: Option<usize>,
	pub send: Option<usize>,
}

impl BufferConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn recv(mut self, size: usize) -> Self {
		self.recv = Some(size);
		self
	}

	pub fn send(mut self, size: usize) -> Self {
		self.send = Some(size);
		self
	}

	pub fn both(mut self, size: usize) -> Self {
		self.recv = Some(size);
		self.send = Some(size);
		self
	}

	/// Linux stores twice the requested size.
	fn apply(&self, socket: &Socket) -> Result<()> {
		if let Some(size) = self.recv {
			socket.set_opt(Opt::RcvBuf, SockOpt::Int(clamp(size)))?;
		}
		if let Some(size) = self.send {
			socket.set_opt(Opt::SndBuf, SockOpt::Int(clamp(size)))?;
		}
		Ok(())
	}
}

fn clamp(size: usize) -> i32 {
	i32::try_from(size).unwrap_or(i32::MAX)
}

/// `SO_REUSEADDR` / `SO_REUSEPORT` switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReuseConfig {
	pub addr: bool,
	pub port: bool,
}

impl ReuseConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn addr(mut self, enable: bool) -> Self {
		self.addr = enable;
		self
	}

	pub fn port(mut self, enable: bool) -> Self {
		self.port = enable;
		self
	}

	/// Turns on both switches.
	pub fn both(mut self) -> Self {
		self.addr = true;
		self.port = true;
		self
	}

	fn apply(&self, socket: &Socket) -> Result<()> {
		if self.addr {
			socket.set_opt(Opt::ReuseAddr, true.into())?;
		}
		if self.port {
			socket.set_opt(Opt::ReusePort, true.into())?;
		}
		Ok(())
	}
}

/// Stream tuning. TCP-level entries are skipped on sockets that are not
/// Internet streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConfig {
	pub nodelay: bool,
	pub keepalive: bool,
	pub linger: Option<Option<u32>>,
	pub max_segment: Option<u32>,
}

impl TcpConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn nodelay(mut self, enable: bool) -> Self {
		self.nodelay = enable;
		self
	}

	pub fn keepalive(mut self, enable: bool) -> Self {
		self.keepalive = enable;
		self
	}

	/// `Some(None)` turns lingering off, `Some(Some(n))` waits up to `n`
	/// seconds on close; zero resets the connection.
	pub fn linger(mut self, seconds: Option<u32>) -> Self {
		self.linger = Some(seconds);
		self
	}

	pub fn max_segment(mut self, bytes: u32) -> Self {
		self.max_segment = Some(bytes);
		self
	}

	fn apply(&self, socket: &Socket) -> Result<()> {
		let is_tcp = socket.family().is_inet() && socket.kind() == Kind::Stream;
		if is_tcp && self.nodelay {
			socket.set_opt(Opt::NoDelay, true.into())?;
		}
		if is_tcp {
			if let Some(bytes) = self.max_segment {
				socket.set_opt(Opt::MaxSeg, SockOpt::Int(clamp(bytes as usize)))?;
			}
		}
		if self.keepalive {
			socket.set_opt(Opt::KeepAlive, true.into())?;
		}
		if let Some(linger) = self.linger {
			let value = match linger {
				None => SockOpt::Linger { enabled: false, seconds: 0 },
				Some(seconds) => SockOpt::Linger { enabled: true, seconds: clamp(seconds as usize) },
			};
			socket.set_opt(Opt::Linger, value)?;
		}
		Ok(())
	}
}

/// `SO_RCVTIMEO` / `SO_SNDTIMEO` for blocking sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutConfig {
	pub recv: Option<Duration>,
	pub send: Option<Duration>,
}

impl TimeoutConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn recv(mut self, timeout: Duration) -> Self {
		self.recv = Some(timeout);
		self
	}

	pub fn send(mut self, timeout: Duration) -> Self {
		self.send = Some(timeout);
		self
	}

	fn apply(&self, socket: &Socket) -> Result<()> {
		if let Some(timeout) = self.recv {
			socket.set_opt(Opt::RcvTimeo, timeout.into())?;
		}
		if let Some(timeout) = self.send {
			socket.set_opt(Opt::SndTimeo, timeout.into())?;
		}
		Ok(())
	}
}

// ============================================================================
// Socket Builder
// ============================================================================

/// Creates and configures a `Socket` in one expression.
///
/// # Example
/// ```ignore
/// use unisock::{Family, Kind, SocketBuilder, ReuseConfig, TcpConfig};
///
/// let listener = SocketBuilder::new(Family::Ipv4, Kind::Stream)
///     .reuse(ReuseConfig::new().both())
///     .tcp(TcpConfig::new().nodelay(true))
///     .backlog(4096)
///     .listen("0.0.0.0", 8080)?;
/// ```
#[derive(Debug, Clone)]
pub struct SocketBuilder {
	family: Family,
	kind: Kind,
	protocol: i32,
	modifiers: Modifiers,
	reuse: ReuseConfig,
	tcp: TcpConfig,
	buffers: BufferConfig,
	timeouts: TimeoutConfig,
	backlog: i32,
}

impl SocketBuilder {
	/// Defaults: protocol 0, close-on-exec, `SO_REUSEADDR` for kinds that
	/// listen, `DEFAULT_BACKLOG`.
	pub fn new(family: Family, kind: Kind) -> Self {
		Self {
			family,
			kind,
			protocol: 0,
			modifiers: Modifiers::CLOEXEC,
			reuse: ReuseConfig::new().addr(kind.is_connection_oriented()),
			tcp: TcpConfig::default(),
			buffers: BufferConfig::default(),
			timeouts: TimeoutConfig::default(),
			backlog: DEFAULT_BACKLOG,
		}
	}

	pub fn protocol(mut self, protocol: i32) -> Self {
		self.protocol = protocol;
		self
	}

	pub fn nonblocking(mut self, enable: bool) -> Self {
		self.modifiers.set(Modifiers::NONBLOCK, enable);
		self
	}

	pub fn cloexec(mut self, enable: bool) -> Self {
		self.modifiers.set(Modifiers::CLOEXEC, enable);
		self
	}

	pub fn reuse(mut self, config: ReuseConfig) -> Self {
		self.reuse = config;
		self
	}

	/// Set TCP options (TCP-level ones are ignored off Internet streams).
	pub fn tcp(mut self, config: TcpConfig) -> Self {
		self.tcp = config;
		self
	}

	pub fn buffers(mut self, config: BufferConfig) -> Self {
		self.buffers = config;
		self
	}

	pub fn timeouts(mut self, config: TimeoutConfig) -> Self {
		self.timeouts = config;
		self
	}

	/// Set listen backlog. Default: `SOMAXCONN`.
	pub fn backlog(mut self, backlog: i32) -> Self {
		self.backlog = backlog;
		self
	}

	/// Creates the socket and applies every configured option.
	pub fn build(&self) -> Result<Socket> {
		let socket = Socket::with_modifiers(self.family, self.kind, self.modifiers, self.protocol)?;
		self.reuse.apply(&socket)?;
		self.tcp.apply(&socket)?;
		self.buffers.apply(&socket)?;
		self.timeouts.apply(&socket)?;
		Ok(socket)
	}

	/// Builds, binds to `text`/`port` and listens (for kinds that listen).
	pub fn listen(&self, text: &str, port: i32) -> Result<Socket> {
		let mut socket = self.build()?;
		socket.start_with_backlog(text, port, self.backlog)?;
		Ok(socket)
	}

	/// Builds and connects to `text`/`port`.
	pub fn connect(&self, text: &str, port: i32, would_block: Option<&mut bool>) -> Result<Socket> {
		let mut socket = self.build()?;
		socket.connect(text, port, would_block)?;
		Ok(socket)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults() {
		let b = SocketBuilder::new(Family::Ipv4, Kind::Stream);
		assert!(b.reuse.addr);
		assert!(b.modifiers.contains(Modifiers::CLOEXEC));
		assert_eq!(b.backlog, DEFAULT_BACKLOG);

		let b = SocketBuilder::new(Family::Ipv4, Kind::Datagram);
		assert!(!b.reuse.addr);
	}

	#[test]
	fn build_applies_options() {
		let s = SocketBuilder::new(Family::Ipv4, Kind::Stream)
			.nonblocking(true)
			.tcp(TcpConfig::new().nodelay(true).keepalive(true).linger(Some(5)))
			.timeouts(TimeoutConfig::new().recv(Duration::from_secs(3)))
			.build()
			.unwrap();

		assert!(s.is_nonblocking().unwrap());
		assert_eq!(s.get_opt(Opt::ReuseAddr).unwrap(), 1);
		assert_eq!(s.get_opt(Opt::NoDelay).unwrap(), 1);
		assert_eq!(s.get_opt(Opt::KeepAlive).unwrap(), 1);
		assert_eq!(s.get_opt(Opt::Linger).unwrap().linger().unwrap(), (true, 5));
		assert_eq!(s.get_opt(Opt::RcvTimeo).unwrap().time().unwrap().0, 3);
	}

	#[test]
	fn tcp_options_skipped_on_local_sockets() {
		let s = SocketBuilder::new(Family::Local, Kind::Stream)
			.tcp(TcpConfig::new().nodelay(true).max_segment(1200))
			.build()
			.unwrap();
		assert_eq!(s.family(), Family::Local);
	}
}
