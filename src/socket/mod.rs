mod builder;
mod io;
mod lifecycle;
mod options;

pub use self::builder::{BufferConfig, ReuseConfig, SocketBuilder, TcpConfig, TimeoutConfig};
pub use self::lifecycle::{DEFAULT_BACKLOG, Socket};
pub use self::options::{Opt, SockOpt, ValueShape};

use crate::error::{Result, SocketError};

/// Delivery semantics of a socket.
///
/// - `Stream`: reliable, ordered byte stream (TCP-like)
/// - `Datagram`: unreliable, unordered packets (UDP-like)
/// - `SeqPacket`: reliable, ordered, message boundaries kept
/// - `Raw`: protocol-level packets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
	Stream,
	Datagram,
	SeqPacket,
	Raw,
}

impl Kind {
	/// Returns the libc constant for this socket type.
	#[inline]
	pub fn raw(self) -> libc::c_int {
		match self {
			Kind::Stream => libc::SOCK_STREAM,
			Kind::Datagram => libc::SOCK_DGRAM,
			Kind::SeqPacket => libc::SOCK_SEQPACKET,
			Kind::Raw => libc::SOCK_RAW,
		}
	}

	/// Maps an `SO_TYPE` value back, ignoring modifier bits.
	pub fn from_raw(raw: libc::c_int) -> Option<Self> {
		match raw & !(libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC) {
			libc::SOCK_STREAM => Some(Kind::Stream),
			libc::SOCK_DGRAM => Some(Kind::Datagram),
			libc::SOCK_SEQPACKET => Some(Kind::SeqPacket),
			libc::SOCK_RAW => Some(Kind::Raw),
			_ => None,
		}
	}

	/// Kinds that listen and accept.
	pub fn is_connection_oriented(self) -> bool {
		matches!(self, Kind::Stream | Kind::SeqPacket)
	}

	/// Kinds without message boundaries, where a payload may take several calls.
	pub fn is_byte_stream(self) -> bool {
		self == Kind::Stream
	}
}

bitflags::bitflags! {
	/// Creation-time modifiers OR'd into the socket type.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct Modifiers: i32 {
		/// Operations return would-block instead of waiting.
		const NONBLOCK = libc::SOCK_NONBLOCK;
		/// Descriptor is closed across exec().
		const CLOEXEC = libc::SOCK_CLOEXEC;
	}
}

bitflags::bitflags! {
	/// Flags for `send`/`send_to`.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct SendFlags: i32 {
		const EOR = libc::MSG_EOR;
		const OOB = libc::MSG_OOB;
		/// Report EPIPE instead of raising SIGPIPE.
		const NOSIGNAL = libc::MSG_NOSIGNAL;
		const DONTWAIT = libc::MSG_DONTWAIT;
		const MORE = libc::MSG_MORE;
	}
}

bitflags::bitflags! {
	/// Flags for `recv`/`recv_from`.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct RecvFlags: i32 {
		const PEEK = libc::MSG_PEEK;
		const OOB = libc::MSG_OOB;
		const WAITALL = libc::MSG_WAITALL;
		const DONTWAIT = libc::MSG_DONTWAIT;
	}
}

/// Direction(s) to shut down with `Socket::stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
	Read,       // SHUT_RD
	Write,      // SHUT_WR
	ReadWrite,  // SHUT_RDWR
}

impl Shutdown {
	pub(crate) fn raw(self) -> libc::c_int {
		match self {
			Shutdown::Read => libc::SHUT_RD,
			Shutdown::Write => libc::SHUT_WR,
			Shutdown::ReadWrite => libc::SHUT_RDWR,
		}
	}
}

/// Clears the caller's would-block flag at the start of an operation.
pub(crate) fn reset_flag(flag: &mut Option<&mut bool>) {
	if let Some(flag) = flag.as_deref_mut() {
		*flag = false;
	}
}

/// The would-block contract: record it in the caller's flag, or report the
/// missing flag as an input error.
pub(crate) fn flag_would_block(flag: Option<&mut bool>) -> Result<()> {
	match flag {
		Some(flag) => {
			*flag = true;
			Ok(())
		}
		None => Err(SocketError::missing_flag()),
	}
}
