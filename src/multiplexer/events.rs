bitflags::bitflags! {
	/// Readiness bits of a `pollfd`.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct Events: i16 {
		/// Data to read, or a pending connection on a listener.
		const IN = libc::POLLIN;
		/// Urgent data to read.
		const PRI = libc::POLLPRI;
		/// Writing will not block.
		const OUT = libc::POLLOUT;
		/// Peer shut down its writing half.
		const RDHUP = libc::POLLRDHUP;
		/// Error condition (output only).
		const ERR = libc::POLLERR;
		/// Hang up (output only).
		const HUP = libc::POLLHUP;
		/// Descriptor not open (output only).
		const NVAL = libc::POLLNVAL;
	}
}

impl Events {
	/// Mask requested for the listening socket.
	pub const LISTENER: Events = Events::IN.union(Events::ERR).union(Events::NVAL);

	/// Mask requested for every accepted peer.
	pub const PEER: Events = Events::IN
		.union(Events::ERR)
		.union(Events::HUP)
		.union(Events::RDHUP)
		.union(Events::NVAL);

	pub fn is_readable(self) -> bool {
		self.contains(Events::IN)
	}

	pub fn is_error(self) -> bool {
		self.contains(Events::ERR)
	}

	/// Either side hung up.
	pub fn is_hangup(self) -> bool {
		self.intersects(Events::HUP | Events::RDHUP)
	}

	pub fn is_invalid(self) -> bool {
		self.contains(Events::NVAL)
	}
}

/// What a peer's readiness means, in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PeerEvent {
	Request,
	Error,
	Close,
}

/// Result of peeking at a readable peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pending {
	/// At least one byte is queued.
	Data,
	/// The next read returns nothing: end-of-stream on a byte stream, or a
	/// zero-length record on a message kind.
	Empty,
	/// Nothing queued after all, or the peek itself failed.
	Nothing,
}

/// Picks the one dispatch a ready peer gets.
///
/// `peek` runs only for readable peers. An empty read counts as a close on
/// byte streams or when the kernel also reported a hangup; otherwise it is a
/// zero-length message and goes to the handler.
pub(crate) fn classify(revents: Events, byte_stream: bool, peek: impl FnOnce() -> Pending) -> Option<PeerEvent> {
	let pending = if revents.is_readable() { peek() } else { Pending::Nothing };
	match pending {
		Pending::Data => return Some(PeerEvent::Request),
		Pending::Empty if !byte_stream && !revents.is_hangup() && !revents.is_error() => {
			return Some(PeerEvent::Request);
		}
		Pending::Empty | Pending::Nothing => {}
	}

	if revents.is_error() {
		Some(PeerEvent::Error)
	} else if revents.is_hangup() || (byte_stream && pending == Pending::Empty) {
		Some(PeerEvent::Close)
	} else {
		None
	}
}
