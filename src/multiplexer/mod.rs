//! Single-threaded readiness loop over one listener and its accepted peers.
//!
//! The listener is entry 0 of a poll table. Each sweep:
//! - accepts one peer when the listener is readable
//! - hands every ready peer to exactly one `Handler` callback
//! - marks closed or invalid entries dead (descriptor `-1`)
//!
//! Dead entries stay in the table until its length reaches the compaction
//! threshold, which defaults to the process's open-file soft limit.

mod events;
mod limits;
mod table;

pub use self::events::Events;
pub use self::limits::open_file_limit;

use crate::addr::AddressValue;
use crate::error::{Result, SocketError, check};
use crate::socket::{Modifiers, RecvFlags, Socket};
use self::events::{Pending, PeerEvent, classify};
use self::table::ConnectionTable;

/// What the loop does with a peer after a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
	/// Leave the peer in the table.
	Keep,
	/// Close the peer and mark its entry dead.
	Close,
	/// Close everything and return from `run`.
	Stop,
}

/// Callbacks for peer events.
///
/// `addr` is the peer's address as recorded when it was accepted.
/// At most one callback runs per peer per sweep, chosen in the order
/// request, error, close. No callback runs for a peer after `on_close`.
pub trait Handler {
	/// A new peer was accepted and added to the table.
	fn on_accept(&mut self, _peer: &Socket, _addr: Option<&AddressValue>) -> Action {
		Action::Keep
	}

	/// The peer has data to read.
	fn on_request(&mut self, peer: &Socket, addr: Option<&AddressValue>) -> Action;

	/// The peer reported an error condition. Closes it by default.
	fn on_error(&mut self, _peer: &Socket, _addr: Option<&AddressValue>) -> Action {
		Action::Close
	}

	/// The peer hung up. Its entry is closed after this returns, whatever the
	/// result, unless the result is `Stop`.
	fn on_close(&mut self, _peer: &Socket, _addr: Option<&AddressValue>) -> Action {
		Action::Keep
	}
}

/// Multiplexer tuning.
#[derive(Debug, Clone, Copy)]
pub struct MultiplexerConfig {
	/// Table length at which dead entries are removed. `None` uses
	/// `open_file_limit()`.
	pub compact_threshold: Option<usize>,
	/// Accept peers with `O_NONBLOCK`, so handlers can drain them with a
	/// would-block flag.
	pub nonblocking_peers: bool,
}

impl Default for MultiplexerConfig {
	fn default() -> Self {
		Self { compact_threshold: None, nonblocking_peers: true }
	}
}

impl MultiplexerConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn compact_threshold(mut self, len: usize) -> Self {
		self.compact_threshold = Some(len);
		self
	}

	pub fn nonblocking_peers(mut self, enable: bool) -> Self {
		self.nonblocking_peers = enable;
		self
	}
}

/// Poll-driven dispatcher owning a listening socket and its peers.
#[derive(Debug)]
pub struct Multiplexer {
	table: ConnectionTable<Socket>,
	/// Entry 0 is still the listener.
	listening: bool,
	threshold: usize,
	peer_modifiers: Modifiers,
}

impl Multiplexer {
	/// Takes ownership of a listening socket.
	pub fn new(listener: Socket) -> Result<Self> {
		Self::with_config(listener, MultiplexerConfig::default())
	}

	pub fn with_config(listener: Socket, config: MultiplexerConfig) -> Result<Self> {
		let threshold = match config.compact_threshold {
			Some(len) => len,
			None => open_file_limit()?,
		};
		let mut peer_modifiers = Modifiers::CLOEXEC;
		peer_modifiers.set(Modifiers::NONBLOCK, config.nonblocking_peers);

		let mut table = ConnectionTable::new();
		table.push(listener.as_raw_fd(), Events::LISTENER, listener);
		log::debug!("multiplexer ready, compaction at {} entries", threshold);
		Ok(Self { table, listening: true, threshold, peer_modifiers })
	}

	/// Entries in the table, dead ones included.
	pub fn len(&self) -> usize {
		self.table.len()
	}

	pub fn is_empty(&self) -> bool {
		self.table.len() == 0
	}

	/// Entries still polled, the listener included.
	pub fn live(&self) -> usize {
		self.table.live()
	}

	/// Entries marked dead and not yet compacted.
	pub fn dead(&self) -> usize {
		self.table.dead()
	}

	/// The listening socket, while it is still in the table.
	pub fn listener(&self) -> Option<&Socket> {
		if self.listening { self.table.get(0) } else { None }
	}

	/// Runs until no live entry remains or a callback returns `Stop`.
	///
	/// A failing `poll` or `accept` ends the loop with that error; the table
	/// keeps its entries so the caller may inspect or resume.
	pub fn run<H: Handler>(&mut self, handler: &mut H) -> Result<()> {
		while self.table.live() > 0 {
			if self.sweep(handler)? == Action::Stop {
				log::debug!("multiplexer stopped by handler");
				self.table.clear();
				self.table.compact();
				self.listening = false;
				break;
			}
		}
		Ok(())
	}

	/// One poll plus one pass over the table.
	///
	/// With no live entry left there is nothing to wait on, and the sweep
	/// returns `Stop` without polling.
	pub fn sweep<H: Handler>(&mut self, handler: &mut H) -> Result<Action> {
		if self.table.live() == 0 {
			return Ok(Action::Stop);
		}
		self.poll()?;

		// Peers accepted during this pass are polled next time.
		let len = self.table.len();
		for index in 0..len {
			let revents = self.table.revents(index);
			if revents.is_empty() {
				continue;
			}

			if revents.is_invalid() {
				log::warn!("entry {} is not an open descriptor, marking dead", index);
				self.kill(index);
				continue;
			}

			let action = if index == 0 && self.listening {
				self.service_listener(revents, handler)?
			} else {
				self.service_peer(index, revents, handler)
			};
			if action == Action::Stop {
				return Ok(Action::Stop);
			}
		}

		if self.table.len() >= self.threshold {
			let removed = self.table.compact();
			log::debug!("compacted {} dead entries", removed);
		}
		Ok(Action::Keep)
	}

	fn poll(&mut self) -> Result<()> {
		let fds = self.table.pollfds_mut();
		loop {
			let ret = check(unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) });
			match ret {
				Ok(ready) => {
					log::trace!("poll: {} of {} ready", ready, fds.len());
					return Ok(());
				}
				Err(libc::EINTR) => continue,
				Err(errno) => return Err(SocketError::Poll { errno }),
			}
		}
	}

	fn service_listener<H: Handler>(&mut self, revents: Events, handler: &mut H) -> Result<Action> {
		let Some(listener) = self.table.get(0) else {
			return Ok(Action::Keep);
		};

		if !revents.is_readable() {
			match listener.take_error()? {
				Some(e) => log::warn!("listener error: {}", e),
				None => log::warn!("listener reported {:?}", revents),
			}
			return Ok(Action::Keep);
		}

		let mut would_block = false;
		let peer = match listener.accept_with(self.peer_modifiers, Some(&mut would_block)) {
			Ok(Some(peer)) => peer,
			Ok(None) => return Ok(Action::Keep),
			Err(e) if e.errno() == Some(libc::ECONNABORTED) => {
				log::debug!("peer aborted before accept");
				return Ok(Action::Keep);
			}
			Err(e) => return Err(e),
		};

		let index = self.table.push(peer.as_raw_fd(), Events::PEER, peer);
		let Some(peer) = self.table.get(index) else {
			return Ok(Action::Keep);
		};
		log::trace!("entry {} accepted", index);
		let action = handler.on_accept(peer, peer.peer());
		if action == Action::Close {
			self.kill(index);
		}
		Ok(action)
	}

	fn service_peer<H: Handler>(&mut self, index: usize, revents: Events, handler: &mut H) -> Action {
		let Some(peer) = self.table.get(index) else {
			return Action::Keep;
		};

		let Some(event) = classify(revents, peer.kind().is_byte_stream(), || peek(peer)) else {
			return Action::Keep;
		};
		log::trace!("entry {} {:?} on {:?}", index, event, revents);

		let action = match event {
			PeerEvent::Request => handler.on_request(peer, peer.peer()),
			PeerEvent::Error => handler.on_error(peer, peer.peer()),
			PeerEvent::Close => {
				let action = handler.on_close(peer, peer.peer());
				self.kill(index);
				return action;
			}
		};
		if action == Action::Close {
			self.kill(index);
		}
		action
	}

	fn kill(&mut self, index: usize) {
		if index == 0 && self.listening {
			self.listening = false;
		}
		drop(self.table.kill(index));
	}
}

/// Looks at the next queued read without consuming it.
fn peek(peer: &Socket) -> Pending {
	let mut would_block = false;
	match peer.recv(1, RecvFlags::PEEK | RecvFlags::DONTWAIT, Some(&mut would_block)) {
		Ok(_) if would_block => Pending::Nothing,
		Ok(bytes) if bytes.is_empty() => Pending::Empty,
		Ok(_) => Pending::Data,
		Err(e) => {
			log::debug!("peek failed: {}", e);
			Pending::Nothing
		}
	}
}
