use std::mem::ManuallyDrop;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

use crate::addr::{AddressValue, Family, Fill, ToSockAddr, construct_ipv4, construct_ipv6, construct_local};
use crate::error::{Result, SocketError, check, is_would_block};
use super::{Kind, Modifiers, Shutdown, flag_would_block, reset_flag};

/// Backlog used by `start` when the caller does not pick one.
pub const DEFAULT_BACKLOG: i32 = libc::SOMAXCONN;

/// One socket of any family and kind.
///
/// Owns its descriptor exclusively; moving a `Socket` moves the descriptor,
/// there is no way to copy one. Dropping it closes the descriptor, and a
/// `Local` socket that was bound to a filesystem path also unlinks the path
/// so the next bind to it succeeds.
///
/// Operations that may block take `would_block: Option<&mut bool>`. On a
/// non-blocking socket, an operation that cannot proceed sets the flag and
/// returns normally; if no flag was passed, the same outcome is an
/// `InputInvalid` error.
#[derive(Debug)]
pub struct Socket {
	fd: OwnedFd,
	family: Family,
	kind: Kind,
	/// Address bound through this value.
	local: Option<AddressValue>,
	/// Peer reported by accept(), or the address last connected to.
	peer: Option<AddressValue>,
}

impl Socket {
	/// Creates a new socket.
	///
	/// Calls the `socket()` syscall with the family, kind and protocol.
	pub fn new(family: Family, kind: Kind, protocol: i32) -> Result<Self> {
		Self::with_modifiers(family, kind, Modifiers::empty(), protocol)
	}

	/// Creates a new socket with creation-time modifiers.
	pub fn with_modifiers(family: Family, kind: Kind, modifiers: Modifiers, protocol: i32) -> Result<Self> {
		let fd = check(unsafe {
			libc::socket(family.raw(), kind.raw() | modifiers.bits(), protocol)
		})
		.map_err(|errno| SocketError::Create { errno })?;

		log::debug!("socket({}, {:?}, {}) = {}", family, kind, protocol, fd);
		let fd = unsafe { OwnedFd::from_raw_fd(fd) };
		Ok(Self { fd, family, kind, local: None, peer: None })
	}

	/// Wraps a descriptor that accept() produced.
	pub(crate) fn from_accepted(fd: OwnedFd, family: Family, kind: Kind, peer: Option<AddressValue>) -> Self {
		Self { fd, family, kind, local: None, peer }
	}

	/// Returns the raw file descriptor.
	///
	/// Used for syscalls and polling. Does not transfer ownership.
	#[inline]
	pub fn as_raw_fd(&self) -> libc::c_int {
		self.fd.as_raw_fd()
	}

	pub fn family(&self) -> Family {
		self.family
	}

	pub fn kind(&self) -> Kind {
		self.kind
	}

	/// Address this socket was bound to through `bind`/`start`.
	pub fn bound_address(&self) -> Option<&AddressValue> {
		self.local.as_ref()
	}

	/// Peer resolved when this socket was accepted or connected.
	pub fn peer(&self) -> Option<&AddressValue> {
		self.peer.as_ref()
	}

	/// Runs `filler` against a zeroed address of this socket's family and
	/// applies the tri-state contract.
	pub(crate) fn fill_address<F>(&self, filler: F) -> Result<AddressValue>
	where
		F: FnOnce(&mut AddressValue) -> Fill,
	{
		let mut addr = AddressValue::zeroed(self.family);
		match filler(&mut addr) {
			Fill::Filled => {}
			Fill::Invalid => return Err(SocketError::InvalidInput { reason: "address argument invalid" }),
			Fill::Failed(errno) => return Err(SocketError::Filler { errno }),
		}
		if addr.family() != self.family {
			return Err(SocketError::FamilyMismatch {
				expected: self.family.to_string(),
				found: addr.family().to_string(),
			});
		}
		Ok(addr)
	}

	/// Binds the socket to the address produced by `filler`.
	///
	/// `filler` receives a zeroed address of this socket's family. It may fill
	/// it from text (`construct_ipv4` and friends) or assign it by hand; its
	/// `Fill` result decides what happens:
	/// - `Filled`: bind() is attempted
	/// - `Invalid`: `InputInvalid` error, no syscall
	/// - `Failed`: system error, no syscall
	pub fn bind<F>(&mut self, filler: F) -> Result<()>
	where
		F: FnOnce(&mut AddressValue) -> Fill,
	{
		let addr = self.fill_address(filler)?;
		let fd = self.as_raw_fd();
		let result = addr.with_raw(|ptr, len| check(unsafe { libc::bind(fd, ptr, len) }));

		match result {
			Some(Ok(_)) => {
				log::debug!("bind({}) on fd {}", addr, fd);
				self.local = Some(addr);
				Ok(())
			}
			Some(Err(errno)) => Err(SocketError::Bind { errno, addr: addr.to_string() }),
			None => Err(SocketError::InvalidInput { reason: "address cannot be represented" }),
		}
	}

	/// Marks a bound socket as passive.
	pub fn listen(&self, backlog: i32) -> Result<()> {
		check(unsafe { libc::listen(self.as_raw_fd(), backlog) })
			.map_err(|errno| SocketError::Listen { errno, backlog })?;
		log::debug!("listen(backlog={}) on fd {}", backlog, self.as_raw_fd());
		Ok(())
	}

	/// Binds to `text`/`port` and, for Stream and SeqPacket kinds, listens
	/// with `DEFAULT_BACKLOG`.
	///
	/// `port` is ignored for `Local` sockets, where `text` is the path.
	pub fn start(&mut self, text: &str, port: i32) -> Result<()> {
		self.start_with_backlog(text, port, DEFAULT_BACKLOG)
	}

	pub fn start_with_backlog(&mut self, text: &str, port: i32, backlog: i32) -> Result<()> {
		match self.family {
			Family::Ipv4 => self.bind(|addr| construct_ipv4(addr, text, port))?,
			Family::Ipv6 => self.bind(|addr| construct_ipv6(addr, text, port))?,
			Family::Local => self.bind(|addr| construct_local(addr, text))?,
			Family::Other(_) => return Err(SocketError::Unsupported { reason: "protocol not implemented" }),
		}

		if self.kind.is_connection_oriented() {
			self.listen(backlog)?;
		}
		Ok(())
	}

	/// Connects to `text`/`port` (the path, for `Local` sockets).
	///
	/// On a non-blocking socket the connection usually cannot complete at
	/// once; `would_block` is then set and the caller waits for writability
	/// and checks `take_error()`.
	pub fn connect(&mut self, text: &str, port: i32, would_block: Option<&mut bool>) -> Result<()> {
		match self.family {
			Family::Ipv4 => self.connect_with(|addr| construct_ipv4(addr, text, port), would_block),
			Family::Ipv6 => self.connect_with(|addr| construct_ipv6(addr, text, port), would_block),
			Family::Local => self.connect_with(|addr| construct_local(addr, text), would_block),
			Family::Other(_) => Err(SocketError::Unsupported { reason: "protocol not implemented" }),
		}
	}

	/// Connects to the address produced by `filler` (same contract as `bind`).
	pub fn connect_with<F>(&mut self, filler: F, mut would_block: Option<&mut bool>) -> Result<()>
	where
		F: FnOnce(&mut AddressValue) -> Fill,
	{
		reset_flag(&mut would_block);
		let addr = self.fill_address(filler)?;
		let fd = self.as_raw_fd();
		let result = addr.with_raw(|ptr, len| check(unsafe { libc::connect(fd, ptr, len) }));

		match result {
			Some(Ok(_)) => {
				log::debug!("connect({}) on fd {}", addr, fd);
				self.peer = Some(addr);
				Ok(())
			}
			// Unix sockets report a full backlog as EAGAIN
			Some(Err(e)) if e == libc::EINPROGRESS || is_would_block(e) => {
				log::debug!("connect({}) on fd {} in progress", addr, fd);
				self.peer = Some(addr);
				flag_would_block(would_block)
			}
			Some(Err(errno)) => Err(SocketError::Connect { errno, addr: addr.to_string() }),
			None => Err(SocketError::InvalidInput { reason: "address cannot be represented" }),
		}
	}

	/// Accepts one pending connection.
	///
	/// Returns the server-side socket for the peer, carrying the peer's
	/// address. `Ok(None)` means the listener is non-blocking, nothing was
	/// pending and `would_block` has been set.
	pub fn accept(&self, would_block: Option<&mut bool>) -> Result<Option<Socket>> {
		self.accept_with(Modifiers::CLOEXEC, would_block)
	}

	/// `accept` with modifiers applied to the new descriptor.
	pub fn accept_with(&self, modifiers: Modifiers, mut would_block: Option<&mut bool>) -> Result<Option<Socket>> {
		reset_flag(&mut would_block);

		let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
		let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;

		let fd = loop {
			let ret = check(unsafe {
				libc::accept4(
					self.as_raw_fd(),
					&mut storage as *mut _ as *mut libc::sockaddr,
					&mut len,
					modifiers.bits(),
				)
			});
			match ret {
				Ok(fd) => break fd,
				Err(libc::EINTR) => continue,
				Err(e) if is_would_block(e) => {
					flag_would_block(would_block)?;
					return Ok(None);
				}
				Err(errno) => return Err(SocketError::Accept { errno }),
			}
		};

		let fd = unsafe { OwnedFd::from_raw_fd(fd) };
		let peer = unsafe { AddressValue::from_storage(&storage, len) };
		match &peer {
			Some(peer) => log::debug!("accept() = {} from {}", fd.as_raw_fd(), peer),
			None => log::debug!("accept() = {}", fd.as_raw_fd()),
		}
		Ok(Some(Socket::from_accepted(fd, self.family, self.kind, peer)))
	}

	/// Sets or clears `O_NONBLOCK` after creation.
	pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
		let flags = check(unsafe { libc::fcntl(self.as_raw_fd(), libc::F_GETFL) })
			.map_err(|errno| SocketError::Fcntl { errno, op: "F_GETFL" })?;

		let new_flags = if nonblocking {
			flags | libc::O_NONBLOCK
		} else {
			flags & !libc::O_NONBLOCK
		};

		check(unsafe { libc::fcntl(self.as_raw_fd(), libc::F_SETFL, new_flags) })
			.map_err(|errno| SocketError::Fcntl { errno, op: "F_SETFL" })?;
		Ok(())
	}

	pub fn is_nonblocking(&self) -> Result<bool> {
		let flags = check(unsafe { libc::fcntl(self.as_raw_fd(), libc::F_GETFL) })
			.map_err(|errno| SocketError::Fcntl { errno, op: "F_GETFL" })?;
		Ok(flags & libc::O_NONBLOCK != 0)
	}

	/// Address the kernel reports for this end (getsockname).
	pub fn local_address(&self) -> Result<AddressValue> {
		self.name(libc::getsockname, "getsockname")
	}

	/// Address of the other end.
	///
	/// Served from the address recorded at accept/connect time when there is
	/// one, otherwise asked from the kernel (getpeername).
	pub fn peer_address(&self) -> Result<AddressValue> {
		match &self.peer {
			Some(peer) => Ok(peer.clone()),
			None => self.name(libc::getpeername, "getpeername"),
		}
	}

	fn name(
		&self,
		call: unsafe extern "C" fn(libc::c_int, *mut libc::sockaddr, *mut libc::socklen_t) -> libc::c_int,
		op: &'static str,
	) -> Result<AddressValue> {
		let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
		let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;

		check(unsafe { call(self.as_raw_fd(), &mut storage as *mut _ as *mut libc::sockaddr, &mut len) })
			.map_err(|errno| SocketError::Name { errno, op })?;

		unsafe { AddressValue::from_storage(&storage, len) }
			.ok_or(SocketError::InvalidInput { reason: "kernel returned an unreadable address" })
	}

	/// Reads and clears the socket error status (`SO_ERROR`).
	///
	/// Returns `None` if no error (a pending connect succeeded).
	/// Call after the socket polls writable following a non-blocking
	/// `connect`. Reading clears the error.
	pub fn take_error(&self) -> Result<Option<std::io::Error>> {
		let mut error: libc::c_int = 0;
		let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;

		check(unsafe {
			libc::getsockopt(
				self.as_raw_fd(),
				libc::SOL_SOCKET,
				libc::SO_ERROR,
				&mut error as *mut _ as *mut libc::c_void,
				&mut len,
			)
		})
		.map_err(|errno| SocketError::GetOption { errno, option: "SO_ERROR" })?;

		if error == 0 {
			Ok(None)
		} else {
			Ok(Some(std::io::Error::from_raw_os_error(error)))
		}
	}

	/// Shuts down one or both directions. The descriptor stays open.
	pub fn stop(&self, how: Shutdown) -> Result<()> {
		check(unsafe { libc::shutdown(self.as_raw_fd(), how.raw()) })
			.map_err(|errno| SocketError::Shutdown { errno })?;
		Ok(())
	}

	/// Closes the socket, reporting a failing close().
	///
	/// Dropping a `Socket` does the same but cannot report errors.
	pub fn close(self) -> Result<()> {
		self.unlink_bound_path();
		let fd = self.into_owned_fd();
		let raw = fd.into_raw_fd();
		log::debug!("close({})", raw);
		check(unsafe { libc::close(raw) }).map_err(|errno| SocketError::Close { errno })?;
		Ok(())
	}

	/// Removes the filesystem entry of a bound `Local` socket.
	fn unlink_bound_path(&self) {
		let Some(AddressValue::Local(local)) = &self.local else {
			return;
		};
		let Some(path) = local.as_path() else {
			return;
		};
		match std::fs::remove_file(path) {
			Ok(()) => log::debug!("unlinked {}", path.display()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
			Err(e) => log::warn!("failed to unlink {}: {}", path.display(), e),
		}
	}

	/// Takes the descriptor out without running `Drop`.
	fn into_owned_fd(self) -> OwnedFd {
		let this = ManuallyDrop::new(self);
		// SAFETY: `this` is never used or dropped again; each field is read once.
		unsafe {
			drop(std::ptr::read(&this.local));
			drop(std::ptr::read(&this.peer));
			std::ptr::read(&this.fd)
		}
	}
}

impl Drop for Socket {
	fn drop(&mut self) {
		self.unlink_bound_path();
	}
}

impl AsRawFd for Socket {
	fn as_raw_fd(&self) -> RawFd {
		self.fd.as_raw_fd()
	}
}

impl AsFd for Socket {
	fn as_fd(&self) -> BorrowedFd<'_> {
		self.fd.as_fd()
	}
}

/// Releases the descriptor to the caller. A bound path is left in place.
impl IntoRawFd for Socket {
	fn into_raw_fd(self) -> RawFd {
		self.into_owned_fd().into_raw_fd()
	}
}
