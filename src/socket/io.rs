//! Data transfer on a `Socket`.
//!
//! Byte-stream sockets loop until the whole payload has moved or the kernel
//! stops making progress. Message sockets (datagram, seqpacket, raw) move one
//! message per call, so there is nothing to loop over.
//!
//! Would-block handling:
//! - nothing moved: the caller's flag is set (or `InputInvalid` without one)
//! - a read moved some bytes: those bytes are returned, flag untouched
//! - a write moved some bytes: the count is returned and the flag is set,
//!   so the caller knows the rest is still pending

use crate::addr::{AddressValue, Fill, ToSockAddr};
use crate::error::{Result, SocketError, check_len, is_would_block};
use super::{RecvFlags, SendFlags, Socket, flag_would_block, reset_flag};

impl Socket {
	/// Writes `msg` with `write()`. Returns the number of bytes written.
	pub fn write(&self, msg: &[u8], would_block: Option<&mut bool>) -> Result<usize> {
		let fd = self.as_raw_fd();
		self.write_loop(msg, "write", would_block, |chunk| unsafe {
			libc::write(fd, chunk.as_ptr() as *const libc::c_void, chunk.len())
		})
	}

	/// Reads up to `n` bytes with `read()`.
	///
	/// A byte stream keeps reading until `n` bytes arrived or the peer closed;
	/// an empty result on a blocking stream means end-of-stream.
	pub fn read(&self, n: usize, would_block: Option<&mut bool>) -> Result<Vec<u8>> {
		let fd = self.as_raw_fd();
		self.read_loop(n, "read", would_block, |chunk| unsafe {
			libc::read(fd, chunk.as_mut_ptr() as *mut libc::c_void, chunk.len())
		})
	}

	/// `write` through `send()` with flags.
	pub fn send(&self, msg: &[u8], flags: SendFlags, would_block: Option<&mut bool>) -> Result<usize> {
		let fd = self.as_raw_fd();
		self.write_loop(msg, "send", would_block, |chunk| unsafe {
			libc::send(fd, chunk.as_ptr() as *const libc::c_void, chunk.len(), flags.bits())
		})
	}

	/// `read` through `recv()` with flags.
	pub fn recv(&self, n: usize, flags: RecvFlags, would_block: Option<&mut bool>) -> Result<Vec<u8>> {
		let fd = self.as_raw_fd();
		self.read_loop(n, "recv", would_block, |chunk| unsafe {
			libc::recv(fd, chunk.as_mut_ptr() as *mut libc::c_void, chunk.len(), flags.bits())
		})
	}

	/// Sends one message to the address produced by `filler`.
	///
	/// The filler follows the same tri-state contract as `bind`; an unfilled
	/// address never reaches the kernel.
	pub fn send_to<F>(&self, msg: &[u8], filler: F, flags: SendFlags, mut would_block: Option<&mut bool>) -> Result<usize>
	where
		F: FnOnce(&mut AddressValue) -> Fill,
	{
		reset_flag(&mut would_block);
		let addr = self.fill_address(filler)?;
		let fd = self.as_raw_fd();

		loop {
			let ret = addr.with_raw(|ptr, len| {
				check_len(unsafe {
					libc::sendto(fd, msg.as_ptr() as *const libc::c_void, msg.len(), flags.bits(), ptr, len)
				})
			});
			match ret {
				Some(Ok(sent)) => {
					log::trace!("sendto({}) on fd {} = {}", addr, fd, sent);
					return Ok(sent);
				}
				Some(Err(libc::EINTR)) => continue,
				Some(Err(e)) if is_would_block(e) => {
					flag_would_block(would_block)?;
					return Ok(0);
				}
				Some(Err(errno)) => return Err(SocketError::Write { errno, op: "sendto" }),
				None => return Err(SocketError::InvalidInput { reason: "address cannot be represented" }),
			}
		}
	}

	/// Receives one message of at most `n` bytes and the sender's address.
	///
	/// The address is `None` when the kernel reports none, as on a connected
	/// stream.
	pub fn recv_from(
		&self,
		n: usize,
		flags: RecvFlags,
		mut would_block: Option<&mut bool>,
	) -> Result<(Vec<u8>, Option<AddressValue>)> {
		reset_flag(&mut would_block);
		if n == 0 {
			return Ok((Vec::new(), None));
		}
		let mut buf = vec![0u8; n];
		let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
		let fd = self.as_raw_fd();

		let (received, len) = loop {
			let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
			let ret = check_len(unsafe {
				libc::recvfrom(
					fd,
					buf.as_mut_ptr() as *mut libc::c_void,
					buf.len(),
					flags.bits(),
					&mut storage as *mut _ as *mut libc::sockaddr,
					&mut len,
				)
			});
			match ret {
				Ok(received) => break (received, len),
				Err(libc::EINTR) => continue,
				Err(e) if is_would_block(e) => {
					flag_would_block(would_block)?;
					return Ok((Vec::new(), None));
				}
				Err(errno) => return Err(SocketError::Read { errno, op: "recvfrom" }),
			}
		};

		// Truncated datagrams report their full length under MSG_TRUNC only.
		buf.truncate(received.min(n));
		let from = unsafe { AddressValue::from_storage(&storage, len) };
		log::trace!("recvfrom on fd {} = {} bytes", fd, buf.len());
		Ok((buf, from))
	}

	fn write_loop<F>(&self, msg: &[u8], op: &'static str, mut would_block: Option<&mut bool>, mut call: F) -> Result<usize>
	where
		F: FnMut(&[u8]) -> libc::ssize_t,
	{
		reset_flag(&mut would_block);
		let single = !self.kind().is_byte_stream();
		let mut written = 0;

		while written < msg.len() || (single && written == 0) {
			match check_len(call(&msg[written..])) {
				Ok(0) => break,
				Ok(n) => {
					log::trace!("{}() on fd {} = {}", op, self.as_raw_fd(), n);
					written += n;
					if single {
						break;
					}
				}
				Err(libc::EINTR) => continue,
				Err(e) if is_would_block(e) => {
					flag_would_block(would_block)?;
					break;
				}
				Err(errno) => return Err(SocketError::Write { errno, op }),
			}
		}
		Ok(written)
	}

	fn read_loop<F>(&self, n: usize, op: &'static str, mut would_block: Option<&mut bool>, mut call: F) -> Result<Vec<u8>>
	where
		F: FnMut(&mut [u8]) -> libc::ssize_t,
	{
		reset_flag(&mut would_block);
		// A zero-length buffer would still consume a whole message.
		if n == 0 {
			return Ok(Vec::new());
		}
		let single = !self.kind().is_byte_stream();
		let mut buf = vec![0u8; n];
		let mut filled = 0;

		while filled < n || (single && filled == 0) {
			match check_len(call(&mut buf[filled..])) {
				Ok(0) => break,
				Ok(got) => {
					log::trace!("{}() on fd {} = {}", op, self.as_raw_fd(), got);
					filled += got.min(n - filled);
					if single {
						break;
					}
				}
				Err(libc::EINTR) => continue,
				Err(e) if is_would_block(e) => {
					if filled == 0 {
						flag_would_block(would_block)?;
					}
					break;
				}
				Err(errno) => return Err(SocketError::Read { errno, op }),
			}
		}
		buf.truncate(filled);
		Ok(buf)
	}
}

/// Single `read()` per call; would-block surfaces as `ErrorKind::WouldBlock`.
impl std::io::Read for Socket {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		let n = unsafe { libc::read(self.as_raw_fd(), buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
		check_len(n).map_err(|errno| SocketError::Read { errno, op: "read" }.into())
	}
}

impl std::io::Write for Socket {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		let n = unsafe { libc::write(self.as_raw_fd(), buf.as_ptr() as *const libc::c_void, buf.len()) };
		check_len(n).map_err(|errno| SocketError::Write { errno, op: "write" }.into())
	}

	fn flush(&mut self) -> std::io::Result<()> {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use crate::addr::Family;
	use crate::error::ErrorCategory;
	use crate::socket::{Kind, RecvFlags, Shutdown, Socket};

	fn pair(kind: Kind) -> (Socket, Socket) {
		let mut fds = [0; 2];
		let ret = unsafe { libc::socketpair(libc::AF_UNIX, kind.raw() | libc::SOCK_CLOEXEC, 0, fds.as_mut_ptr()) };
		assert_eq!(ret, 0);
		let wrap = |fd| {
			let fd = unsafe { <std::os::fd::OwnedFd as std::os::fd::FromRawFd>::from_raw_fd(fd) };
			Socket::from_accepted(fd, Family::Local, kind, None)
		};
		(wrap(fds[0]), wrap(fds[1]))
	}

	#[test]
	fn stream_read_stops_at_eof() {
		let (a, b) = pair(Kind::Stream);
		assert_eq!(a.write(b"hello", None).unwrap(), 5);
		a.stop(Shutdown::Write).unwrap();
		assert_eq!(b.read(64, None).unwrap(), b"hello");
		assert!(b.read(64, None).unwrap().is_empty());
	}

	#[test]
	fn datagram_read_takes_one_message() {
		let (a, b) = pair(Kind::Datagram);
		a.write(b"one", None).unwrap();
		a.write(b"two", None).unwrap();
		assert_eq!(b.read(64, None).unwrap(), b"one");
		assert_eq!(b.read(64, None).unwrap(), b"two");
	}

	#[test]
	fn zero_length_read_leaves_message_queued() {
		let (a, b) = pair(Kind::Datagram);
		a.write(b"kept", None).unwrap();
		assert!(b.read(0, None).unwrap().is_empty());
		assert!(b.recv(0, RecvFlags::empty(), None).unwrap().is_empty());
		assert_eq!(b.recv_from(0, RecvFlags::empty(), None).unwrap(), (Vec::new(), None));
		assert_eq!(b.read(64, None).unwrap(), b"kept");

		// nothing queued and blocking: returns instead of waiting
		assert!(b.read(0, None).unwrap().is_empty());
	}

	#[test]
	fn nonblocking_read_uses_flag() {
		let (a, b) = pair(Kind::Stream);
		b.set_nonblocking(true).unwrap();

		let mut wb = true;
		assert!(b.read(16, Some(&mut wb)).unwrap().is_empty());
		assert!(wb);

		let err = b.read(16, None).unwrap_err();
		assert_eq!(err.category(), ErrorCategory::InputInvalid);

		// partial data is returned without raising the flag
		a.write(b"abc", None).unwrap();
		assert_eq!(b.read(16, Some(&mut wb)).unwrap(), b"abc");
		assert!(!wb);
	}

	#[test]
	fn partial_write_sets_flag() {
		let (a, _b) = pair(Kind::Stream);
		a.set_nonblocking(true).unwrap();
		let big = vec![7u8; 8 * 1024 * 1024];
		let mut wb = false;
		let n = a.write(&big, Some(&mut wb)).unwrap();
		assert!(n < big.len());
		assert!(wb);
	}
}
