use std::ffi::OsStr;
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use super::{AddressValue, Fill, FromSockAddr, ToSockAddr};

/// Size of `sockaddr_un.sun_path` on Linux.
///
/// A filesystem path needs one byte for the NUL terminator, so at most
/// `MAX_PATH_LEN - 1` path bytes fit.
pub const MAX_PATH_LEN: usize = 108;

const PATH_OFFSET: usize = std::mem::offset_of!(libc::sockaddr_un, sun_path);

/// Unix domain socket address (file path, abstract name, or unnamed).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalAddr {
	path: Vec<u8>,
	/// True if this is an abstract socket (Linux-only, no filesystem entry).
	is_abstract: bool,
}

impl LocalAddr {
	/// The address of a socket that was never bound.
	pub fn unnamed() -> Self {
		Self { path: Vec::new(), is_abstract: false }
	}

	/// Returns true if this is an abstract socket.
	pub fn is_abstract(&self) -> bool {
		self.is_abstract
	}

	pub fn is_unnamed(&self) -> bool {
		self.path.is_empty() && !self.is_abstract
	}

	/// Returns the path bytes (the name, for abstract sockets).
	pub fn path(&self) -> &[u8] {
		&self.path
	}

	/// Filesystem path, `None` for abstract and unnamed addresses.
	pub fn as_path(&self) -> Option<&Path> {
		if self.is_abstract || self.path.is_empty() {
			None
		} else {
			Some(Path::new(OsStr::from_bytes(&self.path)))
		}
	}

	/// Converts to the raw sockaddr_un plus the length to pass to the kernel.
	pub(crate) fn to_raw(&self) -> Option<(libc::sockaddr_un, libc::socklen_t)> {
		let mut addr: libc::sockaddr_un = unsafe { std::mem::zeroed() };
		addr.sun_family = libc::AF_UNIX as libc::sa_family_t;

		let used = if self.is_abstract {
			// sun_path[0] stays 0, the name follows without a terminator
			if self.path.len() + 1 > addr.sun_path.len() {
				return None;
			}
			for (i, &byte) in self.path.iter().enumerate() {
				addr.sun_path[i + 1] = byte as libc::c_char;
			}
			1 + self.path.len()
		} else if self.path.is_empty() {
			0
		} else {
			if self.path.len() >= addr.sun_path.len() {
				return None;
			}
			for (i, &byte) in self.path.iter().enumerate() {
				addr.sun_path[i] = byte as libc::c_char;
			}
			self.path.len() + 1
		};

		Some((addr, (PATH_OFFSET + used) as libc::socklen_t))
	}

	/// Creates from a raw sockaddr_un of which `len` bytes are valid.
	pub(crate) fn from_raw(raw: &libc::sockaddr_un, len: usize) -> Self {
		let used = len.saturating_sub(PATH_OFFSET).min(raw.sun_path.len());
		if used == 0 {
			return Self::unnamed();
		}

		let bytes: Vec<u8> = raw.sun_path[..used].iter().map(|&c| c as u8).collect();
		if bytes[0] == 0 {
			Self { path: bytes[1..].to_vec(), is_abstract: true }
		} else {
			let end = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
			Self { path: bytes[..end].to_vec(), is_abstract: false }
		}
	}
}

impl fmt::Display for LocalAddr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_abstract {
			write!(f, "@{}", String::from_utf8_lossy(&self.path))
		} else if self.path.is_empty() {
			f.write_str("(unnamed)")
		} else {
			f.write_str(&String::from_utf8_lossy(&self.path))
		}
	}
}

/// Fills `addr` with a filesystem-path endpoint.
///
/// Paths that do not fit `sun_path` with their terminator, empty paths and
/// paths containing NUL are rejected with `Fill::Invalid` rather than
/// truncated.
pub fn construct_local<P: AsRef<Path>>(addr: &mut AddressValue, path: P) -> Fill {
	*addr = AddressValue::Local(LocalAddr::unnamed());

	let bytes = path.as_ref().as_os_str().as_bytes();
	if bytes.is_empty() || bytes.len() >= MAX_PATH_LEN || bytes.contains(&0) {
		return Fill::Invalid;
	}

	*addr = AddressValue::Local(LocalAddr { path: bytes.to_vec(), is_abstract: false });
	Fill::Filled
}

/// Fills `addr` with an abstract-namespace endpoint (Linux-only).
///
/// Abstract sockets exist only in memory: no filesystem entry, nothing to
/// unlink. The name may contain any bytes.
pub fn construct_abstract<N: AsRef<[u8]>>(addr: &mut AddressValue, name: N) -> Fill {
	*addr = AddressValue::Local(LocalAddr::unnamed());

	let name = name.as_ref();
	if name.len() + 1 > MAX_PATH_LEN {
		return Fill::Invalid;
	}

	*addr = AddressValue::Local(LocalAddr { path: name.to_vec(), is_abstract: true });
	Fill::Filled
}

impl ToSockAddr for LocalAddr {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		let (raw, len) = self.to_raw()?;  // None if path too long
		let ptr = &raw as *const _ as *const libc::sockaddr;
		Some(f(ptr, len))
	}
}

impl FromSockAddr for LocalAddr {
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if len < std::mem::size_of::<libc::sa_family_t>() as libc::socklen_t {
			return None;
		}
		let raw = unsafe { &*(addr as *const libc::sockaddr_un) };
		Some(Self::from_raw(raw, len as usize))
	}
}
