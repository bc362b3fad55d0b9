use std::fmt;

use super::{FromSockAddr, ToSockAddr};

const FAMILY_LEN: usize = std::mem::size_of::<libc::sa_family_t>();
const STORAGE_LEN: usize = std::mem::size_of::<libc::sockaddr_storage>();

/// Opaque endpoint of a family without a dedicated representation
/// (`AF_PACKET`, `AF_NETLINK`, ...).
///
/// Holds the bytes that follow the family field of the kernel's sockaddr.
/// Callers fill `data` themselves in the family's native layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericAddr {
	family: libc::c_int,
	data: Vec<u8>,
}

impl GenericAddr {
	pub fn new(family: libc::c_int, data: Vec<u8>) -> Self {
		Self { family, data }
	}

	pub(crate) fn zeroed(family: libc::c_int) -> Self {
		Self { family, data: Vec::new() }
	}

	pub fn family(&self) -> libc::c_int {
		self.family
	}

	pub fn data(&self) -> &[u8] {
		&self.data
	}

	pub fn data_mut(&mut self) -> &mut Vec<u8> {
		&mut self.data
	}
}

impl fmt::Display for GenericAddr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "family {} ({} bytes)", self.family, self.data.len())
	}
}

impl ToSockAddr for GenericAddr {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		if FAMILY_LEN + self.data.len() > STORAGE_LEN {
			return None;
		}
		let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
		storage.ss_family = self.family as libc::sa_family_t;
		unsafe {
			let base = &mut storage as *mut _ as *mut u8;
			std::ptr::copy_nonoverlapping(self.data.as_ptr(), base.add(FAMILY_LEN), self.data.len());
		}
		let ptr = &storage as *const _ as *const libc::sockaddr;
		Some(f(ptr, (FAMILY_LEN + self.data.len()) as libc::socklen_t))
	}
}

impl FromSockAddr for GenericAddr {
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		let len = len as usize;
		if len < FAMILY_LEN || len > STORAGE_LEN {
			return None;
		}
		let family = unsafe { (*addr).sa_family } as libc::c_int;
		let data = unsafe {
			std::slice::from_raw_parts((addr as *const u8).add(FAMILY_LEN), len - FAMILY_LEN)
		}
		.to_vec();
		Some(Self { family, data })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn raw_round_trip() {
		let addr = GenericAddr::new(libc::AF_PACKET, vec![1, 2, 3, 4]);
		let back = addr
			.with_raw(|ptr, len| unsafe { GenericAddr::from_sockaddr(ptr, len) })
			.flatten();
		assert_eq!(back, Some(addr));
	}

	#[test]
	fn oversized_payload_is_rejected() {
		let addr = GenericAddr::new(libc::AF_PACKET, vec![0; STORAGE_LEN]);
		assert!(addr.with_raw(|_, _| ()).is_none());
	}
}
