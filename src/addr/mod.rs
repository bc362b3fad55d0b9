//! Address families and the family-tagged address value.
//!
//! This module defines the families a `Socket` can be created in:
//! - `Ipv4`: Internet Protocol version 4
//! - `Ipv6`: Internet Protocol version 6
//! - `Local`: Unix domain sockets (filesystem path or abstract name)
//! - `Other`: any other `AF_*` number, carried as opaque bytes
//!
//! Addresses are built through *fillers*: a function that receives a zeroed
//! `AddressValue` of the socket's family and reports a tri-state [`Fill`].

mod endpoint;
mod generic;
mod ipv4;
mod ipv6;
mod local;

use std::fmt;

pub use self::endpoint::{Endpoint, parse_endpoint, EPHEMERAL_PORTS};
pub use self::generic::GenericAddr;
pub use self::ipv4::{SocketAddrV4, construct_ipv4};
pub use self::ipv6::{SocketAddrV6, construct_ipv6};
pub use self::local::{LocalAddr, construct_local, construct_abstract, MAX_PATH_LEN};

/// Address family of a socket. Fixed for the lifetime of a `Socket`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
	Ipv4,
	Ipv6,
	Local,
	/// Raw `AF_*` value with no dedicated address representation.
	Other(i32),
}

impl Family {
	/// Returns the libc constant for this address family.
	#[inline]
	pub fn raw(self) -> libc::c_int {
		match self {
			Family::Ipv4 => libc::AF_INET,
			Family::Ipv6 => libc::AF_INET6,
			Family::Local => libc::AF_UNIX,
			Family::Other(raw) => raw,
		}
	}

	pub fn from_raw(raw: libc::c_int) -> Self {
		match raw {
			libc::AF_INET => Family::Ipv4,
			libc::AF_INET6 => Family::Ipv6,
			libc::AF_UNIX => Family::Local,
			other => Family::Other(other),
		}
	}

	/// True for the two Internet families.
	pub fn is_inet(self) -> bool {
		matches!(self, Family::Ipv4 | Family::Ipv6)
	}
}

impl fmt::Display for Family {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Family::Ipv4 => f.write_str("AF_INET"),
			Family::Ipv6 => f.write_str("AF_INET6"),
			Family::Local => f.write_str("AF_UNIX"),
			Family::Other(raw) => write!(f, "AF({})", raw),
		}
	}
}

/// Tri-state outcome of filling an address.
///
/// | variant       | code | meaning                                   |
/// |---------------|------|-------------------------------------------|
/// | `Filled`      | `1`  | address written and valid                 |
/// | `Invalid`     | `0`  | input rejected (bad text, port out of range) |
/// | `Failed(e)`   | `-1` | conversion failed for environmental reasons |
///
/// Every constructor in this module and every caller-supplied filler honors
/// this contract. `bind`/`connect` turn `Invalid` into an input error and
/// `Failed` into a system error, so the two must not be conflated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
	Filled,
	Invalid,
	Failed(i32),
}

impl Fill {
	/// Integer form of the result: `1`, `0` or `-1`.
	pub fn code(self) -> i32 {
		match self {
			Fill::Filled => 1,
			Fill::Invalid => 0,
			Fill::Failed(_) => -1,
		}
	}

	/// Interprets a C-style return code.
	///
	/// Negative codes read errno, so call this immediately after the call
	/// that produced `code`.
	pub fn from_code(code: i32) -> Self {
		match code {
			c if c >= 1 => Fill::Filled,
			0 => Fill::Invalid,
			_ => Fill::Failed(crate::error::errno()),
		}
	}

	pub fn is_filled(self) -> bool {
		self == Fill::Filled
	}
}

/// An endpoint of any family.
///
/// The variant is the family: a `V4` value can only ever be read as an IPv4
/// endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressValue {
	V4(SocketAddrV4),
	V6(SocketAddrV6),
	Local(LocalAddr),
	Generic(GenericAddr),
}

impl AddressValue {
	/// Fresh zeroed address of the given family.
	pub fn zeroed(family: Family) -> Self {
		match family {
			Family::Ipv4 => AddressValue::V4(SocketAddrV4::new([0; 4], 0)),
			Family::Ipv6 => AddressValue::V6(SocketAddrV6::new([0; 16], 0)),
			Family::Local => AddressValue::Local(LocalAddr::unnamed()),
			Family::Other(raw) => AddressValue::Generic(GenericAddr::zeroed(raw)),
		}
	}

	/// Builds an address of `family` from text.
	///
	/// `port` is ignored for `Local`. `Other` families have no textual form
	/// and always yield `Fill::Invalid`.
	pub fn construct(family: Family, text: &str, port: i32) -> (Fill, Self) {
		let mut addr = AddressValue::zeroed(family);
		let fill = match family {
			Family::Ipv4 => construct_ipv4(&mut addr, text, port),
			Family::Ipv6 => construct_ipv6(&mut addr, text, port),
			Family::Local => construct_local(&mut addr, text),
			Family::Other(_) => Fill::Invalid,
		};
		(fill, addr)
	}

	pub fn family(&self) -> Family {
		match self {
			AddressValue::V4(_) => Family::Ipv4,
			AddressValue::V6(_) => Family::Ipv6,
			AddressValue::Local(_) => Family::Local,
			AddressValue::Generic(g) => Family::Other(g.family()),
		}
	}

	/// Port of an Internet address.
	pub fn port(&self) -> Option<u16> {
		match self {
			AddressValue::V4(a) => Some(a.port()),
			AddressValue::V6(a) => Some(a.port()),
			_ => None,
		}
	}

	/// Textual host part: the IP for Internet families, the path for `Local`.
	pub fn ip_text(&self) -> Option<String> {
		match self {
			AddressValue::V4(a) => Some(a.ip_addr().to_string()),
			AddressValue::V6(a) => Some(a.ip_addr().to_string()),
			AddressValue::Local(a) => Some(String::from_utf8_lossy(a.path()).into_owned()),
			AddressValue::Generic(_) => None,
		}
	}

	pub fn as_v4(&self) -> Option<&SocketAddrV4> {
		match self {
			AddressValue::V4(a) => Some(a),
			_ => None,
		}
	}

	pub fn as_v6(&self) -> Option<&SocketAddrV6> {
		match self {
			AddressValue::V6(a) => Some(a),
			_ => None,
		}
	}

	pub fn as_local(&self) -> Option<&LocalAddr> {
		match self {
			AddressValue::Local(a) => Some(a),
			_ => None,
		}
	}

	/// Reads an address out of kernel-filled storage.
	///
	/// # Safety
	/// `storage` must have been written by the kernel with `len` valid bytes.
	pub(crate) unsafe fn from_storage(storage: &libc::sockaddr_storage, len: libc::socklen_t) -> Option<Self> {
		let ptr = storage as *const _ as *const libc::sockaddr;
		unsafe {
			match storage.ss_family as libc::c_int {
				libc::AF_INET => SocketAddrV4::from_sockaddr(ptr, len).map(AddressValue::V4),
				libc::AF_INET6 => SocketAddrV6::from_sockaddr(ptr, len).map(AddressValue::V6),
				libc::AF_UNIX => LocalAddr::from_sockaddr(ptr, len).map(AddressValue::Local),
				_ => GenericAddr::from_sockaddr(ptr, len).map(AddressValue::Generic),
			}
		}
	}
}

impl fmt::Display for AddressValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AddressValue::V4(a) => a.fmt(f),
			AddressValue::V6(a) => a.fmt(f),
			AddressValue::Local(a) => a.fmt(f),
			AddressValue::Generic(a) => a.fmt(f),
		}
	}
}

impl From<std::net::SocketAddr> for AddressValue {
	fn from(addr: std::net::SocketAddr) -> Self {
		match addr {
			std::net::SocketAddr::V4(a) => AddressValue::V4(a.into()),
			std::net::SocketAddr::V6(a) => AddressValue::V6(a.into()),
		}
	}
}

/// Validates a caller-supplied port.
pub(crate) fn checked_port(port: i32) -> Option<u16> {
	u16::try_from(port).ok()
}

/// Trait for address types that can be converted to raw sockaddr for syscalls.
pub trait ToSockAddr {
	/// Calls the provided closure with a pointer to the raw sockaddr and its size.
	/// Returns None if the address cannot be represented.
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R;
}

impl ToSockAddr for AddressValue {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		match self {
			AddressValue::V4(a) => a.with_raw(f),
			AddressValue::V6(a) => a.with_raw(f),
			AddressValue::Local(a) => a.with_raw(f),
			AddressValue::Generic(a) => a.with_raw(f),
		}
	}
}

/// Trait for address types that can be created from raw sockaddr.
pub trait FromSockAddr: Sized {
	/// Creates address from raw sockaddr storage.
	///
	/// # Safety
	/// The sockaddr must be of the correct family for this type and `len`
	/// bytes must be readable.
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn zeroed_matches_family() {
		for family in [Family::Ipv4, Family::Ipv6, Family::Local, Family::Other(libc::AF_PACKET)] {
			assert_eq!(AddressValue::zeroed(family).family(), family);
		}
	}

	#[test]
	fn family_round_trips_raw() {
		for family in [Family::Ipv4, Family::Ipv6, Family::Local, Family::Other(libc::AF_NETLINK)] {
			assert_eq!(Family::from_raw(family.raw()), family);
		}
	}

	#[test]
	fn construct_assigns_family_from_constructor() {
		let (fill, addr) = AddressValue::construct(Family::Ipv6, "::1", 80);
		assert_eq!(fill, Fill::Filled);
		assert_eq!(addr.family(), Family::Ipv6);

		// IPv4 text through the IPv6 constructor is rejected, never reinterpreted.
		let (fill, addr) = AddressValue::construct(Family::Ipv6, "127.0.0.1", 80);
		assert_eq!(fill, Fill::Invalid);
		assert_eq!(addr.family(), Family::Ipv6);
	}

	#[test]
	fn other_family_has_no_text_form() {
		let (fill, _) = AddressValue::construct(Family::Other(libc::AF_PACKET), "eth0", 0);
		assert_eq!(fill, Fill::Invalid);
	}

	#[test]
	fn fill_codes() {
		assert_eq!(Fill::Filled.code(), 1);
		assert_eq!(Fill::Invalid.code(), 0);
		assert_eq!(Fill::Failed(libc::EINVAL).code(), -1);
		assert_eq!(Fill::from_code(1), Fill::Filled);
		assert_eq!(Fill::from_code(0), Fill::Invalid);
		assert!(matches!(Fill::from_code(-1), Fill::Failed(_)));
	}

	#[test]
	fn checked_port_bounds() {
		assert_eq!(checked_port(0), Some(0));
		assert_eq!(checked_port(65535), Some(65535));
		assert_eq!(checked_port(65536), None);
		assert_eq!(checked_port(-1), None);
	}
}
