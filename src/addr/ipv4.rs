use std::fmt;
use std::net::Ipv4Addr;

use super::{AddressValue, Fill, FromSockAddr, ToSockAddr, checked_port};

/// IPv4 socket address (IP + port).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketAddrV4 {
	ip: [u8; 4],
	port: u16,
}

impl SocketAddrV4 {
	/// Address from octets and a host-order port.
	pub fn new(ip: [u8; 4], port: u16) -> Self {
		Self { ip, port }
	}

	/// Reads a kernel-filled `sockaddr_in`.
	pub(crate) fn from_raw(raw: &libc::sockaddr_in) -> Self {
		Self {
			ip: raw.sin_addr.s_addr.to_ne_bytes(),
			port: u16::from_be(raw.sin_port),
		}
	}

	/// Octets in network order.
	pub fn ip(&self) -> [u8; 4] {
		self.ip
	}

	pub fn ip_addr(&self) -> Ipv4Addr {
		Ipv4Addr::from(self.ip)
	}

	/// Returns the port.
	pub fn port(&self) -> u16 {
		self.port
	}

	/// `sockaddr_in` with port and address in network byte order.
	pub(crate) fn to_raw(&self) -> libc::sockaddr_in {
		libc::sockaddr_in {
			sin_family: libc::AF_INET as libc::sa_family_t,
			sin_port: self.port.to_be(),
			sin_addr: libc::in_addr {
				s_addr: u32::from_ne_bytes(self.ip),
			},
			sin_zero: [0; 8],
		}
	}
}

impl fmt::Display for SocketAddrV4 {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.ip_addr(), self.port)
	}
}

impl From<std::net::SocketAddrV4> for SocketAddrV4 {
	fn from(addr: std::net::SocketAddrV4) -> Self {
		Self::new(addr.ip().octets(), addr.port())
	}
}

impl From<SocketAddrV4> for std::net::SocketAddrV4 {
	fn from(addr: SocketAddrV4) -> Self {
		std::net::SocketAddrV4::new(addr.ip_addr(), addr.port)
	}
}

/// Fills `addr` with an IPv4 endpoint parsed from dotted-quad `text`.
///
/// `"*"` selects the loopback address. The port must lie in `0..=65535`.
/// `addr` always ends up as a `V4` value, zeroed when the input is rejected.
pub fn construct_ipv4(addr: &mut AddressValue, text: &str, port: i32) -> Fill {
	*addr = AddressValue::V4(SocketAddrV4::new([0; 4], 0));

	let Some(port) = checked_port(port) else {
		return Fill::Invalid;
	};
	let ip = if text == "*" {
		Ipv4Addr::LOCALHOST
	} else {
		match text.parse::<Ipv4Addr>() {
			Ok(ip) => ip,
			Err(_) => return Fill::Invalid,
		}
	};

	*addr = AddressValue::V4(SocketAddrV4::new(ip.octets(), port));
	Fill::Filled
}

impl ToSockAddr for SocketAddrV4 {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		let raw = self.to_raw();
		let ptr = &raw as *const _ as *const libc::sockaddr;
		let len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
		Some(f(ptr, len))
	}
}

impl FromSockAddr for SocketAddrV4 {
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if len < std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t {
			return None;
		}
		let raw = unsafe { &*(addr as *const libc::sockaddr_in) };
		Some(Self::from_raw(raw))
	}
}
