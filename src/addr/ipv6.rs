use std::fmt;
use std::net::Ipv6Addr;

use super::{AddressValue, Fill, FromSockAddr, ToSockAddr, checked_port};

/// IPv6 endpoint with an optional interface scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketAddrV6 {
	ip: [u8; 16],
	port: u16,
	flowinfo: u32,
	/// Interface index; only meaningful for `fe80::/10`.
	scope_id: u32,
}

impl SocketAddrV6 {
	/// Address with scope id and flow info zero.
	pub fn new(ip: [u8; 16], port: u16) -> Self {
		Self { ip, port, flowinfo: 0, scope_id: 0 }
	}

	/// Link-local form bound to interface `scope_id`.
	pub fn with_scope(ip: [u8; 16], port: u16, scope_id: u32) -> Self {
		Self { ip, port, flowinfo: 0, scope_id }
	}

	/// Octets in network order.
	pub fn ip(&self) -> [u8; 16] {
		self.ip
	}

	pub fn ip_addr(&self) -> Ipv6Addr {
		Ipv6Addr::from(self.ip)
	}

	pub fn port(&self) -> u16 {
		self.port
	}

	pub fn flowinfo(&self) -> u32 {
		self.flowinfo
	}

	pub fn scope_id(&self) -> u32 {
		self.scope_id
	}

	/// `sockaddr_in6`; flow info goes out in network byte order.
	pub(crate) fn to_raw(&self) -> libc::sockaddr_in6 {
		libc::sockaddr_in6 {
			sin6_family: libc::AF_INET6 as libc::sa_family_t,
			sin6_port: self.port.to_be(),
			sin6_flowinfo: self.flowinfo.to_be(),
			sin6_addr: libc::in6_addr {
				s6_addr: self.ip,
			},
			sin6_scope_id: self.scope_id,
		}
	}

	/// Reads a kernel-filled `sockaddr_in6`.
	pub(crate) fn from_raw(raw: &libc::sockaddr_in6) -> Self {
		Self {
			ip: raw.sin6_addr.s6_addr,
			port: u16::from_be(raw.sin6_port),
			flowinfo: u32::from_be(raw.sin6_flowinfo),
			scope_id: raw.sin6_scope_id,
		}
	}
}

impl fmt::Display for SocketAddrV6 {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.scope_id == 0 {
			write!(f, "[{}]:{}", self.ip_addr(), self.port)
		} else {
			write!(f, "[{}%{}]:{}", self.ip_addr(), self.scope_id, self.port)
		}
	}
}

impl From<std::net::SocketAddrV6> for SocketAddrV6 {
	fn from(addr: std::net::SocketAddrV6) -> Self {
		Self {
			ip: addr.ip().octets(),
			port: addr.port(),
			flowinfo: addr.flowinfo(),
			scope_id: addr.scope_id(),
		}
	}
}

impl From<SocketAddrV6> for std::net::SocketAddrV6 {
	fn from(addr: SocketAddrV6) -> Self {
		std::net::SocketAddrV6::new(addr.ip_addr(), addr.port, addr.flowinfo, addr.scope_id)
	}
}

/// Fills `addr` with an IPv6 endpoint parsed from colon-hex `text`.
///
/// `"*"` selects `::1`. A numeric `%scope` suffix sets the scope id.
/// `addr` always ends up as a `V6` value, zeroed when the input is rejected.
pub fn construct_ipv6(addr: &mut AddressValue, text: &str, port: i32) -> Fill {
	*addr = AddressValue::V6(SocketAddrV6::new([0; 16], 0));

	let Some(port) = checked_port(port) else {
		return Fill::Invalid;
	};
	if text == "*" {
		*addr = AddressValue::V6(SocketAddrV6::new(Ipv6Addr::LOCALHOST.octets(), port));
		return Fill::Filled;
	}

	let (host, scope) = match text.split_once('%') {
		Some((host, scope)) => match scope.parse::<u32>() {
			Ok(scope) => (host, scope),
			Err(_) => return Fill::Invalid,
		},
		None => (text, 0),
	};
	let Ok(ip) = host.parse::<Ipv6Addr>() else {
		return Fill::Invalid;
	};

	*addr = AddressValue::V6(SocketAddrV6::with_scope(ip.octets(), port, scope));
	Fill::Filled
}

impl ToSockAddr for SocketAddrV6 {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		let raw = self.to_raw();
		let ptr = &raw as *const _ as *const libc::sockaddr;
		let len = std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t;
		Some(f(ptr, len))
	}
}

impl FromSockAddr for SocketAddrV6 {
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if len < std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t {
			return None;
		}
		let raw = unsafe { &*(addr as *const libc::sockaddr_in6) };
		Some(Self::from_raw(raw))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::addr::Family;

	fn v6(text: &str, port: i32) -> (Fill, AddressValue) {
		let mut addr = AddressValue::zeroed(Family::Ipv6);
		let fill = construct_ipv6(&mut addr, text, port);
		(fill, addr)
	}

	#[test]
	fn colon_hex_is_canonicalised() {
		let (fill, addr) = v6("0:0:0:0:0:0:0:1", 13000);
		assert_eq!(fill, Fill::Filled);
		assert_eq!(addr.ip_text().as_deref(), Some("::1"));
		assert_eq!(addr.to_string(), "[::1]:13000");
	}

	#[test]
	fn rejects_malformed_text() {
		for text in ["::::::127.0.0.1", "1:2:3:4:5:6:7:8:9", "127.0.0.1", "", "fe80::1%eth0"] {
			assert_eq!(v6(text, 80).0, Fill::Invalid, "{text}");
		}
	}

	#[test]
	fn rejects_out_of_range_ports() {
		assert_eq!(v6("::1", 65536).0, Fill::Invalid);
		assert_eq!(v6("::1", -1300000).0, Fill::Invalid);
	}

	#[test]
	fn scope_suffix() {
		let (fill, addr) = v6("fe80::1%2", 443);
		assert_eq!(fill, Fill::Filled);
		assert_eq!(addr.as_v6().map(|a| a.scope_id()), Some(2));
		assert_eq!(addr.to_string(), "[fe80::1%2]:443");
	}

	#[test]
	fn star_is_loopback() {
		let (_, addr) = v6("*", 0);
		assert_eq!(addr.as_v6().map(|a| a.ip_addr()), Some(Ipv6Addr::LOCALHOST));
	}
}
