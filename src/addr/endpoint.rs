//! Parser for combined `address:port` strings.
//!
//! Used by callers that want to "start on this address" without picking a
//! family up front:
//!
//! | input            | family | host         | port            |
//! |------------------|--------|--------------|-----------------|
//! | `127.0.0.1:8080` | IPv4   | `127.0.0.1`  | 8080            |
//! | `*:8080`         | IPv4   | `127.0.0.1`  | 8080            |
//! | `::1:8080`       | IPv6   | `::1`        | 8080            |
//! | `::8080`         | IPv6   | `::1`        | 8080            |
//! | `[fe80::1]:443`  | IPv6   | `fe80::1`    | 443             |
//! | `127.0.0.1:*`    | IPv4   | `127.0.0.1`  | random ephemeral |
//!
//! The family comes from the colon count: one colon means IPv4, more mean
//! IPv6. An IPv4-mapped literal such as `::ffff:10.0.0.1:80` is therefore
//! IPv6, which is what it is. A bare IPv4 address can never be mistaken for
//! IPv6, but an unbracketed IPv6 address whose last group looks like a port
//! (`fe80::1:2`) is always split at the final colon; use brackets there.

use std::ops::RangeInclusive;

use super::{AddressValue, Family, Fill, construct_ipv4, construct_ipv6};
use crate::error::{Result, SocketError, errno};

/// Range `*` ports are drawn from: the IANA dynamic range, kept strictly
/// inside (1, 65534).
pub const EPHEMERAL_PORTS: RangeInclusive<u16> = 49152..=65533;

/// A parsed `address:port` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
	family: Family,
	host: String,
	port: u16,
}

impl Endpoint {
	pub fn family(&self) -> Family {
		self.family
	}

	pub fn host(&self) -> &str {
		&self.host
	}

	pub fn port(&self) -> u16 {
		self.port
	}

	/// Fills `addr` through the family's constructor.
	///
	/// Usable directly as a `bind`/`connect` filler.
	pub fn fill(&self, addr: &mut AddressValue) -> Fill {
		match self.family {
			Family::Ipv4 => construct_ipv4(addr, &self.host, i32::from(self.port)),
			_ => construct_ipv6(addr, &self.host, i32::from(self.port)),
		}
	}
}

/// Splits `address:port` into family, host and port.
///
/// Host text is not validated here; that happens when the endpoint fills an
/// address and follows the usual tri-state contract.
pub fn parse_endpoint(text: &str) -> Result<Endpoint> {
	let (family, host, port) = if let Some(rest) = text.strip_prefix('[') {
		let (host, port) = rest.split_once("]:").ok_or(SocketError::InvalidInput {
			reason: "bracketed address must be followed by ]:port",
		})?;
		(Family::Ipv6, host, port)
	} else {
		let (host, port) = text.rsplit_once(':').ok_or(SocketError::InvalidInput {
			reason: "endpoint has no port separator",
		})?;
		let family = if text.matches(':').count() == 1 { Family::Ipv4 } else { Family::Ipv6 };
		(family, host, port)
	};

	let host = match (family, host) {
		(Family::Ipv4, "*") => "127.0.0.1",
		(Family::Ipv6, "*" | ":") => "::1",
		(_, "") => return Err(SocketError::InvalidInput { reason: "endpoint has an empty address" }),
		(_, host) => host,
	};

	let port = if port == "*" {
		random_ephemeral_port()?
	} else {
		port.parse::<u16>().map_err(|_| SocketError::InvalidInput {
			reason: "endpoint port is not a number in 0..=65535",
		})?
	};

	Ok(Endpoint { family, host: host.to_owned(), port })
}

/// Draws a port from [`EPHEMERAL_PORTS`] using the kernel's random pool.
fn random_ephemeral_port() -> Result<u16> {
	let span = u32::from(EPHEMERAL_PORTS.end() - EPHEMERAL_PORTS.start()) + 1;
	loop {
		let mut buf = [0u8; 4];
		let n = unsafe { libc::getrandom(buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0) };
		if n == -1 {
			let e = errno();
			if e == libc::EINTR {
				continue;
			}
			return Err(SocketError::Random { errno: e });
		}
		if n as usize != buf.len() {
			continue;
		}
		let offset = u32::from_ne_bytes(buf) % span;
		let port = EPHEMERAL_PORTS.start() + offset as u16;
		if port > 1 && port < 65534 {
			return Ok(port);
		}
	}
}
