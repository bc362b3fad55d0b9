use std::time::Duration;

use crate::error::{Result, SocketError, check};
use super::{Kind, Socket};

/// Native layout of an option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
	Int,      // c_int
	Linger,   // struct linger
	Timeout,  // struct timeval
}

impl ValueShape {
	pub fn name(self) -> &'static str {
		match self {
			ValueShape::Int => "integer",
			ValueShape::Linger => "linger",
			ValueShape::Timeout => "timeout",
		}
	}
}

/// Socket option names.
///
/// Each name knows its level, its native value shape and whether the kernel
/// lets it be written. `MaxSeg` and `NoDelay` live at `IPPROTO_TCP` and only
/// apply to Internet stream sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opt {
	Broadcast,
	Debug,
	DontRoute,
	/// Pending socket error; reading clears it.
	Error,
	KeepAlive,
	Linger,
	OobInline,
	RcvBuf,
	SndBuf,
	RcvLowat,
	SndLowat,
	RcvTimeo,
	SndTimeo,
	ReuseAddr,
	ReusePort,
	/// Socket kind, as the kernel reports it.
	Type,
	MaxSeg,
	NoDelay,
}

impl Opt {
	pub fn level(self) -> libc::c_int {
		if self.is_tcp() { libc::IPPROTO_TCP } else { libc::SOL_SOCKET }
	}

	pub fn raw(self) -> libc::c_int {
		match self {
			Opt::Broadcast => libc::SO_BROADCAST,
			Opt::Debug => libc::SO_DEBUG,
			Opt::DontRoute => libc::SO_DONTROUTE,
			Opt::Error => libc::SO_ERROR,
			Opt::KeepAlive => libc::SO_KEEPALIVE,
			Opt::Linger => libc::SO_LINGER,
			Opt::OobInline => libc::SO_OOBINLINE,
			Opt::RcvBuf => libc::SO_RCVBUF,
			Opt::SndBuf => libc::SO_SNDBUF,
			Opt::RcvLowat => libc::SO_RCVLOWAT,
			Opt::SndLowat => libc::SO_SNDLOWAT,
			Opt::RcvTimeo => libc::SO_RCVTIMEO,
			Opt::SndTimeo => libc::SO_SNDTIMEO,
			Opt::ReuseAddr => libc::SO_REUSEADDR,
			Opt::ReusePort => libc::SO_REUSEPORT,
			Opt::Type => libc::SO_TYPE,
			Opt::MaxSeg => libc::TCP_MAXSEG,
			Opt::NoDelay => libc::TCP_NODELAY,
		}
	}

	/// Name used in error messages.
	pub fn name(self) -> &'static str {
		match self {
			Opt::Broadcast => "SO_BROADCAST",
			Opt::Debug => "SO_DEBUG",
			Opt::DontRoute => "SO_DONTROUTE",
			Opt::Error => "SO_ERROR",
			Opt::KeepAlive => "SO_KEEPALIVE",
			Opt::Linger => "SO_LINGER",
			Opt::OobInline => "SO_OOBINLINE",
			Opt::RcvBuf => "SO_RCVBUF",
			Opt::SndBuf => "SO_SNDBUF",
			Opt::RcvLowat => "SO_RCVLOWAT",
			Opt::SndLowat => "SO_SNDLOWAT",
			Opt::RcvTimeo => "SO_RCVTIMEO",
			Opt::SndTimeo => "SO_SNDTIMEO",
			Opt::ReuseAddr => "SO_REUSEADDR",
			Opt::ReusePort => "SO_REUSEPORT",
			Opt::Type => "SO_TYPE",
			Opt::MaxSeg => "TCP_MAXSEG",
			Opt::NoDelay => "TCP_NODELAY",
		}
	}

	pub fn shape(self) -> ValueShape {
		match self {
			Opt::Linger => ValueShape::Linger,
			Opt::RcvTimeo | Opt::SndTimeo => ValueShape::Timeout,
			_ => ValueShape::Int,
		}
	}

	pub fn is_read_only(self) -> bool {
		matches!(self, Opt::Error | Opt::Type)
	}

	pub fn is_tcp(self) -> bool {
		matches!(self, Opt::MaxSeg | Opt::NoDelay)
	}
}

/// A tagged option value.
///
/// Reading through the accessor of another variant is an error, never a
/// reinterpretation of the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SockOpt {
	Int(i32),
	Linger { enabled: bool, seconds: i32 },
	/// `micros` is advisory; kernels round it to their timer granularity.
	Timeout { seconds: i64, micros: i64 },
}

impl SockOpt {
	pub fn shape(&self) -> ValueShape {
		match self {
			SockOpt::Int(_) => ValueShape::Int,
			SockOpt::Linger { .. } => ValueShape::Linger,
			SockOpt::Timeout { .. } => ValueShape::Timeout,
		}
	}

	pub fn value(&self) -> Result<i32> {
		match *self {
			SockOpt::Int(v) => Ok(v),
			_ => Err(self.mismatch(ValueShape::Int)),
		}
	}

	/// `(enabled, seconds)` of a linger value.
	pub fn linger(&self) -> Result<(bool, i32)> {
		match *self {
			SockOpt::Linger { enabled, seconds } => Ok((enabled, seconds)),
			_ => Err(self.mismatch(ValueShape::Linger)),
		}
	}

	/// `(seconds, micros)` of a timeout value.
	pub fn time(&self) -> Result<(i64, i64)> {
		match *self {
			SockOpt::Timeout { seconds, micros } => Ok((seconds, micros)),
			_ => Err(self.mismatch(ValueShape::Timeout)),
		}
	}

	pub fn as_duration(&self) -> Result<Duration> {
		let (seconds, micros) = self.time()?;
		if seconds < 0 || !(0..1_000_000).contains(&micros) {
			return Err(SocketError::InvalidInput { reason: "timeout out of range" });
		}
		Ok(Duration::from_secs(seconds as u64) + Duration::from_micros(micros as u64))
	}

	fn mismatch(&self, expected: ValueShape) -> SocketError {
		SocketError::OptionMismatch { expected: expected.name(), found: self.shape().name() }
	}
}

impl From<i32> for SockOpt {
	fn from(v: i32) -> Self {
		SockOpt::Int(v)
	}
}

impl From<bool> for SockOpt {
	fn from(v: bool) -> Self {
		SockOpt::Int(v as i32)
	}
}

impl From<Duration> for SockOpt {
	fn from(d: Duration) -> Self {
		SockOpt::Timeout { seconds: d.as_secs() as i64, micros: i64::from(d.subsec_micros()) }
	}
}

impl PartialEq<i32> for SockOpt {
	fn eq(&self, other: &i32) -> bool {
		matches!(self, SockOpt::Int(v) if v == other)
	}
}

impl Socket {
	/// Sets an option.
	///
	/// The value's variant must match the option's shape; the check happens
	/// before any syscall.
	pub fn set_opt(&self, opt: Opt, value: SockOpt) -> Result<()> {
		if opt.is_read_only() {
			return Err(SocketError::InvalidInput { reason: "option is read-only" });
		}
		self.check_level(opt)?;
		if value.shape() != opt.shape() {
			return Err(SocketError::OptionMismatch { expected: opt.shape().name(), found: value.shape().name() });
		}

		match value {
			SockOpt::Int(v) => setsockopt_raw(self, opt, &(v as libc::c_int)),
			SockOpt::Linger { enabled, seconds } => {
				let raw = libc::linger { l_onoff: enabled as libc::c_int, l_linger: seconds };
				setsockopt_raw(self, opt, &raw)
			}
			SockOpt::Timeout { seconds, micros } => {
				let raw = libc::timeval { tv_sec: seconds as libc::time_t, tv_usec: micros as libc::suseconds_t };
				setsockopt_raw(self, opt, &raw)
			}
		}
	}

	/// Reads an option, tagged with the option's shape.
	pub fn get_opt(&self, opt: Opt) -> Result<SockOpt> {
		self.check_level(opt)?;
		match opt.shape() {
			ValueShape::Int => {
				let v: libc::c_int = getsockopt_raw(self, opt)?;
				Ok(SockOpt::Int(v))
			}
			ValueShape::Linger => {
				let v: libc::linger = getsockopt_raw(self, opt)?;
				Ok(SockOpt::Linger { enabled: v.l_onoff != 0, seconds: v.l_linger })
			}
			ValueShape::Timeout => {
				let v: libc::timeval = getsockopt_raw(self, opt)?;
				Ok(SockOpt::Timeout { seconds: v.tv_sec as i64, micros: v.tv_usec as i64 })
			}
		}
	}

	fn check_level(&self, opt: Opt) -> Result<()> {
		if opt.is_tcp() && !(self.family().is_inet() && self.kind() == Kind::Stream) {
			return Err(SocketError::Unsupported { reason: "TCP option on a non-TCP socket" });
		}
		Ok(())
	}
}

fn setsockopt_raw<T>(socket: &Socket, opt: Opt, value: &T) -> Result<()> {
	check(unsafe {
		libc::setsockopt(
			socket.as_raw_fd(),
			opt.level(),
			opt.raw(),
			value as *const T as *const libc::c_void,
			std::mem::size_of::<T>() as libc::socklen_t,
		)
	})
	.map_err(|errno| SocketError::SetOption { errno, option: opt.name() })?;
	log::trace!("setsockopt({}) on fd {}", opt.name(), socket.as_raw_fd());
	Ok(())
}

/// Reads an option into a zero-initialized `T`.
///
/// `T` must be a plain C struct or integer valid for any bit pattern.
fn getsockopt_raw<T: Copy>(socket: &Socket, opt: Opt) -> Result<T> {
	let mut value: T = unsafe { std::mem::zeroed() };
	let mut len = std::mem::size_of::<T>() as libc::socklen_t;

	check(unsafe {
		libc::getsockopt(
			socket.as_raw_fd(),
			opt.level(),
			opt.raw(),
			&mut value as *mut T as *mut libc::c_void,
			&mut len,
		)
	})
	.map_err(|errno| SocketError::GetOption { errno, option: opt.name() })?;
	Ok(value)
}
