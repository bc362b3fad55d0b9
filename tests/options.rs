use std::time::Duration;

use unisock::{ErrorCategory, Family, Kind, Opt, SockOpt, Socket, SocketError, ValueShape};

fn stream() -> Socket {
	Socket::new(Family::Ipv4, Kind::Stream, 0).unwrap()
}

#[test]
fn linger_reads_back_through_the_kernel() {
	let s = stream();
	s.set_opt(Opt::Linger, SockOpt::Linger { enabled: true, seconds: 30 }).unwrap();

	let mut raw = libc::linger { l_onoff: 0, l_linger: 0 };
	let mut len = std::mem::size_of::<libc::linger>() as libc::socklen_t;
	let ret = unsafe {
		libc::getsockopt(
			s.as_raw_fd(),
			libc::SOL_SOCKET,
			libc::SO_LINGER,
			&mut raw as *mut _ as *mut libc::c_void,
			&mut len,
		)
	};
	assert_eq!(ret, 0);
	assert_eq!((raw.l_onoff, raw.l_linger), (1, 30));

	assert_eq!(s.get_opt(Opt::Linger).unwrap().linger().unwrap(), (true, 30));
}

#[test]
fn wrong_accessor_fails_loudly() {
	let v = SockOpt::Int(1);
	let err = v.linger().unwrap_err();
	assert_eq!(err.category(), ErrorCategory::InputInvalid);
	assert!(matches!(err, SocketError::OptionMismatch { expected: "linger", found: "integer" }));
	assert!(v.time().is_err());

	let v = SockOpt::Timeout { seconds: 1, micros: 0 };
	assert!(v.value().is_err());
	assert!(v.linger().is_err());
}

#[test]
fn timeouts_compare_seconds() {
	let s = stream();
	s.set_opt(Opt::RcvTimeo, SockOpt::Timeout { seconds: 5, micros: 123_456 }).unwrap();
	s.set_opt(Opt::SndTimeo, Duration::from_secs(7).into()).unwrap();

	let (seconds, _micros) = s.get_opt(Opt::RcvTimeo).unwrap().time().unwrap();
	assert_eq!(seconds, 5);
	let (seconds, _) = s.get_opt(Opt::SndTimeo).unwrap().time().unwrap();
	assert_eq!(seconds, 7);
}

#[test]
fn integer_options() {
	let s = stream();
	for opt in [Opt::ReuseAddr, Opt::KeepAlive, Opt::OobInline, Opt::NoDelay] {
		s.set_opt(opt, true.into()).unwrap();
		assert_eq!(s.get_opt(opt).unwrap(), 1, "{}", opt.name());
		s.set_opt(opt, false.into()).unwrap();
		assert_eq!(s.get_opt(opt).unwrap(), 0, "{}", opt.name());
	}

	// the kernel doubles buffer sizes
	s.set_opt(Opt::RcvBuf, SockOpt::Int(64 * 1024)).unwrap();
	assert!(s.get_opt(Opt::RcvBuf).unwrap().value().unwrap() >= 64 * 1024);

	let dgram = Socket::new(Family::Ipv4, Kind::Datagram, 0).unwrap();
	dgram.set_opt(Opt::Broadcast, true.into()).unwrap();
	assert_eq!(dgram.get_opt(Opt::Broadcast).unwrap(), 1);
}

#[test]
fn max_segment_on_tcp() {
	let s = stream();
	s.set_opt(Opt::MaxSeg, SockOpt::Int(1200)).unwrap();
	let mss = s.get_opt(Opt::MaxSeg).unwrap().value().unwrap();
	assert!(mss > 0);
}

#[test]
fn read_only_options() {
	let s = stream();
	assert_eq!(s.get_opt(Opt::Error).unwrap(), 0);
	assert_eq!(s.get_opt(Opt::Type).unwrap(), libc::SOCK_STREAM);

	let err = s.set_opt(Opt::Error, SockOpt::Int(0)).unwrap_err();
	assert_eq!(err.category(), ErrorCategory::InputInvalid);
}

#[test]
fn shape_checked_before_syscall() {
	let s = stream();
	assert_eq!(Opt::Linger.shape(), ValueShape::Linger);
	let err = s.set_opt(Opt::Linger, SockOpt::Int(1)).unwrap_err();
	assert!(matches!(err, SocketError::OptionMismatch { .. }));
	assert_eq!(err.errno(), None);

	let err = s.set_opt(Opt::RcvTimeo, SockOpt::Int(1)).unwrap_err();
	assert_eq!(err.category(), ErrorCategory::InputInvalid);
}

#[test]
fn tcp_options_need_an_inet_stream() {
	let local = Socket::new(Family::Local, Kind::Stream, 0).unwrap();
	let err = local.get_opt(Opt::NoDelay).unwrap_err();
	assert_eq!(err.category(), ErrorCategory::ProtocolUnsupported);

	let udp = Socket::new(Family::Ipv4, Kind::Datagram, 0).unwrap();
	let err = udp.set_opt(Opt::MaxSeg, SockOpt::Int(1200)).unwrap_err();
	assert_eq!(err.category(), ErrorCategory::ProtocolUnsupported);
}
