use unisock::{Action, AddressValue, Family, Handler, Kind, Multiplexer, MultiplexerConfig, Opt, SendFlags, SockOpt, Socket};

fn init() {
	let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Seen {
	Accept(u16),
	Request(u16, Vec<u8>),
	Error(u16),
	Close(u16),
}

#[derive(Default)]
struct Recorder {
	seen: Vec<Seen>,
}

fn port_of(addr: Option<&AddressValue>) -> u16 {
	addr.and_then(AddressValue::port).unwrap_or(0)
}

impl Handler for Recorder {
	fn on_accept(&mut self, _peer: &Socket, addr: Option<&AddressValue>) -> Action {
		self.seen.push(Seen::Accept(port_of(addr)));
		Action::Keep
	}

	fn on_request(&mut self, peer: &Socket, addr: Option<&AddressValue>) -> Action {
		let mut would_block = false;
		let data = peer.read(64, Some(&mut would_block)).unwrap();
		let stop = data.contains(&b'q');
		self.seen.push(Seen::Request(port_of(addr), data));
		if stop { Action::Stop } else { Action::Keep }
	}

	fn on_error(&mut self, _peer: &Socket, addr: Option<&AddressValue>) -> Action {
		self.seen.push(Seen::Error(port_of(addr)));
		Action::Close
	}

	fn on_close(&mut self, _peer: &Socket, addr: Option<&AddressValue>) -> Action {
		self.seen.push(Seen::Close(port_of(addr)));
		Action::Keep
	}
}

fn listener() -> (Socket, i32) {
	let mut listener = Socket::new(Family::Ipv4, Kind::Stream, 0).unwrap();
	listener.start("127.0.0.1", 0).unwrap();
	let port = listener.local_address().unwrap().port().unwrap();
	(listener, i32::from(port))
}

fn client(port: i32) -> (Socket, u16) {
	let mut c = Socket::new(Family::Ipv4, Kind::Stream, 0).unwrap();
	c.connect("127.0.0.1", port, None).unwrap();
	let local = c.local_address().unwrap().port().unwrap();
	(c, local)
}

#[test]
fn requests_dispatch_in_arrival_order() {
	init();
	let (listener, port) = listener();
	let mut mux = Multiplexer::new(listener).unwrap();
	let mut rec = Recorder::default();

	let mut clients = Vec::new();
	for _ in 0..3 {
		clients.push(client(port));
		mux.sweep(&mut rec).unwrap();
	}
	assert_eq!(mux.live(), 4);
	let ports: Vec<u16> = clients.iter().map(|(_, p)| *p).collect();
	assert_eq!(rec.seen, ports.iter().map(|p| Seen::Accept(*p)).collect::<Vec<_>>());
	rec.seen.clear();

	for (i, (c, _)) in clients.iter().enumerate() {
		c.write(&[b'a' + i as u8], None).unwrap();
		mux.sweep(&mut rec).unwrap();
	}
	assert_eq!(
		rec.seen,
		vec![
			Seen::Request(ports[0], b"a".to_vec()),
			Seen::Request(ports[1], b"b".to_vec()),
			Seen::Request(ports[2], b"c".to_vec()),
		]
	);
}

#[test]
fn close_dispatches_once() {
	init();
	let (listener, port) = listener();
	let mut mux = Multiplexer::with_config(listener, MultiplexerConfig::new().compact_threshold(usize::MAX)).unwrap();
	let mut rec = Recorder::default();

	let (first, first_port) = client(port);
	mux.sweep(&mut rec).unwrap();
	let (second, second_port) = client(port);
	mux.sweep(&mut rec).unwrap();
	rec.seen.clear();

	drop(first);
	mux.sweep(&mut rec).unwrap();
	assert_eq!(rec.seen, vec![Seen::Close(first_port)]);
	assert_eq!(mux.dead(), 1);
	assert_eq!(mux.live(), 2);

	// later traffic never reaches the closed entry
	second.write(b"x", None).unwrap();
	mux.sweep(&mut rec).unwrap();
	assert_eq!(rec.seen, vec![Seen::Close(first_port), Seen::Request(second_port, b"x".to_vec())]);
	assert_eq!(mux.len(), 3);
}

#[test]
fn compaction_at_threshold() {
	init();
	let (listener, port) = listener();
	let mut mux = Multiplexer::with_config(listener, MultiplexerConfig::new().compact_threshold(3)).unwrap();
	let mut rec = Recorder::default();

	let (a, _) = client(port);
	mux.sweep(&mut rec).unwrap();
	assert_eq!(mux.len(), 2);

	drop(a);
	mux.sweep(&mut rec).unwrap();
	// below the threshold the dead entry stays
	assert_eq!((mux.len(), mux.dead()), (2, 1));

	let (_b, _) = client(port);
	mux.sweep(&mut rec).unwrap();
	// the table reached three entries and the dead one was removed
	assert_eq!((mux.len(), mux.dead()), (2, 0));
	assert!(mux.listener().is_some());
}

#[test]
fn stop_ends_run() {
	init();
	let (listener, port) = listener();
	let mut mux = Multiplexer::new(listener).unwrap();
	let mut rec = Recorder::default();

	let (c, c_port) = client(port);
	c.write(b"q", None).unwrap();
	mux.run(&mut rec).unwrap();

	assert_eq!(rec.seen, vec![Seen::Accept(c_port), Seen::Request(c_port, b"q".to_vec())]);
	assert_eq!(mux.live(), 0);
	assert!(mux.listener().is_none());
}

#[test]
fn sweep_after_stop_does_not_wait() {
	init();
	let (listener, port) = listener();
	let mut mux = Multiplexer::new(listener).unwrap();
	let mut rec = Recorder::default();

	let (c, _) = client(port);
	c.write(b"q", None).unwrap();
	mux.run(&mut rec).unwrap();
	assert_eq!((mux.len(), mux.live()), (0, 0));

	// nothing left to poll, so these return at once
	assert_eq!(mux.sweep(&mut rec).unwrap(), Action::Stop);
	mux.run(&mut rec).unwrap();
	assert_eq!(rec.seen.len(), 2);
}

#[test]
fn reset_peer_reaches_on_error() {
	init();
	let (listener, port) = listener();
	let mut mux = Multiplexer::with_config(listener, MultiplexerConfig::new().compact_threshold(usize::MAX)).unwrap();
	let mut rec = Recorder::default();

	let (c, c_port) = client(port);
	mux.sweep(&mut rec).unwrap();
	rec.seen.clear();

	// zero linger turns the close into a reset
	c.set_opt(Opt::Linger, SockOpt::Linger { enabled: true, seconds: 0 }).unwrap();
	drop(c);
	mux.sweep(&mut rec).unwrap();
	assert_eq!(rec.seen, vec![Seen::Error(c_port)]);
	assert_eq!((mux.live(), mux.dead()), (1, 1));
}

#[test]
fn empty_seqpacket_record_is_a_request() {
	init();
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("records.sock");
	let text = path.to_str().unwrap().to_owned();

	let mut listener = Socket::new(Family::Local, Kind::SeqPacket, 0).unwrap();
	listener.start(&text, 0).unwrap();
	let mut mux = Multiplexer::with_config(listener, MultiplexerConfig::new().compact_threshold(usize::MAX)).unwrap();
	let mut rec = Recorder::default();

	let mut c = Socket::new(Family::Local, Kind::SeqPacket, 0).unwrap();
	c.connect(&text, 0, None).unwrap();
	mux.sweep(&mut rec).unwrap();
	rec.seen.clear();

	c.send(b"", SendFlags::empty(), None).unwrap();
	mux.sweep(&mut rec).unwrap();
	assert_eq!(rec.seen, vec![Seen::Request(0, Vec::new())]);
	assert_eq!((mux.live(), mux.dead()), (2, 0));

	// the peer is still connected
	c.write(b"x", None).unwrap();
	mux.sweep(&mut rec).unwrap();
	assert_eq!(rec.seen.last(), Some(&Seen::Request(0, b"x".to_vec())));

	drop(c);
	mux.sweep(&mut rec).unwrap();
	assert_eq!(rec.seen.last(), Some(&Seen::Close(0)));
	assert_eq!(mux.dead(), 1);
}

struct Refuse;

impl Handler for Refuse {
	fn on_accept(&mut self, _peer: &Socket, _addr: Option<&AddressValue>) -> Action {
		Action::Close
	}

	fn on_request(&mut self, _peer: &Socket, _addr: Option<&AddressValue>) -> Action {
		panic!("closed peers get no requests");
	}
}

#[test]
fn close_from_accept_drops_peer() {
	let (listener, port) = listener();
	let mut mux = Multiplexer::new(listener).unwrap();

	let (c, _) = client(port);
	mux.sweep(&mut Refuse).unwrap();
	assert_eq!(mux.live(), 1);

	// the server side is gone, so the client reads end-of-stream
	assert!(c.read(1, None).unwrap().is_empty());
}
