use std::thread;

use unisock::{Action, AddressValue, ErrorCategory, Family, Handler, Kind, Server, Socket};

fn init() {
	let _ = env_logger::builder().is_test(true).try_init();
}

/// Echoes every request back; a request containing `q` stops the server.
#[derive(Default)]
struct Echo {
	requests: usize,
	closes: usize,
}

impl Handler for Echo {
	fn on_request(&mut self, peer: &Socket, _addr: Option<&AddressValue>) -> Action {
		self.requests += 1;
		let mut would_block = false;
		let data = match peer.read(4096, Some(&mut would_block)) {
			Ok(data) => data,
			Err(_) => return Action::Close,
		};
		if data.contains(&b'q') {
			return Action::Stop;
		}
		match peer.write(&data, Some(&mut would_block)) {
			Ok(_) => Action::Keep,
			Err(_) => Action::Close,
		}
	}

	fn on_close(&mut self, _peer: &Socket, _addr: Option<&AddressValue>) -> Action {
		self.closes += 1;
		Action::Keep
	}
}

#[test]
fn echo_until_stopped() {
	init();
	let mut server = Server::bind("127.0.0.1:0").unwrap();
	let port = i32::from(server.local_address().unwrap().port().unwrap());

	let handle = thread::spawn(move || {
		let mut echo = Echo::default();
		server.run(&mut echo).unwrap();
		echo
	});

	let mut first = Socket::new(Family::Ipv4, Kind::Stream, 0).unwrap();
	first.connect("127.0.0.1", port, None).unwrap();
	first.write(b"hello", None).unwrap();
	assert_eq!(first.read(5, None).unwrap(), b"hello");
	drop(first);

	let mut second = Socket::new(Family::Ipv4, Kind::Stream, 0).unwrap();
	second.connect("127.0.0.1", port, None).unwrap();
	second.write(b"world", None).unwrap();
	assert_eq!(second.read(5, None).unwrap(), b"world");
	second.write(b"q", None).unwrap();

	let echo = handle.join().unwrap();
	assert_eq!(echo.requests, 3);
	assert_eq!(echo.closes, 1);

	// everything was closed when the handler stopped
	assert!(second.read(1, None).unwrap().is_empty());
}

#[test]
fn ipv6_endpoint() {
	init();
	let server = match Server::bind("[::1]:0") {
		Ok(server) => server,
		// host without IPv6 loopback
		Err(e) if e.category() == ErrorCategory::System => return,
		Err(e) => panic!("{e}"),
	};
	assert_eq!(server.endpoint().family(), Family::Ipv6);
	assert_eq!(server.local_address().unwrap().family(), Family::Ipv6);
}

#[test]
fn random_port_endpoint() {
	init();
	// a random ephemeral port can collide with one in use; retry a few times
	let server = (0..8).find_map(|_| Server::bind("127.0.0.1:*").ok()).unwrap();
	let port = server.endpoint().port();
	assert!(unisock::addr::EPHEMERAL_PORTS.contains(&port));
	assert_eq!(server.local_address().unwrap().port(), Some(port));
}

#[test]
fn bad_endpoints() {
	let err = Server::bind("127.0.0.1").unwrap_err();
	assert_eq!(err.category(), ErrorCategory::InputInvalid);
	let err = Server::bind("127.0.0.1:99999").unwrap_err();
	assert_eq!(err.category(), ErrorCategory::InputInvalid);
}
