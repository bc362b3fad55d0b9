pub mod addr;
pub mod multiplexer;
pub mod server;
pub mod socket;
mod error;

pub use self::error::{ErrorCategory, Result, SocketError, errno};
pub use self::addr::{AddressValue, Endpoint, Family, Fill, GenericAddr, LocalAddr, SocketAddrV4, SocketAddrV6,
					 construct_abstract, construct_ipv4, construct_ipv6, construct_local, parse_endpoint};
pub use self::socket::{Kind, Modifiers, RecvFlags, SendFlags, Shutdown, Socket, DEFAULT_BACKLOG,
					   Opt, SockOpt, ValueShape,
					   SocketBuilder, BufferConfig, ReuseConfig, TcpConfig, TimeoutConfig};
pub use self::multiplexer::{Action, Events, Handler, Multiplexer, MultiplexerConfig, open_file_limit};
pub use self::server::Server;
