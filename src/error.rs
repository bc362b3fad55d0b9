/// Broad failure classes shared by every operation in the crate.
///
/// Would-block is deliberately absent: it is reported through the caller's
/// flag and only becomes an `InputInvalid` error when no flag was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller-supplied data was rejected before any syscall.
    InputInvalid,
    /// Family/kind combination that has no implementation.
    ProtocolUnsupported,
    /// The OS reported a failure.
    System,
}

/// Socket errors.
///
/// Every syscall failure carries the errno captured right after the call.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("socket() failed: {}", os_message(*.errno))]
    Create { errno: i32 },

    #[error("bind({addr}) failed: {}", os_message(*.errno))]
    Bind { errno: i32, addr: String },

    #[error("listen(backlog={backlog}) failed: {}", os_message(*.errno))]
    Listen { errno: i32, backlog: i32 },

    #[error("connect({addr}) failed: {}", os_message(*.errno))]
    Connect { errno: i32, addr: String },

    #[error("accept() failed: {}", os_message(*.errno))]
    Accept { errno: i32 },

    #[error("{op}() failed: {}", os_message(*.errno))]
    Read { errno: i32, op: &'static str },

    #[error("{op}() failed: {}", os_message(*.errno))]
    Write { errno: i32, op: &'static str },

    #[error("setsockopt({option}) failed: {}", os_message(*.errno))]
    SetOption { errno: i32, option: &'static str },

    #[error("getsockopt({option}) failed: {}", os_message(*.errno))]
    GetOption { errno: i32, option: &'static str },

    #[error("shutdown() failed: {}", os_message(*.errno))]
    Shutdown { errno: i32 },

    #[error("close() failed: {}", os_message(*.errno))]
    Close { errno: i32 },

    #[error("fcntl({op}) failed: {}", os_message(*.errno))]
    Fcntl { errno: i32, op: &'static str },

    #[error("poll() failed: {}", os_message(*.errno))]
    Poll { errno: i32 },

    #[error("{op}() failed: {}", os_message(*.errno))]
    Name { errno: i32, op: &'static str },

    #[error("getrlimit(RLIMIT_NOFILE) failed: {}", os_message(*.errno))]
    ResourceLimit { errno: i32 },

    #[error("getrandom() failed: {}", os_message(*.errno))]
    Random { errno: i32 },

    #[error("address filler failed: {}", os_message(*.errno))]
    Filler { errno: i32 },

    #[error("invalid argument: {reason}")]
    InvalidInput { reason: &'static str },

    #[error("option value is {found}, expected {expected}")]
    OptionMismatch { expected: &'static str, found: &'static str },

    #[error("address family {found} does not match socket family {expected}")]
    FamilyMismatch { expected: String, found: String },

    #[error("not supported: {reason}")]
    Unsupported { reason: &'static str },
}

impl SocketError {
    /// Returns the failure class of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SocketError::InvalidInput { .. }
            | SocketError::OptionMismatch { .. }
            | SocketError::FamilyMismatch { .. } => ErrorCategory::InputInvalid,
            SocketError::Unsupported { .. } => ErrorCategory::ProtocolUnsupported,
            _ => ErrorCategory::System,
        }
    }

    /// Returns the OS error number, if the failure came from a syscall.
    pub fn errno(&self) -> Option<i32> {
        match self {
            SocketError::Create { errno }
            | SocketError::Bind { errno, .. }
            | SocketError::Listen { errno, .. }
            | SocketError::Connect { errno, .. }
            | SocketError::Accept { errno }
            | SocketError::Read { errno, .. }
            | SocketError::Write { errno, .. }
            | SocketError::SetOption { errno, .. }
            | SocketError::GetOption { errno, .. }
            | SocketError::Shutdown { errno }
            | SocketError::Close { errno }
            | SocketError::Fcntl { errno, .. }
            | SocketError::Poll { errno }
            | SocketError::Name { errno, .. }
            | SocketError::ResourceLimit { errno }
            | SocketError::Random { errno }
            | SocketError::Filler { errno } => Some(*errno),
            _ => None,
        }
    }

    /// Shorthand used by every would-block site that was not given a flag.
    pub(crate) fn missing_flag() -> Self {
        SocketError::InvalidInput {
            reason: "operation would block but no would-block flag was supplied",
        }
    }
}

pub type Result<T> = std::result::Result<T, SocketError>;

/// Returns current errno value.
#[inline]
pub fn errno() -> i32 {
    unsafe { *libc::__errno_location() }
}

/// Turns a `-1`-on-failure return into `Err(errno)`, reading errno before
/// anything else can touch it.
#[inline]
pub(crate) fn check(ret: libc::c_int) -> std::result::Result<libc::c_int, i32> {
    if ret == -1 { Err(errno()) } else { Ok(ret) }
}

/// `check` for byte-count returns.
#[inline]
pub(crate) fn check_len(ret: libc::ssize_t) -> std::result::Result<usize, i32> {
    if ret < 0 { Err(errno()) } else { Ok(ret as usize) }
}

/// True for both spellings of "resource temporarily unavailable".
#[inline]
pub(crate) fn is_would_block(errno: i32) -> bool {
    errno == libc::EAGAIN || errno == libc::EWOULDBLOCK
}

/// OS-provided text for an errno.
fn os_message(errno: i32) -> String {
    std::io::Error::from_raw_os_error(errno).to_string()
}

/// Maps errno to std::io::ErrorKind.
fn errno_to_kind(errno: i32) -> std::io::ErrorKind {
    match errno {
        libc::EACCES | libc::EPERM => std::io::ErrorKind::PermissionDenied,
        libc::EADDRINUSE => std::io::ErrorKind::AddrInUse,
        libc::EADDRNOTAVAIL => std::io::ErrorKind::AddrNotAvailable,
        libc::EAGAIN => std::io::ErrorKind::WouldBlock,
        libc::ECONNREFUSED => std::io::ErrorKind::ConnectionRefused,
        libc::ECONNRESET => std::io::ErrorKind::ConnectionReset,
        libc::EINTR => std::io::ErrorKind::Interrupted,
        libc::EINVAL => std::io::ErrorKind::InvalidInput,
        libc::ENOTCONN => std::io::ErrorKind::NotConnected,
        libc::EPIPE => std::io::ErrorKind::BrokenPipe,
        libc::ETIMEDOUT => std::io::ErrorKind::TimedOut,
        _ => std::io::ErrorKind::Other,
    }
}

impl From<SocketError> for std::io::Error {
    fn from(err: SocketError) -> Self {
        let kind = match (err.category(), err.errno()) {
            (_, Some(errno)) => errno_to_kind(errno),
            (ErrorCategory::ProtocolUnsupported, None) => std::io::ErrorKind::Unsupported,
            (_, None) => std::io::ErrorKind::InvalidInput,
        };
        std::io::Error::new(kind, err)
    }
}
