use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use std::io;

/// Error taxonomy for the proxy core. Each variant is a *kind*, not a
/// wrapped type hierarchy: callers match on the kind to decide recovery
/// (retry across parents, emit 502/407, close silently, ...).
#[derive(Debug)]
pub enum ProxyError {
    /// Startup-fatal: bad CLI flags, bad config file, missing required value.
    Config(ConfigError),
    /// DNS lookup failed for a parent or origin host.
    Resolve(ResolveError),
    /// TCP connect failed after a successful resolve.
    Connect(ConnectError),
    /// The parent proxy rejected the Type-3 response.
    AuthFailed(AuthFailedError),
    /// I/O failure against an already-leased upstream mid-exchange.
    UpstreamIo(IoError),
    /// I/O failure against the client.
    ClientIo(IoError),
    /// Malformed HTTP, NTLM, or SOCKS5 framing from either side.
    Protocol(ProtocolError),
    /// Cooperative shutdown requested; finish the current exchange and stop.
    ShutdownRequested,
}

impl ProxyError {
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config(ConfigError { message: message.into() })
    }

    pub fn resolve<T: Into<String>>(message: T) -> Self {
        Self::Resolve(ResolveError { message: message.into() })
    }

    pub fn connect<T: Into<String>>(message: T) -> Self {
        Self::Connect(ConnectError { message: message.into() })
    }

    pub fn auth_failed<T: Into<String>>(message: T) -> Self {
        Self::AuthFailed(AuthFailedError { message: message.into() })
    }

    pub fn upstream_io<T: Into<io::Error>>(error: T) -> Self {
        Self::UpstreamIo(IoError { error: error.into() })
    }

    pub fn client_io<T: Into<io::Error>>(error: T) -> Self {
        Self::ClientIo(IoError { error: error.into() })
    }

    pub fn protocol<T: Into<String>>(message: T) -> Self {
        Self::Protocol(ProtocolError { message: message.into() })
    }

    /// True when headers have not yet reached the client and a synthetic
    /// status line can still be sent in their place.
    pub fn is_recoverable_before_headers(&self) -> bool {
        matches!(self, Self::Resolve(_) | Self::Connect(_) | Self::AuthFailed(_))
    }
}

#[derive(Debug)]
pub struct ConfigError {
    message: String,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

#[derive(Debug)]
pub struct ResolveError {
    message: String,
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "DNS resolution failed: {}", self.message)
    }
}

#[derive(Debug)]
pub struct ConnectError {
    message: String,
}

impl Display for ConnectError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "connect failed: {}", self.message)
    }
}

#[derive(Debug)]
pub struct AuthFailedError {
    message: String,
}

impl Display for AuthFailedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "parent proxy rejected credentials: {}", self.message)
    }
}

#[derive(Debug)]
pub struct IoError {
    error: io::Error,
}

impl Display for IoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "I/O error: {}", self.error)
    }
}

impl IoError {
    pub fn kind(&self) -> io::ErrorKind {
        self.error.kind()
    }
}

#[derive(Debug)]
pub struct ProtocolError {
    message: String,
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "protocol error: {}", self.message)
    }
}

impl Display for ProxyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(x) => write!(f, "{}", x),
            Self::Resolve(x) => write!(f, "{}", x),
            Self::Connect(x) => write!(f, "{}", x),
            Self::AuthFailed(x) => write!(f, "{}", x),
            Self::UpstreamIo(x) => write!(f, "{}", x),
            Self::ClientIo(x) => write!(f, "{}", x),
            Self::Protocol(x) => write!(f, "{}", x),
            Self::ShutdownRequested => write!(f, "shutdown requested"),
        }
    }
}

impl StdError for ProxyError {}

impl From<io::Error> for ProxyError {
    fn from(value: io::Error) -> Self {
        Self::client_io(value)
    }
}

pub type ProxyResult<T> = Result<T, ProxyError>;
