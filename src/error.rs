use std::fmt;
use std::io;

/// Possible errors from this crate.
#[derive(Debug)]
pub enum Error {
    /// Transport connect or setup failure. The connection was never
    /// established, or broke while the exchange was in flight.
    Connection(io::Error),
    /// Unexpected internal failure, such as not being able to serialize
    /// a request head.
    Internal(String),
    /// The peer sent a response head we cannot parse or support.
    InvalidResponse(String),
    /// The connection was torn down before any response head was observed.
    HandlerRemoved,
    /// Body bytes arrived while no head was on record.
    ReadBodyBadState,
    /// The idle timer fired with no traffic on the connection.
    Timeout,
    /// A user/usage problem such as sending a second response on a
    /// connection that already carried one.
    User(String),
    /// Http errors from the `http` crate.
    Http(http::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Connection(v) => write!(f, "connection error: {}", v),
            Error::Internal(v) => write!(f, "internal error: {}", v),
            Error::InvalidResponse(v) => write!(f, "invalid response: {}", v),
            Error::HandlerRemoved => write!(f, "connection closed before response head"),
            Error::ReadBodyBadState => write!(f, "body bytes with no head on record"),
            Error::Timeout => write!(f, "idle timeout"),
            Error::User(v) => write!(f, "{}", v),
            Error::Http(v) => write!(f, "http api: {}", v),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Connection(e)
    }
}

impl From<httparse::Error> for Error {
    fn from(e: httparse::Error) -> Self {
        Error::InvalidResponse(e.to_string())
    }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Self {
        Error::Http(e)
    }
}
