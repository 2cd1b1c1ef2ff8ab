#![warn(missing_docs, missing_debug_implementations)]
#![warn(clippy::all)]

//! A single-shot HTTP/1.1 client and server implementation.
//!
//! This library implements the point-to-point transfer case of HTTP/1.1:
//! every connection carries exactly one request/response exchange and is
//! closed as soon as the exchange ends. It is meant for device-to-device
//! transfer scenarios rather than general-purpose HTTP serving.
//!
//! ## In scope
//!
//! * Decoding one request and encoding one response per connection.
//! * `Content-Length` derived from the actual body on every response.
//! * Manual read pacing of inbound response data as backpressure.
//! * A per-connection idle timeout that tears the connection down.
//!
//! ## Out of scope
//!
//! Everything which isn't about a single HTTP exchange as "transport",
//! i.e. application level logic, and everything about connection reuse.
//!
//! * `Connection: keep-alive`, pipelining, multiplexing
//! * `Transfer-Encoding: chunked` on either side
//! * Request bodies on the server side
//! * TLS, socket setup, URL parsing beyond path/query splitting
//!
//! # Layout and API
//!
//! There are separate [client] and [server] modules and code that is
//! shared between them lives in the crate root. The [transport] module
//! holds the capabilities the surrounding transport must provide: a
//! [`transport::Connector`] to establish channels and a
//! [`transport::Timer`] to schedule the delayed callbacks behind read
//! pacing and idle timeouts.
//!
//! # Connections
//!
//! Some connection must already have been established (server side) or
//! be establishable through a `Connector` (client side); this library
//! does not perform socket connection itself.
//!
//! [client]: client/index.html
//! [server]: server/index.html

#[macro_use]
extern crate log;

mod error;
mod limit;
mod request;
mod response;
mod try_write;

#[doc(hidden)]
pub mod decode;

#[doc(hidden)]
pub mod encode;

#[doc(hidden)]
pub mod http11;

pub(crate) use futures_io::{AsyncRead, AsyncWrite};

pub mod client;
pub mod server;
pub mod transport;

pub use error::Error;
pub use request::{Request, RequestId};
pub use response::Response;
