//! Capabilities the surrounding transport must provide.
//!
//! This crate never opens sockets or spawns timers on its own. A
//! [`Connector`] hands us a connected byte channel, and a [`Timer`]
//! schedules the delayed callbacks that drive read pacing and the idle
//! timeout. Implement both for whatever transport the application uses
//! (TCP, Unix domain socket, a peer-to-peer link).

use crate::{AsyncRead, AsyncWrite};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

/// Byte channel requirements for a connection.
pub trait Io: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<S> Io for S where S: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// A connected transport channel with the concrete type erased.
pub type BoxIo = Box<dyn Io>;

/// Pipeline configuration run between connect and the HTTP layer.
///
/// Gives the caller a chance to wrap the raw channel in additional
/// protocol adapters before the request is written. The identity setup
/// is [`standard_pipeline`].
pub type PipelineSetup = Box<dyn FnOnce(BoxIo) -> io::Result<BoxIo> + Send>;

/// The default pipeline setup: use the connected channel as-is.
pub fn standard_pipeline() -> PipelineSetup {
    Box::new(|io| Ok(io))
}

/// Establishes transport channels for client transactions.
///
/// One implementation per transport kind. The transaction only borrows
/// the resulting channel for a single exchange and never controls the
/// connector's lifetime.
pub trait Connector: Send + Sync {
    /// Establish a new channel to the remote endpoint.
    fn connect(&self) -> Pin<Box<dyn Future<Output = io::Result<BoxIo>> + Send>>;
}

/// Schedules delayed callbacks on the connection's execution context.
pub trait Timer: Send + Sync {
    /// Resolve after the given delay.
    fn delay(&self, after: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// Deadline that resets on any channel activity. Firing means the
/// connection sat idle for the whole timeout and must be torn down.
pub(crate) struct IdleTimer {
    timer: Arc<dyn Timer>,
    timeout: Duration,
    sleep: Pin<Box<dyn Future<Output = ()> + Send>>,
}

impl IdleTimer {
    /// Arm the timer. Runs from the moment the handler is attached.
    pub fn new(timer: Arc<dyn Timer>, timeout: Duration) -> Self {
        let sleep = timer.delay(timeout);
        IdleTimer {
            timer,
            timeout,
            sleep,
        }
    }

    /// Push the deadline forward. Called on every inbound/outbound byte.
    pub fn reset(&mut self) {
        self.sleep = self.timer.delay(self.timeout);
    }

    /// Ready when the connection has been idle for the full timeout.
    pub fn poll_expired(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        self.sleep.as_mut().poll(cx)
    }
}

impl std::fmt::Debug for IdleTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IdleTimer({:?})", self.timeout)
    }
}
