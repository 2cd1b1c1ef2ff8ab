//! Server side of a single-shot HTTP/1.1 exchange.
//!
//! [`serve`] takes an accepted channel and drives exactly one exchange
//! over it: decode one request, hand it to the application handler,
//! encode the response, flush and close. The connection is never
//! reused.
//!
//! # Example
//!
//! ```rust, no_run
//! use h1_oneshot::server::{serve, DEFAULT_IDLE_TIMEOUT};
//! use h1_oneshot::transport::Timer;
//! use h1_oneshot::Response;
//! use async_std::net::TcpListener;
//! use std::sync::Arc;
//!
//! # async fn run(timer: Arc<dyn Timer>) -> std::io::Result<()> {
//! let listener = TcpListener::bind("127.0.0.1:3000").await?;
//!
//! // Accept all incoming TCP connections.
//! loop {
//!     let (socket, _peer_addr) = listener.accept().await?;
//!     let timer = timer.clone();
//!
//!     // Each connection carries exactly one exchange.
//!     async_std::task::spawn(async move {
//!         let conn = serve(
//!             socket,
//!             |request, responder| {
//!                 println!("Received request: {:?}", request);
//!
//!                 let response = Response::new(http::StatusCode::OK)
//!                     .body(&b"Hello world!"[..]);
//!
//!                 responder.send(Ok(response));
//!             },
//!             timer,
//!             DEFAULT_IDLE_TIMEOUT,
//!         );
//!
//!         conn.await.ok();
//!     });
//! }
//! # }
//! ```

use crate::decode::RequestDecoder;
use crate::encode::ResponseEncoder;
use crate::http11::{poll_for_crlfcrlf, try_parse_req};
use crate::transport::{IdleTimer, Timer};
use crate::try_write::try_write;
use crate::{AsyncRead, AsyncWrite};
use crate::{Error, Request, Response};
use futures_channel::oneshot;
use futures_util::ready;
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

/// Size of buffer reading the request head into.
const READ_BUF_INIT_SIZE: usize = 16_384;

/// Idle timeout applied when the caller has no opinion.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Serve one request/response exchange over an accepted channel.
///
/// `handler` receives the decoded [`Request`] the moment the head is
/// decoded, together with a [`Responder`] to deliver the result. The
/// returned future must be polled to drive the connection; it resolves
/// once the channel is closed, which happens unconditionally after the
/// response is flushed (or after any failure or idle timeout).
pub fn serve<S, H>(
    io: S,
    handler: H,
    timer: Arc<dyn Timer>,
    idle_timeout: Duration,
) -> Connection<S, H>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: FnOnce(Request, Responder) + Unpin,
{
    Connection {
        io,
        handler: Some(handler),
        decoder: RequestDecoder::new(),
        encoder: ResponseEncoder::new(),
        state: State::RecvReq,
        to_write: vec![],
        to_write_flush_after: false,
        read_buf: Vec::with_capacity(READ_BUF_INIT_SIZE),
        idle: IdleTimer::new(timer, idle_timeout),
    }
}

/// Callback handle for the application to deliver its response.
///
/// `send` consumes the responder, so a second response on the same
/// connection is impossible. Dropping the responder without sending
/// closes the connection without a response.
pub struct Responder {
    tx_res: oneshot::Sender<Result<Response, Error>>,
}

impl Responder {
    /// Deliver the handler's result. May be called from any task. An
    /// `Err` closes the connection without a well-formed response;
    /// callers wanting an error body must encode it themselves within
    /// an `Ok` response.
    pub fn send(self, result: Result<Response, Error>) {
        if self.tx_res.send(result).is_err() {
            // connection went away first, nothing to deliver to
            debug!("Responder::send after connection teardown");
        }
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Responder")
    }
}

/// Server connection driving one exchange. Resolves when the channel
/// has been closed.
pub struct Connection<S, H> {
    io: S,
    handler: Option<H>,
    decoder: RequestDecoder,
    encoder: ResponseEncoder,
    state: State,
    // current bytes to be written
    to_write: Vec<u8>,
    to_write_flush_after: bool,
    // buffer to receive the request head into
    read_buf: Vec<u8>,
    idle: IdleTimer,
}

enum State {
    /// Reading the request head.
    RecvReq,
    /// Request dispatched, waiting for the application's response.
    AwaitRes {
        rx_res: oneshot::Receiver<Result<Response, Error>>,
    },
    /// Draining the encoded response, flush after the end marker.
    SendRes,
    /// Closing the channel.
    Closing { outcome: Option<Result<(), Error>> },
    /// Terminal.
    Closed,
}

impl<S, H> Future for Connection<S, H>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: FnOnce(Request, Responder) + Unpin,
{
    type Output = Result<(), Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        loop {
            trace!("poll: {:?}", this.state);

            match &mut this.state {
                State::Closing { outcome } => {
                    match Pin::new(&mut this.io).poll_close(cx) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(r) => {
                            if let Err(e) = r {
                                trace!("Close error: {:?}", e);
                            }
                            let outcome = outcome.take().expect("Missing close outcome");
                            this.state = State::Closed;
                            return Poll::Ready(outcome);
                        }
                    }
                }

                State::Closed => panic!("Connection polled after completion"),

                _ => {}
            }

            // the idle timer observes all connection traffic; firing
            // tears the connection down unilaterally
            if let Poll::Ready(()) = this.idle.poll_expired(cx) {
                debug!("Idle timeout fired, tearing down");
                this.state = State::Closing {
                    outcome: Some(Err(Error::Timeout)),
                };
                continue;
            }

            // drain queued outgoing bytes first
            let queued = this.to_write.len();
            let write_blocked = match try_write(
                cx,
                &mut this.io,
                &mut this.to_write,
                &mut this.to_write_flush_after,
            ) {
                Poll::Ready(Ok(())) => false,
                Poll::Pending => true,
                Poll::Ready(Err(e)) => {
                    // the response cannot be delivered; close regardless
                    trace!("Write error: {:?}", e);
                    this.state = State::Closing {
                        outcome: Some(Err(Error::Connection(e))),
                    };
                    continue;
                }
            };
            if this.to_write.len() < queued {
                this.idle.reset();
            }

            match this.drive_state(cx, write_blocked) {
                Poll::Ready(()) => continue,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<S, H> Connection<S, H>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: FnOnce(Request, Responder) + Unpin,
{
    fn drive_state(&mut self, cx: &mut Context<'_>, write_blocked: bool) -> Poll<()> {
        match &mut self.state {
            State::RecvReq => {
                // pull-based flow control: the read is issued when the
                // connection starts and re-issued after each processed
                // batch, here by looping until a full head is buffered
                let before = self.read_buf.len();
                let polled = poll_for_crlfcrlf(cx, &mut self.read_buf, &mut self.io);
                if self.read_buf.len() > before {
                    self.idle.reset();
                }

                match ready!(polled) {
                    Ok(()) => {}
                    Err(e) => {
                        if e.kind() == io::ErrorKind::UnexpectedEof {
                            trace!("Connection closed before request head");
                            self.close(Ok(()));
                        } else {
                            trace!("Read error: {:?}", e);
                            self.close(Err(Error::Connection(e)));
                        }
                        return Poll::Ready(());
                    }
                }

                // we got a full request head in read_buf
                let (req, size) = match try_parse_req(&self.read_buf) {
                    // invariant: poll_for_crlfcrlf must have read a full request.
                    Ok(v) => v.expect("Didn't read full request"),
                    Err(e) => {
                        // decode errors close the connection, they are
                        // not raised across the pipeline
                        debug!("Unparseable request head: {}", e);
                        self.close(Err(Error::Connection(e)));
                        return Poll::Ready(());
                    }
                };

                // invariant: entire buffer should have been used up.
                assert_eq!(self.read_buf.len(), size);

                let (parts, _) = req.into_parts();

                let request = match self.decoder.on_head(parts) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("Decode error: {}", e);
                        self.close(Err(Error::User(e.to_string())));
                        return Poll::Ready(());
                    }
                };

                if announces_body(request.headers()) {
                    // request bodies are not supported by this engine
                    if let Err(e) = self.decoder.on_body() {
                        debug!("Decode error: {}", e);
                        self.close(Err(Error::ReadBodyBadState));
                        return Poll::Ready(());
                    }
                }

                // hand the request to the application before the end
                // event; the responder may be used from any task
                let (tx_res, rx_res) = oneshot::channel();

                let handler = self.handler.take().expect("Missing handler");
                trace!("Dispatching {:?}", request);
                handler(request, Responder { tx_res });

                if let Err(e) = self.decoder.on_end() {
                    debug!("Decode error: {}", e);
                    self.close(Err(Error::User(e.to_string())));
                    return Poll::Ready(());
                }

                self.state = State::AwaitRes { rx_res };

                Poll::Ready(())
            }

            State::AwaitRes { rx_res } => {
                let result = ready!(Pin::new(rx_res).poll(cx));

                match result {
                    Ok(Ok(response)) => {
                        trace!("Start response write");

                        // invariant: there should be nothing queued to send.
                        assert!(self.to_write.is_empty());

                        if let Err(e) = self.encoder.encode_into(&response, &mut self.to_write) {
                            warn!("Encode failed: {}", e);
                            self.close(Err(e));
                            return Poll::Ready(());
                        }

                        // head, body and end marker go out in order, the
                        // flush is the end marker completing
                        self.to_write_flush_after = true;
                        self.state = State::SendRes;
                    }

                    Ok(Err(e)) => {
                        // a handler failure closes without a well-formed
                        // response
                        debug!("Handler error: {}", e);
                        self.close(Err(e));
                    }

                    Err(_) => {
                        warn!("Responder dropped without sending a response");
                        self.close(Err(Error::User(
                            "responder dropped without a response".into(),
                        )));
                    }
                }

                Poll::Ready(())
            }

            State::SendRes => {
                if write_blocked {
                    // try_write made max progress before drive_state
                    return Poll::Pending;
                }

                // response written and flushed. This connection never
                // supports reuse: close unconditionally.
                trace!("Response written, closing");
                self.close(Ok(()));

                Poll::Ready(())
            }

            State::Closing { .. } | State::Closed => {
                unreachable!("terminal state in drive_state")
            }
        }
    }

    fn close(&mut self, outcome: Result<(), Error>) {
        self.state = State::Closing {
            outcome: Some(outcome),
        };
    }
}

/// Whether the request head advertises a body.
fn announces_body(headers: &http::HeaderMap) -> bool {
    let clen = headers
        .get("content-length")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    clen > 0 || headers.contains_key("transfer-encoding")
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::RecvReq => write!(f, "RecvReq")?,
            State::AwaitRes { .. } => write!(f, "AwaitRes")?,
            State::SendRes => write!(f, "SendRes")?,
            State::Closing { .. } => write!(f, "Closing")?,
            State::Closed => write!(f, "Closed")?,
        }
        Ok(())
    }
}

impl<S, H> fmt::Debug for Connection<S, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection({:?})", self.state)
    }
}
