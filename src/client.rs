//! Client side of a single-shot HTTP/1.1 exchange.
//!
//! A [`Client`] holds the transport capabilities ([`Connector`] and
//! [`Timer`]) and starts one [`Transaction`] per request. The
//! transaction drives the whole exchange: connect, run the pipeline
//! setup, write the request (head, body, end), then pull the response
//! off the wire under read pacing until a terminal event. The channel
//! carries exactly one exchange and is closed before the transaction
//! resolves.
//!
//! # Example
//!
//! ```rust, no_run
//! use h1_oneshot::client::Client;
//! use h1_oneshot::transport::{Connector, Timer};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run(connector: Arc<dyn Connector>, timer: Arc<dyn Timer>) {
//! let client = Client::new(connector, timer);
//!
//! let req = http::Request::get("/payload").body(vec![]).unwrap();
//!
//! let (_task, transaction) = client.request(req, Duration::from_secs(30));
//!
//! let completion = transaction.await;
//!
//! if let Some(head) = &completion.head {
//!     println!("status: {}", head.status);
//! }
//! # }
//! ```

use crate::http11::{poll_for_crlfcrlf, try_parse_res, write_http11_req};
use crate::limit::LimitRead;
use crate::transport::{standard_pipeline, BoxIo, Connector, IdleTimer, PipelineSetup, Timer};
use crate::try_write::try_write;
use crate::AsyncWrite;
use crate::Error;
use futures_util::ready;
use std::fmt;
use std::future::Future;
use std::io;
use std::mem;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

/// Size of buffer reading response body into.
const READ_BUF_INIT_SIZE: usize = 16_384;

/// Delay before the next read is requested after an inbound head or
/// body event. Deliberate backpressure so a fast peer cannot outrun
/// the consumer.
const READ_PACE_DELAY: Duration = Duration::from_millis(100);

/// Starts single-shot transactions against one remote endpoint.
pub struct Client {
    connector: Arc<dyn Connector>,
    timer: Arc<dyn Timer>,
}

impl Client {
    /// New client over the given transport capabilities.
    pub fn new(connector: Arc<dyn Connector>, timer: Arc<dyn Timer>) -> Self {
        Client { connector, timer }
    }

    /// Begin one request/response exchange with the default pipeline.
    ///
    /// `timeout` is the idle timeout for the connection: it resets on
    /// any channel activity and tears the exchange down when it fires.
    ///
    /// The returned [`Transaction`] resolves exactly once with the
    /// [`Completion`]. The [`ClientTask`] can cancel the exchange.
    pub fn request(
        &self,
        req: http::Request<Vec<u8>>,
        timeout: Duration,
    ) -> (ClientTask, Transaction) {
        self.request_with(req, timeout, standard_pipeline())
    }

    /// Like [`request`], with a pipeline setup step run between connect
    /// and the HTTP layer. Use it to insert additional protocol
    /// adapters around the raw channel.
    ///
    /// [`request`]: Client::request
    pub fn request_with(
        &self,
        req: http::Request<Vec<u8>>,
        timeout: Duration,
        setup: PipelineSetup,
    ) -> (ClientTask, Transaction) {
        let cancelled = Cancel::new();

        let task = ClientTask {
            cancelled: cancelled.clone(),
        };

        let (parts, body) = req.into_parts();
        let head = http::Request::from_parts(parts, ());

        let transaction = Transaction {
            state: TxnState::Connect {
                fut: self.connector.connect(),
                setup: Some(setup),
                head: Some(head),
                body,
                timer: self.timer.clone(),
                timeout,
                cancelled,
            },
        };

        (task, transaction)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Client")
    }
}

/// Handle to a transaction in flight.
///
/// Holds no reference to the underlying channel; it observes the
/// transaction only through the cancellation flag.
#[derive(Clone, Debug)]
pub struct ClientTask {
    cancelled: Arc<Cancel>,
}

impl ClientTask {
    /// Cancel the transaction. No further work is scheduled, in-flight
    /// waits are woken, and the transaction resolves promptly through
    /// the close path.
    pub fn cancel(&self) {
        self.cancelled.cancel();
    }

    /// Whether [`cancel`] was called.
    ///
    /// [`cancel`]: ClientTask::cancel
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.flag.load(Ordering::SeqCst)
    }
}

/// Cancellation flag shared between the task handle and the
/// transaction. Carries a waker so a cancel aborts waits already in
/// progress instead of waiting for the next wakeup.
#[derive(Debug)]
struct Cancel {
    flag: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl Cancel {
    fn new() -> Arc<Cancel> {
        Arc::new(Cancel {
            flag: AtomicBool::new(false),
            waker: Mutex::new(None),
        })
    }

    fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        if let Some(waker) = self.waker.lock().unwrap().take() {
            waker.wake();
        }
    }

    /// Register interest and check the flag. The second load closes the
    /// race with a `cancel()` arriving between load and registration.
    fn check(&self, cx: &mut Context<'_>) -> bool {
        if self.flag.load(Ordering::SeqCst) {
            return true;
        }
        *self.waker.lock().unwrap() = Some(cx.waker().clone());
        self.flag.load(Ordering::SeqCst)
    }
}

/// Outcome of one transaction, delivered exactly once.
///
/// A connection drop after at least a head was received reports the
/// accumulated partial state as success: `head` set, `body` holding
/// whatever arrived, `error` empty.
pub struct Completion {
    /// Response head, when one was observed before the connection ended.
    pub head: Option<http::response::Parts>,
    /// Accumulated body bytes, when any arrived.
    pub body: Option<Vec<u8>>,
    /// The failure, when no head was observed.
    pub error: Option<Error>,
}

impl Completion {
    fn success(head: http::response::Parts, body: Option<Vec<u8>>) -> Self {
        Completion {
            head: Some(head),
            body,
            error: None,
        }
    }

    fn failed(error: Error) -> Self {
        Completion {
            head: None,
            body: None,
            error: Some(error),
        }
    }

    /// True when a response head was received.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Completion(head: {}, body: {:?} bytes, error: {:?})",
            self.head.as_ref().map(|h| h.status.as_u16()).unwrap_or(0),
            self.body.as_ref().map(|b| b.len()),
            self.error
        )
    }
}

/// One-shot slot for the transaction outcome. A second fill is refused.
struct CompletionSlot(Option<Completion>);

impl CompletionSlot {
    fn new() -> Self {
        CompletionSlot(None)
    }

    fn fill(&mut self, completion: Completion) {
        if self.0.is_some() {
            warn!("Completion already delivered, dropping second");
            return;
        }
        self.0 = Some(completion);
    }

    fn take(&mut self) -> Completion {
        // invariant: the slot is filled before State::Complete is entered.
        self.0.take().expect("Missing completion")
    }
}

/// Future for one whole exchange: connect, send, receive, close.
pub struct Transaction {
    state: TxnState,
}

enum TxnState {
    /// Establishing the transport channel.
    Connect {
        fut: Pin<Box<dyn Future<Output = io::Result<BoxIo>> + Send>>,
        setup: Option<PipelineSetup>,
        head: Option<http::Request<()>>,
        body: Vec<u8>,
        timer: Arc<dyn Timer>,
        timeout: Duration,
        cancelled: Arc<Cancel>,
    },
    /// Request/response exchange over the configured channel.
    Exchange(Exchange),
    /// Completion delivered.
    Done,
}

impl Future for Transaction {
    type Output = Completion;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        loop {
            match &mut this.state {
                TxnState::Connect {
                    fut,
                    setup,
                    head,
                    body,
                    timer,
                    timeout,
                    cancelled,
                } => {
                    if cancelled.check(cx) {
                        debug!("Cancelled during connect");
                        this.state = TxnState::Done;
                        return Poll::Ready(Completion::failed(Error::Connection(io::Error::new(
                            io::ErrorKind::Interrupted,
                            "transaction cancelled",
                        ))));
                    }

                    let io = match ready!(fut.as_mut().poll(cx)) {
                        Ok(io) => io,
                        Err(e) => {
                            trace!("Connect failed: {:?}", e);
                            this.state = TxnState::Done;
                            return Poll::Ready(Completion::failed(Error::Connection(e)));
                        }
                    };

                    // caller-supplied pipeline configuration runs before
                    // the HTTP layer sees the channel
                    let setup = setup.take().expect("Missing pipeline setup");
                    let io = match setup(io) {
                        Ok(io) => io,
                        Err(e) => {
                            trace!("Pipeline setup failed: {:?}", e);
                            this.state = TxnState::Done;
                            return Poll::Ready(Completion::failed(Error::Connection(e)));
                        }
                    };

                    let head = head.take().expect("Missing request head");
                    let body = mem::take(body);

                    let mut to_write = vec![];
                    if let Err(e) = write_http11_req(&head, body.len(), &mut to_write) {
                        this.state = TxnState::Done;
                        return Poll::Ready(Completion::failed(Error::Internal(e.to_string())));
                    }
                    to_write.extend_from_slice(&body);

                    let idle = IdleTimer::new(timer.clone(), *timeout);
                    let timer = timer.clone();
                    let cancelled = cancelled.clone();

                    this.state = TxnState::Exchange(Exchange {
                        io,
                        to_write,
                        // the end of the request is flushed before the
                        // first read is requested
                        to_write_flush_after: true,
                        state: State::AwaitingResponse { buf: vec![] },
                        slot: CompletionSlot::new(),
                        recv_buf: vec![],
                        idle,
                        pace: None,
                        timer,
                        cancelled,
                    });
                }

                TxnState::Exchange(ex) => {
                    let completion = ready!(ex.poll_drive(cx));
                    this.state = TxnState::Done;
                    return Poll::Ready(completion);
                }

                TxnState::Done => panic!("Transaction polled after completion"),
            }
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            TxnState::Connect { .. } => write!(f, "Transaction(Connect)"),
            TxnState::Exchange(ex) => write!(f, "Transaction({:?})", ex.state),
            TxnState::Done => write!(f, "Transaction(Done)"),
        }
    }
}

/// Drives the request out and the response in on one channel.
struct Exchange {
    io: BoxIo,
    to_write: Vec<u8>,
    to_write_flush_after: bool,
    state: State,
    slot: CompletionSlot,
    recv_buf: Vec<u8>,
    idle: IdleTimer,
    pace: Option<Pin<Box<dyn Future<Output = ()> + Send>>>,
    timer: Arc<dyn Timer>,
    cancelled: Arc<Cancel>,
}

enum State {
    /// Request on the wire, waiting for the response head.
    AwaitingResponse { buf: Vec<u8> },
    /// Head received, no body bytes yet.
    Head {
        head: http::response::Parts,
        limit: LimitRead,
    },
    /// Head received, body bytes accumulating.
    Body {
        head: http::response::Parts,
        limit: LimitRead,
        body: Vec<u8>,
    },
    /// Closing the channel before delivering the completion.
    Closing,
    /// Completion delivered.
    Complete,
    /// Placeholder
    Empty,
}

impl State {
    /// Take the state, leaving placeholder `State::Empty` in place.
    fn take(&mut self) -> State {
        mem::replace(self, State::Empty)
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::AwaitingResponse { buf } => write!(f, "AwaitingResponse({})", buf.len())?,
            State::Head { head, .. } => write!(f, "Head({})", head.status)?,
            State::Body { head, body, .. } => write!(f, "Body({}, {})", head.status, body.len())?,
            State::Closing => write!(f, "Closing")?,
            State::Complete => write!(f, "Complete")?,
            State::Empty => write!(f, "Empty")?,
        }
        Ok(())
    }
}

impl Exchange {
    fn poll_drive(&mut self, cx: &mut Context<'_>) -> Poll<Completion> {
        loop {
            trace!("poll_drive: {:?}", self.state);

            match &mut self.state {
                State::Closing => {
                    // the channel close completes before the completion
                    // is delivered
                    match Pin::new(&mut self.io).poll_close(cx) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(r) => {
                            if let Err(e) = r {
                                trace!("Close error: {:?}", e);
                            }
                            self.state = State::Complete;
                        }
                    }
                    continue;
                }

                State::Complete => {
                    return Poll::Ready(self.slot.take());
                }

                _ => {}
            }

            // cooperative cancellation: no further work is scheduled,
            // the accumulated state is reported through the close path
            if self.cancelled.check(cx) {
                debug!("Transaction cancelled");
                self.finish_from_state();
                continue;
            }

            // the idle timer observes all channel activity
            if let Poll::Ready(()) = self.idle.poll_expired(cx) {
                debug!("Idle timeout fired");
                self.on_idle_expired();
                continue;
            }

            // drain queued outgoing bytes first
            let queued = self.to_write.len();
            let write_blocked = match try_write(
                cx,
                &mut self.io,
                &mut self.to_write,
                &mut self.to_write_flush_after,
            ) {
                Poll::Ready(Ok(())) => false,
                Poll::Pending => true,
                Poll::Ready(Err(e)) => {
                    trace!("Write error: {:?}", e);
                    self.fail(Error::Connection(e));
                    continue;
                }
            };
            if self.to_write.len() < queued {
                self.idle.reset();
            }

            match self.drive_state(cx, write_blocked) {
                Poll::Ready(()) => continue,
                Poll::Pending => return Poll::Pending,
            }
        }
    }

    fn drive_state(&mut self, cx: &mut Context<'_>, write_blocked: bool) -> Poll<()> {
        match &mut self.state {
            State::Empty => {
                // invariant: Empty is just a placeholder.
                panic!("State::Empty in drive_state");
            }

            State::AwaitingResponse { buf } => {
                if write_blocked {
                    // the request must be fully on the wire and flushed
                    // before the first read is requested
                    return Poll::Pending;
                }

                let before = buf.len();
                let polled = poll_for_crlfcrlf(cx, buf, &mut self.io);
                let grew = buf.len() > before;
                if grew {
                    self.idle.reset();
                }

                match ready!(polled) {
                    Ok(()) => {}
                    Err(e) => {
                        if e.kind() == io::ErrorKind::UnexpectedEof {
                            // peer went away before a full head
                            trace!("Connection closed before response head");
                            self.finish_from_state();
                        } else {
                            trace!("Read error: {:?}", e);
                            self.fail(Error::Connection(e));
                        }
                        return Poll::Ready(());
                    }
                }

                let res = match try_parse_res(buf) {
                    // invariant: poll_for_crlfcrlf provides a full head and
                    //            try_parse_res cannot see a partial response.
                    Ok(v) => {
                        let (res, size) = v.expect("Parsed partial response");

                        // invariant: all bytes should have been used up
                        assert_eq!(buf.len(), size);

                        res
                    }
                    Err(e) => {
                        debug!("Unparseable response head: {}", e);
                        self.fail(Error::InvalidResponse(e.to_string()));
                        return Poll::Ready(());
                    }
                };

                let limit = match LimitRead::from_headers(res.headers()) {
                    Ok(v) => v,
                    Err(e) => {
                        self.fail(e);
                        return Poll::Ready(());
                    }
                };

                let (head, _) = res.into_parts();

                trace!("Response head: {} ({:?})", head.status, limit);

                if limit.is_no_body() {
                    // the end event follows the head immediately; close
                    // without emitting further reads
                    self.slot.fill(Completion::success(head, None));
                    self.state = State::Closing;
                } else {
                    self.state = State::Head { head, limit };
                    // next read only after the pacing delay
                    self.pace = Some(self.timer.delay(READ_PACE_DELAY));
                }

                Poll::Ready(())
            }

            State::Head { .. } | State::Body { .. } => {
                // the previous event's pacing delay gates the next read
                if let Some(pace) = &mut self.pace {
                    ready!(pace.as_mut().poll(cx));
                    self.pace = None;
                }

                self.recv_buf.resize(READ_BUF_INIT_SIZE, 0);

                let amount = {
                    let limit = match &mut self.state {
                        State::Head { limit, .. } | State::Body { limit, .. } => limit,
                        _ => unreachable!(),
                    };

                    match ready!(limit.poll_read(cx, &mut self.io, &mut self.recv_buf)) {
                        Ok(v) => v,
                        Err(e) => {
                            trace!("Read error: {:?}", e);
                            self.fail(Error::Connection(e));
                            return Poll::Ready(());
                        }
                    }
                };

                self.idle.reset();

                if amount == 0 {
                    // the peer closed before the announced end; the
                    // accumulated partial state is reported as success
                    trace!("EOF in body read");
                    self.finish_from_state();
                    return Poll::Ready(());
                }

                self.append_body(amount);

                let complete = match &self.state {
                    State::Body { limit, .. } => limit.is_complete(),
                    _ => false,
                };

                if complete {
                    // end of response; close immediately without
                    // emitting further reads
                    trace!("Response complete");
                    self.finish_from_state();
                } else {
                    // next read only after the pacing delay
                    self.pace = Some(self.timer.delay(READ_PACE_DELAY));
                }

                Poll::Ready(())
            }

            State::Closing | State::Complete => {
                unreachable!("terminal state in drive_state")
            }
        }
    }

    /// Move freshly read bytes into the accumulated body.
    fn append_body(&mut self, amount: usize) {
        let chunk = &self.recv_buf[..amount];

        match self.state.take() {
            State::Head { head, limit } => {
                self.state = State::Body {
                    head,
                    limit,
                    body: chunk.to_vec(),
                };
            }
            State::Body {
                head,
                limit,
                mut body,
            } => {
                body.extend_from_slice(chunk);
                self.state = State::Body { head, limit, body };
            }
            _ => panic!("append_body in incorrect state"),
        }
    }

    /// Terminal failure: report the error and close the channel.
    fn fail(&mut self, error: Error) {
        self.slot.fill(Completion::failed(error));
        self.state = State::Closing;
    }

    /// The connection ended (peer close, end event or cancellation).
    /// Report whatever state was accumulated.
    fn finish_from_state(&mut self) {
        match self.state.take() {
            State::AwaitingResponse { .. } => {
                self.slot.fill(Completion::failed(Error::HandlerRemoved));
            }
            State::Head { head, .. } => {
                self.slot.fill(Completion::success(head, None));
            }
            State::Body { head, body, .. } => {
                self.slot.fill(Completion::success(head, Some(body)));
            }
            State::Closing | State::Complete | State::Empty => {}
        }
        self.state = State::Closing;
    }

    /// The idle timer fired. Before a head this is a distinct timeout
    /// failure; after a head it takes the ordinary close path.
    fn on_idle_expired(&mut self) {
        match self.state.take() {
            State::AwaitingResponse { .. } => {
                self.slot.fill(Completion::failed(Error::Timeout));
                self.state = State::Closing;
            }
            other => {
                self.state = other;
                self.finish_from_state();
            }
        }
    }
}
