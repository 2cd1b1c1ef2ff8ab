//! Per-connection request decoding state.
//!
//! The decoder turns the inbound head/body/end event stream into a
//! single [`Request`] and refuses anything that would mean a second
//! request on the same connection. Illegal transitions come back as a
//! typed [`DecodeError`] so the connection driver can decide to close;
//! nothing here panics or raises across the pipeline.

use crate::Request;
use std::fmt;

/// Tracks request assembly on one connection.
enum State {
    /// No request in flight.
    Ready,
    /// Head seen, request handed downstream, body events would arrive here.
    AwaitingBody,
    /// Same handling as `AwaitingBody`; request bodies are not supported.
    AwaitingEnd,
    /// End seen. Nothing further is legal on this connection.
    Complete,
}

/// Errors for events arriving outside their expected state.
#[derive(Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// A head event while a request is already in flight.
    UnexpectedHead,
    /// Body bytes. This engine does not support request bodies.
    UnexpectedBody,
    /// An end event with no request in flight.
    UnexpectedEnd,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnexpectedHead => write!(f, "request head while request in flight"),
            DecodeError::UnexpectedBody => write!(f, "request bodies are not supported"),
            DecodeError::UnexpectedEnd => write!(f, "end event with no request in flight"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Accumulates decoded request events into a single [`Request`].
pub struct RequestDecoder {
    state: State,
}

impl RequestDecoder {
    pub fn new() -> Self {
        RequestDecoder {
            state: State::Ready,
        }
    }

    /// A request head was decoded. Produces the `Request` to forward
    /// downstream immediately; the end event is still outstanding.
    pub fn on_head(&mut self, parts: http::request::Parts) -> Result<Request, DecodeError> {
        match self.state {
            State::Ready => {
                let request = Request::from_parts(parts);
                trace!("decoded head: {:?}", request);
                self.state = State::AwaitingBody;
                Ok(request)
            }
            _ => Err(DecodeError::UnexpectedHead),
        }
    }

    /// Body bytes arrived. Always an error for this engine.
    pub fn on_body(&mut self) -> Result<(), DecodeError> {
        Err(DecodeError::UnexpectedBody)
    }

    /// The end of the request was decoded.
    pub fn on_end(&mut self) -> Result<(), DecodeError> {
        match self.state {
            State::AwaitingBody | State::AwaitingEnd => {
                self.state = State::Complete;
                Ok(())
            }
            _ => Err(DecodeError::UnexpectedEnd),
        }
    }

    /// Whether the single request on this connection is fully decoded.
    pub fn is_complete(&self) -> bool {
        matches!(self.state, State::Complete)
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        RequestDecoder::new()
    }
}

impl fmt::Debug for RequestDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Ready => "Ready",
            State::AwaitingBody => "AwaitingBody",
            State::AwaitingEnd => "AwaitingEnd",
            State::Complete => "Complete",
        };
        write!(f, "RequestDecoder({})", state)
    }
}
