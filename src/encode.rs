//! Response serialization for the server side.
//!
//! Exactly one response goes out per connection. The encoder writes the
//! head (with a computed `content-length`), the body bytes, and the end
//! marker in that order; the connection driver flushes after the end
//! marker and then closes unconditionally. A second encode attempt on
//! the same connection fails fast instead of double-writing.

use crate::http11::write_http11_res;
use crate::response::Response;
use crate::Error;
use std::fmt;

enum State {
    Ready,
    Sent,
}

/// Serializes one [`Response`] per connection.
pub struct ResponseEncoder {
    state: State,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        ResponseEncoder {
            state: State::Ready,
        }
    }

    /// Serialize head, body and end marker into `out`.
    ///
    /// Errors with [`Error::User`] if a response was already encoded on
    /// this connection.
    pub fn encode_into(&mut self, res: &Response, out: &mut Vec<u8>) -> Result<(), Error> {
        if let State::Sent = self.state {
            return Err(Error::User(
                "response already sent on this connection".into(),
            ));
        }

        write_http11_res(res, out).map_err(|e| Error::Internal(e.to_string()))?;

        if let Some(body) = res.body_bytes() {
            out.extend_from_slice(body);
        }

        self.state = State::Sent;

        trace!("encoded response: {:?} ({} bytes)", res, out.len());

        Ok(())
    }

    /// Serialize and return the bytes. Equivalent to [`encode_into`]
    /// with a fresh buffer.
    ///
    /// [`encode_into`]: ResponseEncoder::encode_into
    pub fn encode(&mut self, res: &Response) -> Result<Vec<u8>, Error> {
        let mut out = vec![];
        self.encode_into(res, &mut out)?;
        Ok(out)
    }
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        ResponseEncoder::new()
    }
}

impl fmt::Debug for ResponseEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Ready => "Ready",
            State::Sent => "Sent",
        };
        write!(f, "ResponseEncoder({})", state)
    }
}
