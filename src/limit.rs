use crate::AsyncRead;
use crate::Error;
use futures_util::ready;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};

/// Limit reading response body data given configuration from headers.
pub(crate) enum LimitRead {
    /// Body data is limited by a `content-length` header.
    ContentLength(ContentLengthRead),
    /// Read until the connection closes.
    ReadToEnd(ReadToEnd),
    /// No expected body.
    NoBody,
}

impl LimitRead {
    /// Create an instance from response headers.
    ///
    /// 1. If header `content-length: <number>` use a reader limited by length.
    /// 2. Otherwise the body length is determined by the closing of the
    ///    connection.
    ///
    /// Chunked transfer-encoding is not part of this engine and is
    /// refused up front.
    pub fn from_headers(headers: &http::HeaderMap<http::HeaderValue>) -> Result<Self, Error> {
        if is_chunked(headers) {
            return Err(Error::InvalidResponse(
                "chunked transfer-encoding is not supported".into(),
            ));
        }

        let ret = if let Some(size) = get_as::<u64>(headers, "content-length") {
            LimitRead::ContentLength(ContentLengthRead::new(size))
        } else {
            LimitRead::ReadToEnd(ReadToEnd::new())
        };

        trace!("LimitRead from headers: {:?}", ret);

        Ok(ret)
    }

    pub fn is_no_body(&self) -> bool {
        match &self {
            LimitRead::ContentLength(r) => r.limit == 0,
            LimitRead::NoBody => true,
            _ => false,
        }
    }

    /// Whether the entire announced body has been read.
    pub fn is_complete(&self) -> bool {
        match &self {
            LimitRead::ContentLength(v) => v.is_end(),
            LimitRead::ReadToEnd(v) => v.is_end(),
            LimitRead::NoBody => true,
        }
    }

    /// Try read some data.
    pub fn poll_read<S: AsyncRead + Unpin>(
        &mut self,
        cx: &mut Context,
        recv: &mut S,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        match self {
            LimitRead::ContentLength(v) => v.poll_read(cx, recv, buf),
            LimitRead::ReadToEnd(v) => v.poll_read(cx, recv, buf),
            LimitRead::NoBody => Ok(0).into(),
        }
    }
}

/// Reader limited by a set length.
#[derive(Debug)]
pub(crate) struct ContentLengthRead {
    limit: u64,
    total: u64,
}

impl ContentLengthRead {
    fn new(limit: u64) -> Self {
        ContentLengthRead { limit, total: 0 }
    }

    fn is_end(&self) -> bool {
        self.total == self.limit
    }

    fn poll_read<R: AsyncRead + Unpin>(
        &mut self,
        cx: &mut Context,
        recv: &mut R,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        assert!(!buf.is_empty(), "poll_read with len 0 buf");

        let left = (self.limit - self.total).min(usize::max_value() as u64) as usize;

        if left == 0 {
            // Nothing more should be read.
            return Ok(0).into();
        }

        let max = buf.len().min(left);
        let amount = ready!(Pin::new(&mut *recv).poll_read(cx, &mut buf[0..max]))?;

        if amount == 0 {
            // The peer closed before the announced length was reached.
            // The accumulated partial body is reported as-is; whether
            // that is a success is the caller's call.
            debug!(
                "Partial body received {} bytes of announced {}",
                self.total, self.limit
            );
        }
        self.total += amount as u64;

        Ok(amount).into()
    }
}

pub(crate) struct ReadToEnd {
    reached_end: bool,
}

impl ReadToEnd {
    fn new() -> Self {
        ReadToEnd { reached_end: false }
    }

    fn is_end(&self) -> bool {
        self.reached_end
    }

    fn poll_read<R: AsyncRead + Unpin>(
        &mut self,
        cx: &mut Context,
        recv: &mut R,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        assert!(!buf.is_empty(), "poll_read with len 0 buf");

        let amount = ready!(Pin::new(&mut *recv).poll_read(cx, buf))?;

        if amount == 0 {
            self.reached_end = true;
        }

        Ok(amount).into()
    }
}

impl fmt::Debug for LimitRead {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            LimitRead::ContentLength(l) => write!(f, "ContentLength({})", l.limit)?,
            LimitRead::ReadToEnd(_) => write!(f, "ReadToEnd")?,
            LimitRead::NoBody => write!(f, "NoBody")?,
        }
        Ok(())
    }
}

fn is_chunked(headers: &http::HeaderMap<http::HeaderValue>) -> bool {
    headers
        .get("transfer-encoding")
        .and_then(|h| h.to_str().ok())
        // https://tools.ietf.org/html/rfc2616#section-4.4
        //
        // If a Transfer-Encoding header field (section 14.41) is present and
        // has any value other than "identity", then the transfer-length is
        // defined by use of the "chunked" transfer-coding
        .map(|h| !h.contains("identity"))
        .unwrap_or(false)
}

fn get_str<'a>(headers: &'a http::HeaderMap, key: &str) -> Option<&'a str> {
    headers.get(key).and_then(|v| v.to_str().ok())
}

fn get_as<T: FromStr>(headers: &http::HeaderMap, key: &str) -> Option<T> {
    get_str(headers, key).and_then(|v| v.parse().ok())
}
