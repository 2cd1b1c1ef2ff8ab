use http::header::{HeaderName, HeaderValue};
use http::StatusCode;

/// One outbound server response, or a fully received client response.
///
/// Headers keep the order they were added in, duplicates included. The
/// `content-length` on the wire is always derived from the body by the
/// encoder; a value set here never reaches the peer.
pub struct Response {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Option<Vec<u8>>,
}

impl Response {
    /// New response with the given status, no headers and no body.
    pub fn new(status: StatusCode) -> Self {
        Response {
            status,
            headers: vec![],
            body: None,
        }
    }

    /// Append a header pair. Invalid names or values are dropped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            _ => debug!("Dropping bad header: {}", name),
        }
        self
    }

    /// Set the body payload. Absence means a zero-length body.
    pub fn body(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.body = Some(bytes.into());
        self
    }

    pub(crate) fn status(&self) -> StatusCode {
        self.status
    }

    pub(crate) fn headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.headers
    }

    pub(crate) fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Byte length the encoder will announce, 0 when there is no body.
    pub fn content_length(&self) -> usize {
        self.body.as_ref().map(|b| b.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Response({}, {} headers, {} body bytes)",
            self.status,
            self.headers.len(),
            self.content_length()
        )
    }
}
