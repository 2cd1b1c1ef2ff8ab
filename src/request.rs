use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque token identifying one decoded request. Never reused within
/// the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        RequestId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// One decoded inbound request.
///
/// Created the instant a request head is decoded and owned by the
/// connection that decoded it. There is never more than one live
/// `Request` per connection.
pub struct Request {
    id: RequestId,
    uri: String,
    method: http::Method,
    headers: http::HeaderMap,
    path_components: Vec<String>,
    query_items: Vec<(String, Option<String>)>,
}

impl Request {
    pub(crate) fn from_parts(parts: http::request::Parts) -> Self {
        let uri = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
            .to_string();

        let (path, query) = split_uri(&uri);

        Request {
            id: RequestId::next(),
            path_components: path_components(path),
            query_items: query_items(query),
            uri,
            method: parts.method,
            headers: parts.headers,
        }
    }

    /// Identifier assigned at decode time.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// The raw request target.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Request method.
    pub fn method(&self) -> &http::Method {
        &self.method
    }

    /// Headers in wire order, duplicate names preserved.
    pub fn headers(&self) -> &http::HeaderMap {
        &self.headers
    }

    /// `/`-delimited segments of the path, leading empty segment dropped.
    pub fn path_components(&self) -> &[String] {
        &self.path_components
    }

    /// Query string name/value pairs in original order. A name without
    /// `=` carries no value.
    pub fn query_items(&self) -> &[(String, Option<String>)] {
        &self.query_items
    }
}

/// Split a request target into path and optional query string.
fn split_uri(uri: &str) -> (&str, Option<&str>) {
    match uri.find('?') {
        Some(i) => (&uri[..i], Some(&uri[i + 1..])),
        None => (uri, None),
    }
}

fn path_components(path: &str) -> Vec<String> {
    let mut it = path.split('/');
    if path.starts_with('/') {
        // drop the leading empty segment
        it.next();
    }
    it.map(|s| s.to_string()).collect()
}

fn query_items(query: Option<&str>) -> Vec<(String, Option<String>)> {
    let query = match query {
        Some(q) => q,
        None => return vec![],
    };

    query
        .split('&')
        .filter(|item| !item.is_empty())
        .map(|item| match item.find('=') {
            Some(i) => (item[..i].to_string(), Some(item[i + 1..].to_string())),
            None => (item.to_string(), None),
        })
        .collect()
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Request({}, {} {})", self.id, self.method, self.uri)
    }
}
