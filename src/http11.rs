use crate::response::Response;
use crate::AsyncRead;
use futures_util::ready;
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, TRANSFER_ENCODING};
use std::io;
use std::io::Write;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Write an http/1.1 request head (and nothing of the body) to a buffer.
///
/// When `body_len` is non-zero a computed `content-length` is appended
/// after the caller headers, and any caller-supplied `content-length` is
/// dropped so the computed value is the only one on the wire.
#[allow(clippy::write_with_newline)]
pub fn write_http11_req(
    req: &http::Request<()>,
    body_len: usize,
    buf: &mut Vec<u8>,
) -> io::Result<()> {
    let mut w = io::Cursor::new(buf);
    w.set_position(w.get_ref().len() as u64);

    // Path and query
    let pq = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let ver = match req.version() {
        http::Version::HTTP_10 => "1.0",
        http::Version::HTTP_11 => "1.1",
        _ => panic!("Unsupported http version: {:?}", req.version()),
    };

    write!(w, "{} {} HTTP/{}\r\n", req.method(), pq, ver)?;

    for (name, value) in req.headers() {
        if body_len > 0 && name == CONTENT_LENGTH {
            continue;
        }
        write!(w, "{}: ", name)?;
        w.write_all(value.as_bytes())?;
        write!(w, "\r\n")?;
    }

    if body_len > 0 {
        write!(w, "content-length: {}\r\n", body_len)?;
    }

    write!(w, "\r\n")?;

    let buf = w.into_inner();
    debug!("write_http11_req: {:?}", String::from_utf8_lossy(buf));

    Ok(())
}

/// Write an http/1.1 response head to a buffer.
///
/// `content-length` is always derived from the body and appended after
/// the caller headers; caller-supplied `content-length` and
/// `transfer-encoding` never reach the wire.
#[allow(clippy::write_with_newline)]
pub fn write_http11_res(res: &Response, buf: &mut Vec<u8>) -> io::Result<()> {
    let mut w = io::Cursor::new(buf);
    w.set_position(w.get_ref().len() as u64);

    write!(
        w,
        "HTTP/1.1 {} {}\r\n",
        res.status().as_u16(),
        res.status().canonical_reason().unwrap_or("Unknown")
    )?;

    for (name, value) in res.headers() {
        if *name == CONTENT_LENGTH {
            debug!("Dropping caller-supplied content-length");
            continue;
        }
        if *name == TRANSFER_ENCODING {
            debug!("Dropping transfer-encoding, bodies are contiguous");
            continue;
        }
        write!(w, "{}: ", name)?;
        w.write_all(value.as_bytes())?;
        write!(w, "\r\n")?;
    }

    write!(w, "content-length: {}\r\n", res.content_length())?;
    write!(w, "\r\n")?;

    let buf = w.into_inner();
    debug!("write_http11_res: {:?}", String::from_utf8_lossy(buf));

    Ok(())
}

/// Attempt to parse an http/1.1 response head.
pub fn try_parse_res(buf: &[u8]) -> Result<Option<(http::Response<()>, usize)>, io::Error> {
    trace!("try_parse_res: {:?}", String::from_utf8_lossy(buf));

    let mut headers = [httparse::EMPTY_HEADER; 128];
    let mut parser = httparse::Response::new(&mut headers);

    let status = parser
        .parse(buf)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    if status.is_partial() {
        return Ok(None);
    }

    let mut bld = http::Response::builder().version(version_of(parser.version));

    if let Some(code) = parser.code {
        bld = bld.status(code);
    }

    for head in parser.headers.iter() {
        let name = HeaderName::from_bytes(head.name.as_bytes());
        let value = HeaderValue::from_bytes(head.value);
        match (name, value) {
            (Ok(name), Ok(value)) => bld = bld.header(name, value),
            (Err(e), _) => {
                debug!("Dropping bad header name: {}", e);
            }
            (Ok(name), Err(e)) => {
                debug!("Dropping bad header value ({}): {}", name, e);
            }
        }
    }

    let built = bld
        .body(())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let len = status.unwrap();

    debug!("try_parse_res success: {:?}", built);

    Ok(Some((built, len)))
}

/// Attempt to parse an http/1.1 request head.
pub fn try_parse_req(buf: &[u8]) -> Result<Option<(http::Request<()>, usize)>, io::Error> {
    trace!("try_parse_req: {:?}", String::from_utf8_lossy(buf));

    let mut headers = [httparse::EMPTY_HEADER; 128];
    let mut parser = httparse::Request::new(&mut headers);

    let status = parser
        .parse(buf)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    if status.is_partial() {
        return Ok(None);
    }

    let mut uri = http::Uri::builder();

    if let Some(path) = parser.path {
        uri = uri.path_and_query(path);
    }

    let mut bld = http::Request::builder().version(version_of(parser.version));

    bld = bld.uri(
        uri.build()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
    );

    if let Some(method) = parser.method {
        bld = bld.method(method);
    }

    for head in parser.headers.iter() {
        let name = HeaderName::from_bytes(head.name.as_bytes());
        let value = HeaderValue::from_bytes(head.value);
        match (name, value) {
            (Ok(name), Ok(value)) => bld = bld.header(name, value),
            (Err(e), _) => {
                debug!("Dropping bad header name: {}", e);
            }
            (Ok(name), Err(e)) => {
                debug!("Dropping bad header value ({}): {}", name, e);
            }
        }
    }

    let built = bld
        .body(())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let len = status.unwrap();

    debug!("try_parse_req success: {:?}", built);

    Ok(Some((built, len)))
}

fn version_of(v: Option<u8>) -> http::Version {
    match v {
        Some(0) => http::Version::HTTP_10,
        _ => http::Version::HTTP_11,
    }
}

/// Helper to poll for a request or response head.
///
/// It looks out for \r\n\r\n, which indicates the end of the headers and body begins.
pub fn poll_for_crlfcrlf<S>(
    cx: &mut Context<'_>,
    buf: &mut Vec<u8>,
    io: &mut S,
) -> Poll<io::Result<()>>
where
    S: AsyncRead + Unpin,
{
    const END_OF_HEADER: &[u8] = &[b'\r', b'\n', b'\r', b'\n'];
    let mut end_index = 0;
    let mut buf_index = 0;
    let mut one = [0_u8; 1];

    // fix so end_index is where it needs to be
    loop {
        if buf_index == buf.len() {
            break;
        }
        if buf[buf_index] == END_OF_HEADER[end_index] {
            end_index += 1;
        } else if end_index > 0 {
            end_index = 0;
        }
        buf_index += 1;
    }

    loop {
        if buf_index == buf.len() {
            // read one more char
            let amount = ready!(Pin::new(&mut &mut *io).poll_read(cx, &mut one[..]))?;
            if amount == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "EOF before complete http11 header",
                ))
                .into();
            }
            buf.push(one[0]);
        }

        if buf[buf_index] == END_OF_HEADER[end_index] {
            end_index += 1;
        } else if end_index > 0 {
            end_index = 0;
        }

        if end_index == END_OF_HEADER.len() {
            // we found the end of header sequence
            break;
        }
        buf_index += 1;
    }

    Ok(()).into()
}
