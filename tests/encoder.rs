use h1_oneshot::encode::ResponseEncoder;
use h1_oneshot::{Error, Response};

#[test]
fn content_length_from_body() {
    let mut encoder = ResponseEncoder::new();

    let res = Response::new(http::StatusCode::OK).body(&b"HELLO"[..]);

    let bytes = encoder.encode(&res).unwrap();

    assert_eq!(
        bytes,
        b"HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\nHELLO"
    );
}

#[test]
fn caller_content_length_is_ignored() {
    let mut encoder = ResponseEncoder::new();

    let res = Response::new(http::StatusCode::OK)
        .header("content-length", "10000")
        .body(&b"HI"[..]);

    let bytes = encoder.encode(&res).unwrap();

    assert_eq!(bytes, b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nHI");
}

#[test]
fn absent_body_is_zero_length() {
    let mut encoder = ResponseEncoder::new();

    let res = Response::new(http::StatusCode::NOT_FOUND);

    let bytes = encoder.encode(&res).unwrap();

    assert_eq!(bytes, b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\n\r\n");
}

#[test]
fn header_order_preserved() {
    let mut encoder = ResponseEncoder::new();

    let res = Response::new(http::StatusCode::OK)
        .header("x-first", "1")
        .header("x-second", "2")
        .header("x-first", "3");

    let bytes = encoder.encode(&res).unwrap();

    assert_eq!(
        bytes,
        &b"HTTP/1.1 200 OK\r\nx-first: 1\r\nx-second: 2\r\nx-first: 3\r\ncontent-length: 0\r\n\r\n"[..]
    );
}

#[test]
fn second_encode_fails_fast() {
    let mut encoder = ResponseEncoder::new();

    let res = Response::new(http::StatusCode::OK).body(&b"ONE"[..]);

    encoder.encode(&res).unwrap();

    // the connection is already closed after the first response; a
    // second attempt must fail instead of double-writing
    let again = Response::new(http::StatusCode::OK).body(&b"TWO"[..]);

    match encoder.encode(&again) {
        Err(Error::User(_)) => {}
        other => panic!("Expected user error, got {:?}", other),
    }
}

#[test]
fn conventions_are_equivalent() {
    let res = Response::new(http::StatusCode::OK)
        .header("x-thing", "yes")
        .body(&b"PAYLOAD"[..]);

    let returned = ResponseEncoder::new().encode(&res).unwrap();

    let mut filled = vec![];
    ResponseEncoder::new().encode_into(&res, &mut filled).unwrap();

    assert_eq!(returned, filled);
}
