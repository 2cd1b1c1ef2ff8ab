use async_std::net::TcpListener;
use futures_util::AsyncWriteExt;
use h1_oneshot::Error;
use std::time::{Duration, Instant};

mod common;

#[async_std::test]
async fn connect_failure() -> Result<(), Error> {
    common::setup_logger();

    // bind and drop to get a port nobody listens on
    let addr = {
        let l = TcpListener::bind("127.0.0.1:0").await?;
        l.local_addr()?
    };

    let req = http::Request::get("/path").body(vec![]).unwrap();

    let (_task, transaction) = common::client_to(addr).request(req, Duration::from_secs(5));

    let completion = transaction.await;

    assert!(completion.head.is_none());
    assert!(completion.body.is_none());

    match completion.error {
        Some(Error::Connection(_)) => {}
        other => panic!("Expected connection error, got {:?}", other),
    }

    Ok(())
}

#[async_std::test]
async fn close_before_head() -> Result<(), Error> {
    let addr = common::serve_raw(|_, tcp| async move {
        // drop without writing anything
        drop(tcp);
    })
    .await?;

    let req = http::Request::get("/path").body(vec![]).unwrap();

    let (_task, transaction) = common::client_to(addr).request(req, Duration::from_secs(5));

    let completion = transaction.await;

    assert!(completion.head.is_none());

    match completion.error {
        Some(Error::HandlerRemoved) => {}
        other => panic!("Expected handler removed, got {:?}", other),
    }

    Ok(())
}

#[async_std::test]
async fn close_after_head_is_success() -> Result<(), Error> {
    let addr = common::serve_raw(|_, mut tcp| async move {
        // announce 10 bytes, send none, drop
        let res = b"HTTP/1.1 200 OK\r\ncontent-length: 10\r\n\r\n";
        tcp.write_all(res).await.unwrap();
    })
    .await?;

    let req = http::Request::get("/path").body(vec![]).unwrap();

    let (_task, transaction) = common::client_to(addr).request(req, Duration::from_secs(5));

    let completion = transaction.await;

    // a drop after the head is best-effort completion, not an error
    assert!(completion.is_success());
    assert_eq!(completion.head.expect("response head").status, 200);
    assert!(completion.body.is_none());

    Ok(())
}

#[async_std::test]
async fn close_mid_body_is_partial_success() -> Result<(), Error> {
    let addr = common::serve_raw(|_, mut tcp| async move {
        // announce 10 bytes and send just "OK", then drop
        let res = b"HTTP/1.1 200 OK\r\ncontent-length: 10\r\n\r\nOK";
        tcp.write_all(res).await.unwrap();
    })
    .await?;

    let req = http::Request::get("/path").body(vec![]).unwrap();

    let (_task, transaction) = common::client_to(addr).request(req, Duration::from_secs(5));

    let completion = transaction.await;

    assert!(completion.is_success());
    assert_eq!(completion.body.as_deref(), Some(&b"OK"[..]));

    Ok(())
}

#[async_std::test]
async fn unparseable_response() -> Result<(), Error> {
    let addr = common::serve_raw(|_, mut tcp| async move {
        tcp.write_all(b"BOGUS NONSENSE\r\n\r\n").await.unwrap();
    })
    .await?;

    let req = http::Request::get("/path").body(vec![]).unwrap();

    let (_task, transaction) = common::client_to(addr).request(req, Duration::from_secs(5));

    let completion = transaction.await;

    assert!(completion.head.is_none());

    match completion.error {
        Some(Error::InvalidResponse(_)) => {}
        other => panic!("Expected invalid response, got {:?}", other),
    }

    Ok(())
}

#[async_std::test]
async fn chunked_response_refused() -> Result<(), Error> {
    let addr = common::serve_raw(|_, mut tcp| async move {
        let res = b"HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n5\r\nHELLO\r\n0\r\n\r\n";
        tcp.write_all(res).await.unwrap();
    })
    .await?;

    let req = http::Request::get("/path").body(vec![]).unwrap();

    let (_task, transaction) = common::client_to(addr).request(req, Duration::from_secs(5));

    let completion = transaction.await;

    match completion.error {
        Some(Error::InvalidResponse(_)) => {}
        other => panic!("Expected invalid response, got {:?}", other),
    }

    Ok(())
}

#[async_std::test]
async fn idle_timeout_before_head() -> Result<(), Error> {
    let addr = common::serve_raw(|_, tcp| async move {
        // accept, read the request, respond with silence
        async_std::task::sleep(Duration::from_secs(5)).await;
        drop(tcp);
    })
    .await?;

    let req = http::Request::get("/path").body(vec![]).unwrap();

    let (_task, transaction) = common::client_to(addr).request(req, Duration::from_millis(300));

    let start = Instant::now();
    let completion = transaction.await;

    assert!(start.elapsed() < Duration::from_secs(3));

    match completion.error {
        Some(Error::Timeout) => {}
        other => panic!("Expected timeout, got {:?}", other),
    }

    Ok(())
}

#[async_std::test]
async fn cancel_aborts_waiting() -> Result<(), Error> {
    let addr = common::serve_raw(|_, tcp| async move {
        // never respond; the client must not have to wait us out
        async_std::task::sleep(Duration::from_secs(30)).await;
        drop(tcp);
    })
    .await?;

    let req = http::Request::get("/path").body(vec![]).unwrap();

    let (task, transaction) = common::client_to(addr).request(req, Duration::from_secs(30));

    let handle = async_std::task::spawn(transaction);

    async_std::task::sleep(Duration::from_millis(100)).await;
    task.cancel();
    assert!(task.is_cancelled());

    let start = Instant::now();
    let completion = handle.await;

    // the cancel woke the in-flight wait rather than letting the idle
    // timeout run its course
    assert!(start.elapsed() < Duration::from_secs(3));
    assert!(completion.error.is_some());

    Ok(())
}
