//! End-to-end transfer of a large payload, our client against our
//! server, over both supported transport kinds.

use async_std::os::unix::net::UnixListener;
use h1_oneshot::client::Client;
use h1_oneshot::server::serve;
use h1_oneshot::transport::Connector;
use h1_oneshot::{Error, Response};
use std::sync::Arc;
use std::time::Duration;

mod common;

const PAYLOAD_SIZE: usize = 500_000;
const IDLE: Duration = Duration::from_secs(30);

async fn exchange_payload<C: Connector + 'static>(connector: C) -> Result<(), Error> {
    let payload = common::json_payload(PAYLOAD_SIZE);

    let client = Client::new(Arc::new(connector), common::timer());

    let req = http::Request::get("/payload").body(vec![]).unwrap();

    let (_task, transaction) = client.request(req, IDLE);

    let completion = transaction.await;

    assert!(completion.is_success(), "error: {:?}", completion.error);
    assert_eq!(completion.head.expect("response head").status, 200);

    let body = completion.body.expect("response body");
    assert_eq!(body.len(), PAYLOAD_SIZE);
    assert_eq!(body, payload);

    Ok(())
}

#[async_std::test]
async fn large_response_tcp() -> Result<(), Error> {
    let payload = common::json_payload(PAYLOAD_SIZE);

    let addr = common::run_server(IDLE, move |request, responder| {
        assert_eq!(request.path_components(), ["payload"]);

        let res = Response::new(http::StatusCode::OK).body(payload);

        responder.send(Ok(res));
    })
    .await?;

    exchange_payload(common::TcpConnector(addr)).await
}

#[async_std::test]
async fn large_response_unix() -> Result<(), Error> {
    common::setup_logger();

    let payload = common::json_payload(PAYLOAD_SIZE);

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("transfer.sock");

    let listener = UnixListener::bind(&path).await?;

    async_std::task::spawn(async move {
        let (socket, _) = listener.accept().await.expect("Accept failed");

        let conn = serve(
            socket,
            move |request, responder| {
                assert_eq!(request.path_components(), ["payload"]);

                let res = Response::new(http::StatusCode::OK).body(payload);

                responder.send(Ok(res));
            },
            common::timer(),
            IDLE,
        );

        if let Err(e) = conn.await {
            log::debug!("server connection ended: {}", e);
        }
    });

    exchange_payload(common::UnixConnector(path)).await
}
