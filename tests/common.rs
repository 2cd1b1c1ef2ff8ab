#![allow(dead_code)]

use async_std::net::{TcpListener, TcpStream};
use async_std::os::unix::net::UnixStream;
use futures_io::AsyncRead;
use futures_util::future::poll_fn;
use futures_util::AsyncReadExt;
use h1_oneshot::client::Client;
use h1_oneshot::http11::poll_for_crlfcrlf;
use h1_oneshot::server::{serve, Responder};
use h1_oneshot::transport::{BoxIo, Connector, Timer};
use h1_oneshot::{Error, Request};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Once};
use std::time::Duration;

pub fn setup_logger() {
    static START: Once = Once::new();
    START.call_once(|| {
        let test_log = std::env::var("TEST_LOG")
            .map(|x| x != "0" && x.to_lowercase() != "false")
            .unwrap_or(false);
        let level = if test_log {
            log::LevelFilter::Trace
        } else {
            log::LevelFilter::Info
        };
        pretty_env_logger::formatted_builder()
            .filter_level(log::LevelFilter::Warn)
            .filter_module("h1_oneshot", level)
            .target(env_logger::Target::Stdout)
            .init();
    });
}

/// Timer backed by the async-std runtime.
pub struct TestTimer;

impl Timer for TestTimer {
    fn delay(&self, after: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async_std::task::sleep(after))
    }
}

pub fn timer() -> Arc<dyn Timer> {
    Arc::new(TestTimer)
}

/// Connector for plain TCP stream sockets.
pub struct TcpConnector(pub SocketAddr);

impl Connector for TcpConnector {
    fn connect(&self) -> Pin<Box<dyn Future<Output = io::Result<BoxIo>> + Send>> {
        let addr = self.0;
        Box::pin(async move {
            let tcp = TcpStream::connect(addr).await?;
            Ok(Box::new(tcp) as BoxIo)
        })
    }
}

/// Connector for unix domain sockets, standing in for the
/// point-to-point transport.
pub struct UnixConnector(pub PathBuf);

impl Connector for UnixConnector {
    fn connect(&self) -> Pin<Box<dyn Future<Output = io::Result<BoxIo>> + Send>> {
        let path = self.0.clone();
        Box::pin(async move {
            let stream = UnixStream::connect(path).await?;
            Ok(Box::new(stream) as BoxIo)
        })
    }
}

/// Client wired to a TCP endpoint with the test timer.
pub fn client_to(addr: SocketAddr) -> Client {
    Client::new(Arc::new(TcpConnector(addr)), timer())
}

/// Bind a TCP listener and serve a single connection with `handler`.
pub async fn run_server<H>(idle: Duration, handler: H) -> io::Result<SocketAddr>
where
    H: FnOnce(Request, Responder) + Send + Unpin + 'static,
{
    setup_logger();

    let l = TcpListener::bind("127.0.0.1:0").await?;
    let addr = l.local_addr()?;

    async_std::task::spawn(async move {
        if let Ok((socket, _)) = l.accept().await {
            if let Err(e) = serve(socket, handler, timer(), idle).await {
                log::debug!("server connection ended: {}", e);
            }
        }
    });

    Ok(addr)
}

/// Bind a TCP listener and hand the request head plus the raw socket
/// to `f` for scripted server behavior.
pub async fn serve_raw<F, R>(f: F) -> io::Result<SocketAddr>
where
    F: FnOnce(String, TcpStream) -> R + Send + 'static,
    R: Future<Output = ()> + Send,
{
    setup_logger();

    let l = TcpListener::bind("127.0.0.1:0").await?;
    let addr = l.local_addr()?;

    async_std::task::spawn(async move {
        let (mut tcp, _) = l.accept().await.expect("Accept failed");

        let head = read_header(&mut tcp).await.expect("Read request head");

        f(head, tcp).await;
    });

    Ok(addr)
}

/// Read a request or response head as a string.
pub async fn read_header<S: AsyncRead + Unpin>(io: &mut S) -> Result<String, Error> {
    let mut buf = vec![];
    poll_fn(|cx| poll_for_crlfcrlf(cx, &mut buf, io)).await?;
    Ok(String::from_utf8(buf).unwrap())
}

/// Read until the peer closes.
pub async fn read_to_end<S: AsyncRead + Unpin>(io: &mut S) -> io::Result<Vec<u8>> {
    let mut v = vec![];
    io.read_to_end(&mut v).await?;
    Ok(v)
}

/// A JSON payload of exactly `size` bytes.
pub fn json_payload(size: usize) -> Vec<u8> {
    const PREFIX: &[u8] = b"{\"payload\":\"";
    const SUFFIX: &[u8] = b"\"}";

    assert!(size > PREFIX.len() + SUFFIX.len());

    let mut v = Vec::with_capacity(size);
    v.extend_from_slice(PREFIX);
    v.resize(size - SUFFIX.len(), b'a');
    v.extend_from_slice(SUFFIX);

    v
}
