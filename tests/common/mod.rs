//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sidecar_proxy::{Endpoint, Proxy, ProxyError, Shutdown};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// A mock remote endpoint that records every request it receives, byte for byte.
pub struct MockRemote {
    pub addr: SocketAddr,
    requests: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MockRemote {
    /// Next raw request received on any connection.
    pub async fn next_request(&mut self) -> Vec<u8> {
        tokio::time::timeout(TIMEOUT, self.requests.recv())
            .await
            .expect("timed out waiting for the remote to receive a request")
            .expect("mock remote stopped")
    }

    /// Assert nothing reaches the remote for a while.
    pub async fn assert_no_request(&mut self, within: Duration) {
        if let Ok(Some(raw)) = tokio::time::timeout(within, self.requests.recv()).await {
            panic!(
                "remote unexpectedly received: {}",
                String::from_utf8_lossy(&raw)
            );
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::Tcp(self.addr.to_string())
    }
}

/// Start a mock remote that answers each request with `respond(raw request)`.
///
/// Connections are kept alive, so several requests may arrive on one.
pub async fn start_mock_remote<F>(respond: F) -> MockRemote
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, requests) = mpsc::unbounded_channel();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                while let Some(raw) = read_message(&mut socket, &mut buf).await {
                    let response = respond(&raw);
                    let _ = tx.send(raw);
                    if socket.write_all(&response).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    MockRemote { addr, requests }
}

/// Start a mock remote that always answers with the same bytes.
pub async fn start_fixed_remote(response: Vec<u8>) -> MockRemote {
    start_mock_remote(move |_| response.clone()).await
}

/// A proxy serving on an ephemeral local TCP port.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub task: JoinHandle<Result<(), ProxyError>>,
}

impl RunningProxy {
    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }

    /// Send `request` on a fresh connection and read one response.
    pub async fn exchange(&self, request: &[u8]) -> Vec<u8> {
        let mut client = self.connect().await;
        client.write_all(request).await.unwrap();
        read_one(&mut client).await
    }
}

/// Bind a listener, register it and run `proxy` in the background.
pub async fn start_proxy(mut proxy: Proxy) -> RunningProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    proxy.add_listener("test", listener);

    let shutdown = Shutdown::new();
    let signalled = shutdown.signalled();
    let task = tokio::spawn(proxy.process_until(signalled));

    RunningProxy {
        addr,
        shutdown,
        task,
    }
}

/// Read one HTTP message (head plus `Content-Length` body), returning its raw bytes.
///
/// Bytes past the message stay in `buf`. `None` at end of stream.
pub async fn read_message<R>(stream: &mut R, buf: &mut Vec<u8>) -> Option<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(len) = message_len(buf) {
            return Some(buf.drain(..len).collect());
        }
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Read exactly one HTTP message from a client socket, with a timeout.
pub async fn read_one(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    tokio::time::timeout(TIMEOUT, read_message(stream, &mut buf))
        .await
        .expect("timed out waiting for a response")
        .expect("connection closed before a full response")
}

/// True when the peer closes without sending anything else.
pub async fn reads_eof(stream: &mut TcpStream) -> bool {
    let mut byte = [0u8; 1];
    matches!(
        tokio::time::timeout(TIMEOUT, stream.read(&mut byte)).await,
        Ok(Ok(0)) | Ok(Err(_))
    )
}

fn message_len(buf: &[u8]) -> Option<usize> {
    let end = buf.windows(4).position(|w| w == b"\r\n\r\n")? + 4;
    let head = std::str::from_utf8(&buf[..end]).ok()?;
    let body = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    (buf.len() >= end + body).then_some(end + body)
}

/// Split a raw message into its head (without the blank line) and body.
pub fn split_message(raw: &[u8]) -> (String, Vec<u8>) {
    let end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("no end of head");
    (
        String::from_utf8(raw[..end].to_vec()).unwrap(),
        raw[end + 4..].to_vec(),
    )
}

/// Value of header `name` in a raw head, case-insensitively.
pub fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim())
}

pub fn json_response(status: &str, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

pub fn json_request(method: &str, path: &str, body: &str) -> Vec<u8> {
    format!(
        "{method} {path} HTTP/1.1\r\nHost: docker\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

/// In-memory log sink for asserting on emitted log lines.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Number of lines logged at `level`, e.g. `"WARN"`.
    pub fn count(&self, level: &str) -> usize {
        self.contents()
            .lines()
            .filter(|line| line.split_whitespace().any(|word| word == level))
            .count()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Capture every log line emitted on this thread while the guard lives.
///
/// Only works with the current-thread runtime, which is what `#[tokio::test]`
/// uses by default.
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}
