//! In-process exerciser service for the engine tests: a control endpoint for
//! round-trip timing, a sized byte stream, and a discarding upload sink,
//! each with injectable fault modes.

use std::net::SocketAddr;
use std::time::Duration;

use netgauge::settings::{Endpoints, Settings};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone, Copy)]
pub enum DownloadMode {
    /// Paced stream of `chunk`-byte writes every `interval_ms`. The
    /// advertised length comes from the request's `bytes=` query.
    Stream { chunk: usize, interval_ms: u64 },
    /// Respond 500 with an empty body.
    BadStatus,
    /// Drop the connection after reading the request head.
    Reset,
}

#[derive(Debug, Clone, Copy)]
pub enum UploadMode {
    /// Read the body, acknowledge with the byte count.
    Accept,
    /// Drop the connection without responding.
    Reset,
}

pub struct Exerciser {
    pub addr: SocketAddr,
}

impl Exerciser {
    pub async fn spawn(download: DownloadMode, upload: UploadMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((sock, _)) = listener.accept().await {
                tokio::spawn(handle(sock, download, upload));
            }
        });

        Self { addr }
    }

    pub fn endpoints(&self) -> Endpoints {
        let base = format!("http://{}", self.addr);
        Endpoints {
            ping_url: format!("{base}/ping"),
            download_url: format!("{base}/down"),
            upload_url: format!("{base}/up"),
        }
    }

    /// Settings scaled down so a full run finishes in about a second.
    pub fn settings(&self) -> Settings {
        Settings {
            probe_count: 3,
            download_window: Duration::from_millis(400),
            upload_window: Duration::from_millis(400),
            stream_floor_bytes: 8_000_000,
            upload_chunk_bytes: 64 * 1024,
            run_upload: true,
            endpoints: self.endpoints(),
        }
    }
}

async fn handle(mut sock: TcpStream, download: DownloadMode, upload: UploadMode) {
    let Some((head, leftover)) = read_head(&mut sock).await else {
        return;
    };
    let mut parts = head.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("/");

    match (method, path) {
        ("GET", p) if p.starts_with("/ping") => {
            respond(&mut sock, "200 OK", b"pong").await;
        }
        ("GET", p) if p.starts_with("/down") => match download {
            DownloadMode::BadStatus => {
                respond(&mut sock, "500 Internal Server Error", b"").await;
            }
            DownloadMode::Reset => {}
            DownloadMode::Stream { chunk, interval_ms } => {
                let total: u64 = p
                    .split("bytes=")
                    .nth(1)
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(1_000_000);
                stream_bytes(&mut sock, total, chunk, interval_ms).await;
            }
        },
        ("POST", p) if p.starts_with("/up") => match upload {
            UploadMode::Reset => {}
            UploadMode::Accept => {
                let received = drain_body(&mut sock, leftover).await;
                respond(&mut sock, "200 OK", received.to_string().as_bytes()).await;
            }
        },
        _ => {
            respond(&mut sock, "404 Not Found", b"").await;
        }
    }
}

async fn read_head(sock: &mut TcpStream) -> Option<(String, Vec<u8>)> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let read = tokio::time::timeout(Duration::from_secs(2), sock.read(&mut buf))
            .await
            .ok()?
            .ok()?;
        if read == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..read]);
        if let Some(pos) = find(&data, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&data[..pos]).to_string();
            return Some((head, data[pos + 4..].to_vec()));
        }
        if data.len() > 64 * 1024 {
            return None;
        }
    }
}

async fn respond(sock: &mut TcpStream, status: &str, body: &[u8]) {
    let header = format!(
        "HTTP/1.1 {status}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
        body.len()
    );
    let _ = sock.write_all(header.as_bytes()).await;
    let _ = sock.write_all(body).await;
    let _ = sock.flush().await;
}

async fn stream_bytes(sock: &mut TcpStream, total: u64, chunk: usize, interval_ms: u64) {
    let header = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/octet-stream\r\ncontent-length: {total}\r\nconnection: close\r\n\r\n"
    );
    if sock.write_all(header.as_bytes()).await.is_err() {
        return;
    }

    let buf = vec![0xA5u8; chunk];
    let mut sent: u64 = 0;
    while sent < total {
        let take = chunk.min((total - sent) as usize);
        // A write failure means the client cancelled the stream; that is the
        // expected exit for deadline-bounded downloads.
        if sock.write_all(&buf[..take]).await.is_err() {
            return;
        }
        sent += take as u64;
        tokio::time::sleep(Duration::from_millis(interval_ms)).await;
    }
}

/// Consume a request body (chunked or until EOF), returning a byte count.
/// The exerciser discards the data; only the count goes into the ack.
async fn drain_body(sock: &mut TcpStream, leftover: Vec<u8>) -> usize {
    const TERMINATOR: &[u8] = b"\r\n0\r\n\r\n";

    let mut total = leftover.len();
    let mut tail = leftover;
    tail = tail.split_off(tail.len().saturating_sub(TERMINATOR.len()));
    if tail.ends_with(TERMINATOR) {
        return total;
    }

    let mut buf = [0u8; 16 * 1024];
    loop {
        let read = match tokio::time::timeout(Duration::from_secs(2), sock.read(&mut buf)).await {
            Ok(Ok(0)) | Err(_) => break,
            Ok(Ok(read)) => read,
            Ok(Err(_)) => break,
        };
        total += read;
        tail.extend_from_slice(&buf[..read]);
        tail = tail.split_off(tail.len().saturating_sub(TERMINATOR.len()));
        if tail.ends_with(TERMINATOR) {
            break;
        }
    }
    total
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
