//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use fragment_gateway::config::parse_config;
use fragment_gateway::{GatewayServer, Shutdown};

/// Read a whole request (head and body) off a socket so the connection can
/// be closed cleanly.
async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let read_more = |buf: &Vec<u8>| -> bool {
        let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            return true;
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
        let body = &buf[head_end + 4..];
        if head.contains("transfer-encoding: chunked") {
            return !body.ends_with(b"0\r\n\r\n");
        }
        let length = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        body.len() < length
    };

    while read_more(&buf) {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Start a mock origin that always returns the same response.
pub async fn start_mock_backend(content_type: &'static str, body: &'static str) -> SocketAddr {
    start_programmable_backend(move |_request| async move { (200, content_type, body.to_string()) })
        .await
}

/// Start a programmable mock origin. The handler receives the raw request
/// and returns `(status, content type, body)`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, &'static str, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let request = read_request(&mut socket).await;
                        let (status, content_type, body) = f(request).await;
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text(status),
                            content_type,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start an origin that streams an HTML document as `chunks` chunks, one
/// every `interval`, on its first connection. The receiver yields how many
/// chunks were written before the connection failed (`chunks` if all were).
pub async fn start_streaming_backend(
    chunks: usize,
    interval: Duration,
) -> (SocketAddr, oneshot::Receiver<usize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        read_request(&mut socket).await;

        let head = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nTransfer-Encoding: chunked\r\n\r\n";
        let mut written = 0;
        if socket.write_all(head.as_bytes()).await.is_ok() {
            while written < chunks {
                let data = if written == 0 {
                    "<html><head></head><body>".to_string()
                } else {
                    format!("<p>{written}</p>")
                };
                let frame = format!("{:x}\r\n{}\r\n", data.len(), data);
                if socket.write_all(frame.as_bytes()).await.is_err() || socket.flush().await.is_err() {
                    break;
                }
                written += 1;
                tokio::time::sleep(interval).await;
            }
            if written == chunks {
                let _ = socket.write_all(b"0\r\n\r\n").await;
            }
        }
        let _ = tx.send(written);
    });

    (addr, rx)
}

/// Start the gateway from TOML configuration on an ephemeral port.
pub async fn start_gateway(config: &str) -> (SocketAddr, Shutdown) {
    let settings = parse_config(config).unwrap();
    let server = GatewayServer::from_settings(&settings).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    (addr, shutdown)
}
