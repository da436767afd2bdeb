//! Minimal keep-alive HTTP/1.1 server for integration tests.
//!
//! Serves a fixed route table. Each connection answers requests one after
//! another until the client closes it or a route ends the connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// How the server answers one path.
#[derive(Debug, Clone)]
pub enum Route {
    /// 200 with Content-Length and the body; connection kept open.
    Body(Vec<u8>),
    /// 200 with `Connection: close`, then the server closes.
    BodyThenClose(Vec<u8>),
    /// `103 Early Hints`, then 200 with Content-Length; connection kept open.
    Interim(Vec<u8>),
    /// Announce `declared` bytes but send all of `sent`; connection kept open.
    Overlong { declared: usize, sent: Vec<u8> },
    /// Given status with a Content-Length body; connection kept open.
    Status(u16, Vec<u8>),
    /// Announce `declared` bytes, send `sent`, then close.
    Truncated { declared: usize, sent: Vec<u8> },
    /// 200 without Content-Length; body then close.
    NoLength(Vec<u8>),
    /// Send part of a status line, then close.
    CloseBeforeHeaders,
    /// Read the request and never answer.
    Stall,
}

#[derive(Debug, Default)]
pub struct ServerStats {
    pub accepted: AtomicUsize,
    pub requests: AtomicUsize,
    pub request_heads: Mutex<Vec<String>>,
}

pub struct KeepAliveServer {
    pub port: u16,
    pub stats: Arc<ServerStats>,
}

impl KeepAliveServer {
    /// Bind on loopback and serve `routes` until the runtime shuts down.
    pub async fn start(routes: HashMap<String, Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().unwrap().port();
        let stats = Arc::new(ServerStats::default());
        let routes = Arc::new(routes);
        let accept_stats = Arc::clone(&stats);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_stats.accepted.fetch_add(1, Ordering::SeqCst);
                let routes = Arc::clone(&routes);
                let stats = Arc::clone(&accept_stats);
                tokio::spawn(handle(stream, routes, stats));
            }
        });
        Self { port, stats }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    pub fn accepted(&self) -> usize {
        self.stats.accepted.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.stats.requests.load(Ordering::SeqCst)
    }

    pub fn request_heads(&self) -> Vec<String> {
        self.stats.request_heads.lock().unwrap().clone()
    }
}

async fn handle(mut stream: TcpStream, routes: Arc<HashMap<String, Route>>, stats: Arc<ServerStats>) {
    let mut pending: Vec<u8> = Vec::new();
    loop {
        let head_end = loop {
            if let Some(pos) = pending.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            let mut tmp = [0u8; 4096];
            match stream.read(&mut tmp).await {
                Ok(0) | Err(_) => return,
                Ok(n) => pending.extend_from_slice(&tmp[..n]),
            }
        };
        let head = String::from_utf8_lossy(&pending[..head_end]).into_owned();
        pending.drain(..head_end);
        stats.requests.fetch_add(1, Ordering::SeqCst);
        stats.request_heads.lock().unwrap().push(head.clone());

        let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
        let route = routes
            .get(&path)
            .cloned()
            .unwrap_or(Route::Status(404, b"not found".to_vec()));

        let keep_open = match route {
            Route::Body(body) => {
                respond(&mut stream, 200, &[("Content-Length", body.len().to_string())], &body).await
            }
            Route::BodyThenClose(body) => {
                respond(
                    &mut stream,
                    200,
                    &[
                        ("Content-Length", body.len().to_string()),
                        ("Connection", "close".to_string()),
                    ],
                    &body,
                )
                .await;
                false
            }
            Route::Interim(body) => {
                let hints = b"HTTP/1.1 103 Early Hints\r\nLink: </style.css>; rel=preload\r\n\r\n";
                stream.write_all(hints).await.is_ok()
                    && respond(&mut stream, 200, &[("Content-Length", body.len().to_string())], &body).await
            }
            Route::Overlong { declared, sent } => {
                // One write so the surplus arrives in the same read as the body.
                let mut raw = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", declared).into_bytes();
                raw.extend_from_slice(&sent);
                stream.write_all(&raw).await.is_ok()
            }
            Route::Status(code, body) => {
                respond(&mut stream, code, &[("Content-Length", body.len().to_string())], &body).await
            }
            Route::Truncated { declared, sent } => {
                respond(&mut stream, 200, &[("Content-Length", declared.to_string())], &sent).await;
                false
            }
            Route::NoLength(body) => {
                respond(&mut stream, 200, &[], &body).await;
                false
            }
            Route::CloseBeforeHeaders => {
                let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Le").await;
                false
            }
            Route::Stall => {
                std::future::pending::<()>().await;
                false
            }
        };
        if !keep_open {
            let _ = stream.shutdown().await;
            return;
        }
    }
}

/// Write a response; returns false if the write failed.
async fn respond(stream: &mut TcpStream, code: u16, headers: &[(&str, String)], body: &[u8]) -> bool {
    let mut head = format!("HTTP/1.1 {} {}\r\n", code, reason(code));
    for (name, value) in headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes()).await.is_ok() && stream.write_all(body).await.is_ok()
}

fn reason(code: u16) -> &'static str {
    match code {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}
