//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use range_relay::config::RelayConfig;
use range_relay::http::HttpServer;
use range_relay::lifecycle::Shutdown;

/// Request head as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl CapturedRequest {
    /// Value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response a mock backend writes back.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status_line: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub chunked: bool,
}

impl MockReply {
    pub fn new(status_line: &str, body: &str) -> Self {
        Self {
            status_line: status_line.to_string(),
            headers: Vec::new(),
            body: body.to_string(),
            chunked: false,
        }
    }

    /// Frame the body with `Transfer-Encoding: chunked` instead of a length.
    pub fn chunked(mut self) -> Self {
        self.chunked = true;
        self
    }

    pub fn redirect(location: &str) -> Self {
        Self::new("302 Found", "").header("Location", location)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    fn render(&self) -> String {
        let mut out = format!("HTTP/1.1 {}\r\n", self.status_line);
        for (name, value) in &self.headers {
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
        if self.chunked {
            out.push_str("Transfer-Encoding: chunked\r\nConnection: close\r\n\r\n");
            if !self.body.is_empty() {
                out.push_str(&format!("{:x}\r\n{}\r\n", self.body.len(), self.body));
            }
            out.push_str("0\r\n\r\n");
        } else {
            out.push_str(&format!(
                "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                self.body.len(),
                self.body
            ));
        }
        out
    }
}

/// A running mock backend and the requests it has received.
pub struct MockBackend {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl MockBackend {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_programmable_backend<F>(reply: F) -> MockBackend
where
    F: Fn(&CapturedRequest) -> MockReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let reply = Arc::new(reply);

    let captured = requests.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let reply = reply.clone();
            let captured = captured.clone();
            tokio::spawn(async move {
                let Some(request) = read_head(&mut socket).await else {
                    return;
                };
                let response = reply(&request);
                captured.lock().unwrap().push(request);
                let _ = socket.write_all(response.render().as_bytes()).await;
                let _ = socket.shutdown().await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            });
        }
    });

    MockBackend { addr, requests }
}

async fn read_head(socket: &mut TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf);
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers = lines
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect();

    Some(CapturedRequest {
        method,
        path,
        headers,
    })
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A relay server running on an ephemeral port. Stops when dropped.
pub struct RunningRelay {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl RunningRelay {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for RunningRelay {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Relay config pointing at `hub` with short timeouts.
pub fn relay_config(hub: &MockBackend) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.base_url = format!("http://{}", hub.addr);
    config.upstream.namespace = "acme/clips".into();
    config.timeouts.connect_secs = 2;
    config.timeouts.resolve_secs = 5;
    config.timeouts.relay_secs = 5;
    config.timeouts.request_secs = 10;
    config
}

pub async fn start_relay(config: RelayConfig) -> RunningRelay {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let rx = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    RunningRelay { addr, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
