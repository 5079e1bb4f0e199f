//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use relay_proxy::lifecycle::{self, Shutdown, StartupError};
use relay_proxy::RelayConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// One request as seen by a mock backend.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Recorded {
    #[allow(dead_code)]
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

/// Requests received by a mock backend, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Recorded>>>);

#[allow(dead_code)]
impl CallLog {
    pub fn push(&self, recorded: Recorded) {
        self.0.lock().unwrap().push(recorded);
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

/// Serve `app` on an ephemeral loopback port.
pub async fn start_backend(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// A loopback port that was free a moment ago.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Relay configuration targeting `target_url` with a plain listener only.
pub fn relay_config(target_url: &str) -> (RelayConfig, u16) {
    let port = free_port();
    let mut config = RelayConfig::default();
    config.target_url = target_url.to_string();
    config.listener.bind_host = "127.0.0.1".into();
    config.listener.http_port = Some(port);
    config.listener.https_port = None;
    config.timeouts.request_secs = Some(5);
    (config, port)
}

/// A running relay and the handle that stops it.
pub struct RunningRelay {
    pub shutdown: Shutdown,
    pub task: JoinHandle<Result<(), StartupError>>,
}

/// Start the relay and wait until `port` accepts connections.
pub async fn start_relay(config: RelayConfig, port: u16) -> RunningRelay {
    let shutdown = Shutdown::new();
    let relay_shutdown = shutdown.clone();
    let task = tokio::spawn(async move { lifecycle::serve(&config, &relay_shutdown).await });
    wait_for_port(port).await;
    RunningRelay { shutdown, task }
}

/// Poll until something listens on `port`.
pub async fn wait_for_port(port: u16) {
    for _ in 0..100 {
        if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("nothing listening on port {port}");
}

/// HTTP client that never follows redirects itself.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

/// Backend that answers every connection with the same raw bytes, then closes.
pub async fn start_raw_backend(response: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_head(&mut socket).await;
                let _ = socket.write_all(response).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Send `target` exactly as written in a GET request line and return the raw reply.
#[allow(dead_code)]
pub async fn raw_get(port: u16, target: &str) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let request = format!("GET {target} HTTP/1.1\r\nHost: 127.0.0.1:{port}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut reply = Vec::new();
    let _ = stream.read_to_end(&mut reply).await;
    String::from_utf8_lossy(&reply).into_owned()
}

async fn read_head(socket: &mut TcpStream) {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
}
