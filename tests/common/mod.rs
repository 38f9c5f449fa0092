//! Shared utilities for integration and load testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fulcrum::{FulcrumConfig, HttpServer, ServerPool, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Read until the end of the request head so the client never sees a reset
/// while it is still writing.
async fn read_request_head(socket: &mut TcpStream) {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    return;
                }
            }
        }
    }
}

async fn respond(socket: &mut TcpStream, status: u16, body: &str) {
    let reason = match status {
        200 => "OK",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "OK",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Start a simple mock backend that returns a fixed response.
/// Aborting the returned handle stops the backend from accepting.
pub async fn start_mock_backend(response: &'static str) -> (SocketAddr, JoinHandle<()>) {
    start_programmable_backend(move || async move { (200, response.to_string()) }).await
}

/// Start a mock backend whose status and body are computed per request.
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(f: F) -> (SocketAddr, JoinHandle<()>)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    serve_on(listener, f)
}

/// Start a mock backend on a specific address.
#[allow(dead_code)]
pub async fn start_mock_backend_at(addr: SocketAddr, response: &'static str) -> JoinHandle<()> {
    let listener = TcpListener::bind(addr).await.unwrap();
    serve_on(listener, move || async move { (200, response.to_string()) }).1
}

fn serve_on<F, Fut>(listener: TcpListener, f: F) -> (SocketAddr, JoinHandle<()>)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    let handle = tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                read_request_head(&mut socket).await;
                let (status, body) = f().await;
                respond(&mut socket, status, &body).await;
            });
        }
    });

    (addr, handle)
}

/// Start a backend that sends its response head and the first half of the
/// body, then holds the rest back until `release` is notified.
#[allow(dead_code)]
pub async fn start_stalled_backend(body: &'static str) -> (SocketAddr, Arc<Notify>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let release = Arc::new(Notify::new());

    let gate = release.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let gate = gate.clone();
            tokio::spawn(async move {
                read_request_head(&mut socket).await;
                let (head, tail) = body.split_at(body.len() / 2);
                let start = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    head
                );
                let _ = socket.write_all(start.as_bytes()).await;
                gate.notified().await;
                let _ = socket.write_all(tail.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, release)
}

/// Wait until no backend in the pool has a request in flight.
#[allow(dead_code)]
pub async fn wait_until_idle(pool: &ServerPool) {
    for _ in 0..100 {
        if pool.backends().iter().all(|b| b.active_connections() == 0) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Config with the given backends and active health checks off.
pub fn config_for(backends: &[SocketAddr]) -> FulcrumConfig {
    let mut config = FulcrumConfig::default();
    config.backends = backends.iter().map(|a| format!("http://{}", a)).collect();
    config.health_check.enabled = false;
    config
}

/// Start the load balancer on an ephemeral port.
pub async fn start_proxy(config: FulcrumConfig) -> (SocketAddr, Shutdown, Arc<ServerPool>) {
    let server = HttpServer::new(config).expect("valid config");
    let pool = server.pool();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown, pool)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
