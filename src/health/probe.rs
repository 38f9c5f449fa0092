//! Reachability probes.
//!
//! # Design Decisions
//! - A probe only answers "is the address accepting TCP connections right now"
//! - Every probe carries its own deadline; nothing here blocks indefinitely
//! - The probe connection is dropped as soon as it is established

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time;
use url::Url;

/// Capability to check whether a backend address is reachable.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn is_reachable(&self, url: &Url, timeout: Duration) -> bool;
}

/// Probe that opens (and immediately closes) a TCP connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProbe;

/// `host:port` for a backend URL, using the scheme's default port if absent.
pub fn socket_target(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let port = url.port_or_known_default()?;
    Some(format!("{}:{}", host, port))
}

#[async_trait]
impl Probe for TcpProbe {
    async fn is_reachable(&self, url: &Url, timeout: Duration) -> bool {
        let Some(target) = socket_target(url) else {
            tracing::warn!(backend = %url, "Backend address has no host/port");
            return false;
        };

        match time::timeout(timeout, TcpStream::connect(&target)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(backend = %url, error = %e, "Site unreachable");
                false
            }
            Err(_) => {
                tracing::warn!(backend = %url, timeout = ?timeout, "Site unreachable: probe timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn socket_target_defaults_port() {
        let url: Url = "http://example.com/api".parse().unwrap();
        assert_eq!(socket_target(&url).unwrap(), "example.com:80");

        let url: Url = "http://127.0.0.1:8081".parse().unwrap();
        assert_eq!(socket_target(&url).unwrap(), "127.0.0.1:8081");
    }

    #[tokio::test]
    async fn listening_address_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url: Url = format!("http://{}", listener.local_addr().unwrap()).parse().unwrap();

        assert!(TcpProbe.is_reachable(&url, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url: Url = format!("http://{}", addr).parse().unwrap();

        assert!(!TcpProbe.is_reachable(&url, Duration::from_secs(2)).await);
    }
}
