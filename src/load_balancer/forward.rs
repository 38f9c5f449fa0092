//! Request forwarding to a single backend.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the backend address
//! - Strip hop-by-hop headers before forwarding
//! - Surface transport failures as a distinct error value
//!
//! # Design Decisions
//! - One forwarder per backend, built at startup; all share one pooled client
//! - Backend responses (including 5xx) are passed through untouched
//! - Only transport failures are errors; they drive liveness and retries

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, Request, Response, Uri, Version};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use thiserror::Error;
use url::Url;

/// Headers that only apply to a single transport hop.
const HOP_BY_HOP: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure to get a response out of a backend.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("backend {backend} unreachable: {source}")]
    Unreachable {
        backend: String,
        #[source]
        source: BoxError,
    },

    #[error("cannot build upstream URI for {backend}: {reason}")]
    InvalidUri { backend: String, reason: String },
}

/// Capability to send a request to one backend and get its response.
#[async_trait]
pub trait Forward: Send + Sync {
    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ForwardError>;
}

/// HTTP/1.1 forwarder bound to a single backend URL.
#[derive(Clone)]
pub struct HttpForwarder {
    target: Url,
    client: Client<HttpConnector, Body>,
}

impl HttpForwarder {
    pub fn new(target: Url, client: Client<HttpConnector, Body>) -> Self {
        Self { target, client }
    }

    /// Map an inbound URI onto the backend: base path joined with the request
    /// path, query string kept.
    pub fn upstream_uri(&self, inbound: &Uri) -> Result<Uri, ForwardError> {
        let base = self.target.path().trim_end_matches('/');
        let path = inbound.path();
        let mut rewritten = format!("{}://{}", self.target.scheme(), authority(&self.target));
        rewritten.push_str(base);
        if path.starts_with('/') {
            rewritten.push_str(path);
        } else {
            rewritten.push('/');
            rewritten.push_str(path);
        }
        if let Some(query) = inbound.query() {
            rewritten.push('?');
            rewritten.push_str(query);
        }

        rewritten.parse::<Uri>().map_err(|e| ForwardError::InvalidUri {
            backend: self.target.to_string(),
            reason: e.to_string(),
        })
    }
}

fn authority(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    }
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in &named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

#[async_trait]
impl Forward for HttpForwarder {
    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ForwardError> {
        let (mut parts, body) = request.into_parts();
        parts.uri = self.upstream_uri(&parts.uri)?;
        // Upstream connections are plain HTTP/1.1 whatever the client spoke.
        parts.version = Version::HTTP_11;
        strip_hop_by_hop(&mut parts.headers);

        let response = self
            .client
            .request(Request::from_parts(parts, body))
            .await
            .map_err(|source| ForwardError::Unreachable {
                backend: self.target.to_string(),
                source: source.into(),
            })?;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}
