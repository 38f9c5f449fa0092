//! Per-request dispatch with bounded retries.
//!
//! # Responsibilities
//! - Select a peer with the configured strategy
//! - Count the request against the chosen backend until its response body
//!   has been fully sent
//! - On forwarding failure: mark the backend dead, retry on another peer
//! - Give up with 503 when no peer is left or the retry bound is reached

use std::error::Error as StdError;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{request::Parts, Request, Response};
use http_body_util::LengthLimitError;
use thiserror::Error;

use crate::health::passive::report_forward_failure;
use crate::load_balancer::ServerPool;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;

/// Why a request could not be served by any backend.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no backend available")]
    NoBackendAvailable,

    #[error("all backends failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Body(#[source] axum::Error),
}

pub struct Dispatcher {
    pool: Arc<ServerPool>,
    retry: RetryPolicy,
    max_body_bytes: usize,
}

impl Dispatcher {
    pub fn new(pool: Arc<ServerPool>, retry: RetryPolicy, max_body_bytes: usize) -> Self {
        Self {
            pool,
            retry,
            max_body_bytes,
        }
    }

    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.pool
    }

    /// Forward `request` to a backend, retrying on other backends after
    /// transport failures.
    pub async fn dispatch(&self, request: Request<Body>) -> Result<Response<Body>, DispatchError> {
        let Some(mut peer) = self.pool.next_peer() else {
            tracing::warn!(path = %request.uri().path(), "No backend available");
            return Err(DispatchError::NoBackendAvailable);
        };

        // Buffered once so every attempt can replay the same body.
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| {
                if is_length_limit(&e) {
                    DispatchError::BodyTooLarge {
                        limit: self.max_body_bytes,
                    }
                } else {
                    DispatchError::Body(e)
                }
            })?;

        let mut retries = 0u32;
        loop {
            let guard = peer.connection_guard();
            let result = guard.forward(attempt(&parts, &body)).await;
            let error = match result {
                Ok(response) => return Ok(guard.hold_until_complete(response)),
                Err(error) => error,
            };
            drop(guard);
            report_forward_failure(&self.pool, &peer, &error);

            if !self.retry.should_retry(retries) {
                break;
            }
            let Some(next) = self.pool.next_peer() else {
                break;
            };

            retries += 1;
            tracing::info!(
                backend = %next.url(),
                attempt = retries + 1,
                max_attempts = self.retry.max_attempts(),
                "Retrying request"
            );
            metrics::record_retry(next.url().as_str());
            peer = next;
        }

        tracing::warn!(path = %parts.uri.path(), attempts = retries + 1, "All backends failed");
        Err(DispatchError::RetriesExhausted {
            attempts: retries + 1,
        })
    }
}

fn is_length_limit(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

/// Rebuild the request for one forwarding attempt.
fn attempt(parts: &Parts, body: &Bytes) -> Request<Body> {
    let mut request = Request::new(Body::from(body.clone()));
    *request.method_mut() = parts.method.clone();
    *request.uri_mut() = parts.uri.clone();
    *request.version_mut() = parts.version;
    *request.headers_mut() = parts.headers.clone();
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BalancingStrategy;
    use crate::load_balancer::{Backend, Forward, ForwardError};
    use async_trait::async_trait;
    use axum::http::{Method, StatusCode};
    use hyper::body::{Body as HttpBody, Frame};
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::task::{Context, Poll};

    /// Forwarder that either always fails or answers with its name, and
    /// records what it saw.
    struct MockForwarder {
        name: String,
        fail: bool,
        calls: AtomicUsize,
        bodies: Mutex<Vec<Bytes>>,
    }

    impl MockForwarder {
        fn new(name: &str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                fail,
                calls: AtomicUsize::new(0),
                bodies: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Forward for MockForwarder {
        async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ForwardError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let body = axum::body::to_bytes(request.into_body(), usize::MAX).await.unwrap();
            self.bodies.lock().unwrap().push(body);
            if self.fail {
                Err(ForwardError::Unreachable {
                    backend: self.name.clone(),
                    source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into(),
                })
            } else {
                Ok(Response::new(Body::from(self.name.clone())))
            }
        }
    }

    fn dispatcher(
        strategy: BalancingStrategy,
        backends: &[(&str, bool)],
        max_retries: u32,
    ) -> (Dispatcher, Vec<Arc<MockForwarder>>) {
        let mut pool = ServerPool::new(strategy);
        let mut forwarders = Vec::new();
        for (addr, fail) in backends {
            let forwarder = MockForwarder::new(addr, *fail);
            pool.add_backend(Arc::new(Backend::new(addr.parse().unwrap(), forwarder.clone())));
            forwarders.push(forwarder);
        }
        let dispatcher = Dispatcher::new(Arc::new(pool), RetryPolicy::new(max_retries), 1024);
        (dispatcher, forwarders)
    }

    fn request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/submit")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn forwards_to_selected_backend() {
        let (d, f) = dispatcher(
            BalancingStrategy::LeastConnections,
            &[("http://a:1", false), ("http://b:2", false)],
            3,
        );

        let response = d.dispatch(request("hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "http://a:1");
        assert_eq!(f[0].calls(), 1);
        assert_eq!(f[1].calls(), 0);
        assert_eq!(d.pool().backends()[0].active_connections(), 0);
    }

    #[tokio::test]
    async fn failure_marks_dead_and_retries_elsewhere() {
        let (d, f) = dispatcher(
            BalancingStrategy::LeastConnections,
            &[("http://a:1", true), ("http://b:2", false), ("http://c:3", false)],
            3,
        );

        let response = d.dispatch(request("payload")).await.unwrap();
        assert_eq!(body_text(response).await, "http://b:2");

        let pool = d.pool();
        assert!(!pool.backends()[0].is_alive());
        assert!(pool.backends()[1].is_alive());
        assert_eq!(f[0].calls(), 1);
        assert_eq!(f[1].calls(), 1);
        assert_eq!(f[2].calls(), 0);

        // The retried attempt carried the same body.
        assert_eq!(f[1].bodies.lock().unwrap()[0], Bytes::from("payload"));

        for backend in pool.backends() {
            assert_eq!(backend.active_connections(), 0);
        }
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let backends: Vec<(String, bool)> =
            (1..=6).map(|i| (format!("http://h{}:{}", i, i), true)).collect();
        let refs: Vec<(&str, bool)> = backends.iter().map(|(a, f)| (a.as_str(), *f)).collect();
        let (d, f) = dispatcher(BalancingStrategy::RoundRobin, &refs, 3);

        let err = d.dispatch(request("x")).await.unwrap_err();
        assert!(matches!(err, DispatchError::RetriesExhausted { attempts: 4 }));

        // One initial attempt plus three retries, each on a different backend.
        let total: usize = f.iter().map(|f| f.calls()).sum();
        assert_eq!(total, 4);
        assert!(f.iter().all(|f| f.calls() <= 1));
        assert_eq!(d.pool().backends().iter().filter(|b| !b.is_alive()).count(), 4);
        assert!(d.pool().backends().iter().all(|b| b.active_connections() == 0));
    }

    #[tokio::test]
    async fn stops_early_when_pool_runs_dry() {
        let (d, f) = dispatcher(
            BalancingStrategy::RoundRobin,
            &[("http://a:1", true), ("http://b:2", true)],
            3,
        );

        let err = d.dispatch(request("x")).await.unwrap_err();
        assert!(matches!(err, DispatchError::RetriesExhausted { attempts: 2 }));
        assert_eq!(f[0].calls() + f[1].calls(), 2);

        // Everything is dead now: the next request fails before forwarding.
        let err = d.dispatch(request("x")).await.unwrap_err();
        assert!(matches!(err, DispatchError::NoBackendAvailable));
        assert_eq!(f[0].calls() + f[1].calls(), 2);
    }

    #[tokio::test]
    async fn retries_disabled_fails_on_first_error() {
        let (d, f) = dispatcher(
            BalancingStrategy::LeastConnections,
            &[("http://a:1", true), ("http://b:2", false)],
            0,
        );

        let err = d.dispatch(request("x")).await.unwrap_err();
        assert!(matches!(err, DispatchError::RetriesExhausted { attempts: 1 }));
        assert_eq!(f[1].calls(), 0);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let (d, f) = dispatcher(BalancingStrategy::RoundRobin, &[("http://a:1", false)], 3);
        let big = Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .body(Body::from(vec![b'x'; 4096]))
            .unwrap();

        let err = d.dispatch(big).await.unwrap_err();
        assert!(matches!(err, DispatchError::BodyTooLarge { limit: 1024 }));
        assert_eq!(f[0].calls(), 0);
    }

    /// Body that never yields a frame, like a long download still streaming.
    struct PendingBody;

    impl HttpBody for PendingBody {
        type Data = Bytes;
        type Error = axum::Error;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
            Poll::Pending
        }
    }

    /// Body that fails on the first read, like a client dropping mid-upload.
    struct BrokenBody;

    impl HttpBody for BrokenBody {
        type Data = Bytes;
        type Error = std::io::Error;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, std::io::Error>>> {
            Poll::Ready(Some(Err(std::io::ErrorKind::ConnectionReset.into())))
        }
    }

    struct StreamingForwarder;

    #[async_trait]
    impl Forward for StreamingForwarder {
        async fn forward(&self, _request: Request<Body>) -> Result<Response<Body>, ForwardError> {
            Ok(Response::new(Body::new(PendingBody)))
        }
    }

    #[tokio::test]
    async fn streaming_response_stays_counted_until_dropped() {
        let mut pool = ServerPool::new(BalancingStrategy::LeastConnections);
        for addr in ["http://a:1", "http://b:2"] {
            pool.add_backend(Arc::new(Backend::new(
                addr.parse().unwrap(),
                Arc::new(StreamingForwarder),
            )));
        }
        let d = Dispatcher::new(Arc::new(pool), RetryPolicy::new(3), 1024);

        let response = d.dispatch(request("x")).await.unwrap();
        let a = &d.pool().backends()[0];
        assert_eq!(a.active_connections(), 1);

        // The busy backend is no longer the least loaded one.
        let next = d.pool().next_peer().unwrap();
        assert_eq!(next.url().as_str(), "http://b:2/");

        drop(response);
        assert_eq!(a.active_connections(), 0);
    }

    #[tokio::test]
    async fn unreadable_body_is_not_reported_as_too_large() {
        let (d, f) = dispatcher(BalancingStrategy::RoundRobin, &[("http://a:1", false)], 3);
        let broken = Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .body(Body::new(BrokenBody))
            .unwrap();

        let err = d.dispatch(broken).await.unwrap_err();
        assert!(matches!(err, DispatchError::Body(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(f[0].calls(), 0);
    }
}
