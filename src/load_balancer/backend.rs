//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server
//! - Track liveness (alive/dead)
//! - Track active connections (for Least Connections LB)
//! - Own the forwarding capability bound to the backend address
//!
//! # Design Decisions
//! - A request stays counted until its response body has been streamed out
//!   or dropped, not just until the response head arrives

use std::fmt;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::{Request, Response};
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use url::Url;

use crate::load_balancer::forward::{Forward, ForwardError};
use crate::observability::metrics;

/// A single backend server.
pub struct Backend {
    /// The address of the backend.
    url: Url,
    /// Liveness flag, flipped by health checks and forwarding failures.
    alive: AtomicBool,
    /// Number of currently active connections.
    active_connections: AtomicUsize,
    /// Forwarder built once at startup and shared by all requests.
    forwarder: Arc<dyn Forward>,
}

impl Backend {
    /// Create a new backend. Backends start alive.
    pub fn new(url: Url, forwarder: Arc<dyn Forward>) -> Self {
        Self {
            url,
            alive: AtomicBool::new(true),
            active_connections: AtomicUsize::new(0),
            forwarder,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Release);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Get the current number of active connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Increment active connection count.
    pub fn inc_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement active connection count. Saturates at zero.
    pub fn dec_connections(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Count a new in-flight request; the returned guard releases it on drop.
    pub fn connection_guard(self: &Arc<Self>) -> BackendConnectionGuard {
        self.inc_connections();
        metrics::record_active_connections(self.url.as_str(), self.active_connections());
        BackendConnectionGuard {
            backend: self.clone(),
        }
    }

    /// Forward a request through this backend's forwarder.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ForwardError> {
        self.forwarder.forward(request).await
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("url", &self.url.as_str())
            .field("alive", &self.is_alive())
            .field("active_connections", &self.active_connections())
            .finish_non_exhaustive()
    }
}

/// A RAII guard that manages the active connection count.
#[derive(Debug)]
pub struct BackendConnectionGuard {
    pub backend: Arc<Backend>,
}

impl BackendConnectionGuard {
    /// Move the guard into the response body so the connection is released
    /// when the body finishes, fails, or is dropped.
    pub fn hold_until_complete(self, response: Response<Body>) -> Response<Body> {
        let (parts, inner) = response.into_parts();
        Response::from_parts(
            parts,
            Body::new(GuardedBody {
                inner,
                guard: Some(self),
            }),
        )
    }
}

impl Deref for BackendConnectionGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for BackendConnectionGuard {
    fn drop(&mut self) {
        self.backend.dec_connections();
        metrics::record_active_connections(
            self.backend.url.as_str(),
            self.backend.active_connections(),
        );
    }
}

/// Response body that owns the connection guard of the backend producing it.
struct GuardedBody {
    inner: Body,
    guard: Option<BackendConnectionGuard>,
}

impl HttpBody for GuardedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let frame = Pin::new(&mut this.inner).poll_frame(cx);
        if matches!(frame, Poll::Ready(None) | Poll::Ready(Some(Err(_)))) {
            this.guard.take();
        }
        frame
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
