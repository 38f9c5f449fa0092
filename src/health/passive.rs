//! Passive health checking (failure detection).
//!
//! # Responsibilities
//! - Observe forwarding outcomes
//! - Mark a backend dead on the first transport failure
//!
//! # Design Decisions
//! - Only transport errors count as failures; any HTTP response (even 5xx) is not
//! - No threshold: one failure flips the backend, the next health check may revive it

use crate::load_balancer::{Backend, ForwardError, ServerPool};
use crate::observability::metrics;

/// Record a forwarding failure against `backend` and take it out of rotation.
pub fn report_forward_failure(pool: &ServerPool, backend: &Backend, error: &ForwardError) {
    tracing::warn!(backend = %backend.url(), error = %error, "Forwarding failed, marking backend down");
    pool.mark_backend_status(backend.url(), false);
    metrics::record_backend_health(backend.url().as_str(), false);
}
