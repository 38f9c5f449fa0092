//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → pool.rs (ServerPool, fixed set of backends)
//!     → Apply the configured algorithm:
//!         - round_robin.rs (rotate through alive backends)
//!         - least_conn.rs (pick alive backend with fewest connections)
//!     → backend.rs (connection guard, liveness)
//!     → forward.rs (send to the backend, surface transport errors)
//! ```
//!
//! # Design Decisions
//! - Algorithms are stateless apart from the rotation counter
//! - Dead backends are never selected; an all-dead pool yields nothing
//! - Per-field atomics only; no pool-wide lock

use std::sync::Arc;

pub mod backend;
pub mod forward;
pub mod least_conn;
pub mod pool;
pub mod round_robin;

pub use backend::{Backend, BackendConnectionGuard};
pub use forward::{Forward, ForwardError, HttpForwarder};
pub use pool::ServerPool;

/// A backend selection algorithm.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick an alive backend, or `None` if there is none.
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;
}
