//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → probe.rs (TCP connect with timeout) for each backend, sequentially
//!     → Backend::set_alive
//!
//! Passive health checks (passive.rs):
//!     Forwarding failure observed by the dispatcher
//!     → ServerPool::mark_backend_status(addr, false)
//! ```
//!
//! # Design Decisions
//! - Active and passive checks are complementary
//! - Liveness is a single flag per backend; the latest observation wins
//! - A failing probe is never fatal to the checker

pub mod active;
pub mod passive;
pub mod probe;

pub use active::HealthChecker;
pub use probe::{Probe, TcpProbe};
