//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend fails:
//!     → health::passive marks the backend dead
//!     → retries.rs decides whether another backend may be tried
//!     → dispatcher selects a fresh peer, or answers 503
//! ```
//!
//! # Design Decisions
//! - Retries are bounded so a failing pool cannot cause a retry storm
//! - Every external call has a deadline (probe timeout, connect timeout, request timeout)

pub mod retries;

pub use retries::RetryPolicy;
