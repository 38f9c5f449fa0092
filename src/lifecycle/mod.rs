//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build client and pool → Start health checker → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop health checker → Stop accepting → Drain in-flight → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then pool, then listeners
//! - Fail fast: any startup error is fatal

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
