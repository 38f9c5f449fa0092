//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, per-request access log)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows into every access-log record
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
