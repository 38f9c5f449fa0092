//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (JSON/TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, backend URL parsing)
//!     → FulcrumConfig (validated, immutable)
//!     → consumed once at startup to build the server pool
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the backend set is fixed for the process lifetime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Any invalid backend entry is fatal: the process never serves with a bad pool

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BalancingStrategy, FulcrumConfig, HealthCheckConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, RetryConfig, TimeoutConfig,
};
