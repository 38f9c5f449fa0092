//! Fulcrum: a reverse-proxy load balancer.
//!
//! Inbound requests are dispatched to one of a fixed set of backends chosen by
//! round-robin or least-connections. Backends that fail while forwarding are
//! marked dead immediately and the request is retried elsewhere; a background
//! health checker probes every backend periodically and revives the ones that
//! accept TCP connections again.

// Core subsystems
pub mod config;
pub mod http;

// Traffic management
pub mod health;
pub mod load_balancer;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::FulcrumConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{Backend, ServerPool};
