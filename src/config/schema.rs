//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the load
//! balancer. All types derive Serde traits for deserialization from config files.
//! Only `lb_port` and `backends` are required in practice; everything else
//! falls back to defaults.

use serde::{Deserialize, Serialize};

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FulcrumConfig {
    /// Port the load balancer listens on.
    pub lb_port: u16,

    /// Ordered list of backend URLs (e.g., "http://127.0.0.1:8081").
    pub backends: Vec<String>,

    /// Peer-selection mode used for every request.
    pub strategy: BalancingStrategy,

    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for FulcrumConfig {
    fn default() -> Self {
        Self {
            lb_port: 8080,
            backends: Vec::new(),
            strategy: BalancingStrategy::default(),
            listener: ListenerConfig::default(),
            health_check: HealthCheckConfig::default(),
            retries: RetryConfig::default(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl FulcrumConfig {
    /// Socket address string the listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listener.bind_host, self.lb_port)
    }
}

/// Peer-selection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BalancingStrategy {
    /// Rotate through alive backends in pool order.
    RoundRobin,
    /// Pick the alive backend with the fewest in-flight requests.
    #[default]
    LeastConnections,
}

impl std::fmt::Display for BalancingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BalancingStrategy::RoundRobin => write!(f, "round_robin"),
            BalancingStrategy::LeastConnections => write!(f, "least_connections"),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host/interface to bind (combined with `lb_port`).
    pub bind_host: String,

    /// Largest request body buffered for replay on retries.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// TCP probe timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 20,
            timeout_secs: 2,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum re-dispatches after the first failed attempt.
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable output for development.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Address the metrics endpoint binds to.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
