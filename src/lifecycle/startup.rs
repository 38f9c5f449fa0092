//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the shared upstream HTTP client
//! - Turn validated configuration into a server pool
//!
//! # Design Decisions
//! - Fail fast: an unparsable backend aborts startup
//! - One client (and connection pool) shared by every backend forwarder

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::validation::parse_backends;
use crate::config::{ConfigError, FulcrumConfig, TimeoutConfig};
use crate::load_balancer::{Backend, HttpForwarder, ServerPool};

/// Upstream client with the configured connect timeout (0 disables it).
pub fn build_client(timeouts: &TimeoutConfig) -> Client<HttpConnector, Body> {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(
        (timeouts.connect_secs > 0).then(|| Duration::from_secs(timeouts.connect_secs)),
    );
    Client::builder(TokioExecutor::new()).build(connector)
}

/// Create one backend per configured address, in configuration order.
pub fn build_pool(
    config: &FulcrumConfig,
    client: Client<HttpConnector, Body>,
) -> Result<ServerPool, ConfigError> {
    let urls = parse_backends(&config.backends).map_err(ConfigError::Validation)?;

    let mut pool = ServerPool::new(config.strategy);
    for url in urls {
        let forwarder = Arc::new(HttpForwarder::new(url.clone(), client.clone()));
        tracing::info!(backend = %url, "Configured server");
        pool.add_backend(Arc::new(Backend::new(url, forwarder)));
    }

    tracing::info!(
        backends = pool.len(),
        strategy = %pool.strategy(),
        "Server pool ready"
    );
    Ok(pool)
}
