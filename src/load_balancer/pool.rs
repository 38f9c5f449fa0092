//! Server pool management.
//!
//! # Responsibilities
//! - Own the ordered set of backends (fixed after startup)
//! - Apply load balancing algorithms to select backends
//! - Update backend liveness by address

use std::sync::Arc;

use url::Url;

use crate::config::BalancingStrategy;
use crate::load_balancer::{
    backend::Backend, least_conn::LeastConnections, round_robin::RoundRobin, LoadBalancer,
};

/// Ordered collection of backends plus the selection state shared by all requests.
#[derive(Debug)]
pub struct ServerPool {
    backends: Vec<Arc<Backend>>,
    round_robin: RoundRobin,
    least_conn: LeastConnections,
    strategy: BalancingStrategy,
}

impl ServerPool {
    /// Create an empty pool using the given peer-selection mode.
    pub fn new(strategy: BalancingStrategy) -> Self {
        Self {
            backends: Vec::new(),
            round_robin: RoundRobin::new(),
            least_conn: LeastConnections::new(),
            strategy,
        }
    }

    /// Append a backend. Only used while building the pool at startup.
    pub fn add_backend(&mut self, backend: Arc<Backend>) {
        self.backends.push(backend);
    }

    pub fn strategy(&self) -> BalancingStrategy {
        self.strategy
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Next alive backend in rotation order.
    pub fn get_next_peer(&self) -> Option<Arc<Backend>> {
        self.round_robin.next_server(&self.backends)
    }

    /// Alive backend with the fewest in-flight requests.
    pub fn get_next_peer_least_connections(&self) -> Option<Arc<Backend>> {
        self.least_conn.next_server(&self.backends)
    }

    /// Select a backend with the configured strategy.
    pub fn next_peer(&self) -> Option<Arc<Backend>> {
        let peer = match self.strategy {
            BalancingStrategy::RoundRobin => self.get_next_peer(),
            BalancingStrategy::LeastConnections => self.get_next_peer_least_connections(),
        };

        if peer.is_none() {
            tracing::debug!(
                strategy = %self.strategy,
                backend_count = self.backends.len(),
                "No alive backends in pool"
            );
        }
        peer
    }

    /// Set the liveness of the backend with this exact address.
    /// Unknown addresses are ignored.
    pub fn mark_backend_status(&self, url: &Url, alive: bool) {
        if let Some(backend) = self.backends.iter().find(|b| b.url() == url) {
            backend.set_alive(alive);
        }
    }

    /// Look up a backend by exact address.
    pub fn get_backend(&self, url: &Url) -> Option<Arc<Backend>> {
        self.backends.iter().find(|b| b.url() == url).cloned()
    }
}
