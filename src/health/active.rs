//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend, one at a time
//! - Flip backend liveness based on the probe result

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::probe::{Probe, TcpProbe};
use crate::load_balancer::ServerPool;
use crate::observability::metrics;

pub struct HealthChecker {
    pool: Arc<ServerPool>,
    probe: Arc<dyn Probe>,
    interval: Duration,
    timeout: Duration,
}

impl HealthChecker {
    pub fn new(pool: Arc<ServerPool>, config: &HealthCheckConfig) -> Self {
        Self::with_probe(pool, config, Arc::new(TcpProbe))
    }

    pub fn with_probe(pool: Arc<ServerPool>, config: &HealthCheckConfig, probe: Arc<dyn Probe>) -> Self {
        Self {
            pool,
            probe,
            interval: Duration::from_secs(config.interval_secs),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Run until the shutdown signal fires. The first check happens one
    /// interval after start; backends are presumed alive until then.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = ?self.interval,
            timeout = ?self.timeout,
            backends = self.pool.len(),
            "Health checker starting"
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracing::info!("Starting health check...");
                    self.check_all().await;
                    tracing::info!("Health check completed");
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health checker received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend once, sequentially.
    pub async fn check_all(&self) {
        for backend in self.pool.backends() {
            let alive = self.probe.is_reachable(backend.url(), self.timeout).await;
            backend.set_alive(alive);

            let status = if alive { "up" } else { "down" };
            tracing::info!(backend = %backend.url(), status, "Health check result");
            metrics::record_backend_health(backend.url().as_str(), alive);
        }
    }
}
