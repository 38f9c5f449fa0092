//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler on every path
//! - Wire up middleware (request ID, access log, request timeout)
//! - Bind server to listener
//! - Spawn the active health checker
//! - Hand every request to the dispatcher

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::timeout::TimeoutLayer;

use crate::config::{ConfigError, FulcrumConfig};
use crate::health::HealthChecker;
use crate::http::dispatcher::Dispatcher;
use crate::http::request::{append_forwarded_for, propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::startup;
use crate::load_balancer::ServerPool;
use crate::observability::logging::access_log;
use crate::resilience::RetryPolicy;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    config: FulcrumConfig,
    pool: Arc<ServerPool>,
}

impl HttpServer {
    /// Build the server pool from configuration and create the server.
    /// Fails if any configured backend is invalid.
    pub fn new(config: FulcrumConfig) -> Result<Self, ConfigError> {
        let client = startup::build_client(&config.timeouts);
        let pool = Arc::new(startup::build_pool(&config, client)?);
        Ok(Self::with_pool(config, pool))
    }

    /// Create a server around an already built pool.
    pub fn with_pool(config: FulcrumConfig, pool: Arc<ServerPool>) -> Self {
        let dispatcher = Dispatcher::new(
            pool.clone(),
            RetryPolicy::from(&config.retries),
            config.listener.max_body_bytes,
        );
        let state = AppState {
            dispatcher: Arc::new(dispatcher),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            pool,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &FulcrumConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::from_fn(access_log))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            strategy = %self.pool.strategy(),
            backends = self.pool.len(),
            "HTTP server starting"
        );

        if self.config.health_check.enabled {
            let checker = HealthChecker::new(self.pool.clone(), &self.config.health_check);
            tokio::spawn(checker.run(shutdown.resubscribe()));
        } else {
            tracing::info!("Active health checks disabled");
        }

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Router with all layers, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn pool(&self) -> Arc<ServerPool> {
        self.pool.clone()
    }
}

/// Main proxy handler.
async fn proxy_handler(State(state): State<AppState>, mut request: Request<Body>) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    if let Some(ip) = client {
        append_forwarded_for(&mut request, ip);
    }

    tracing::debug!(
        method = %request.method(),
        path = %request.uri().path(),
        "Proxying request"
    );

    match state.dispatcher.dispatch(request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}
