//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Emit one access-log record per request (method, path, status, duration)
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via `RUST_LOG`

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;
use crate::http::request::X_REQUEST_ID;
use crate::observability::metrics;

const DEFAULT_FILTER: &str = "fulcrum=info,tower_http=info";

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

/// Access-log middleware.
pub async fn access_log(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let response = next.run(request).await;
    let status = response.status().as_u16();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status,
        duration = ?start.elapsed(),
        "Request completed"
    );
    metrics::record_request(method.as_str(), status, start);

    response
}
