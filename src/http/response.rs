//! Response handling and transformation.
//!
//! # Responsibilities
//! - Map dispatch failures to HTTP status codes and short text bodies
//!
//! # Design Decisions
//! - No backend available and exhausted retries both surface as 503
//! - Only a body over the size limit is 413; any other unreadable body is 400
//! - Backend responses themselves are never rewritten

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::http::dispatcher::DispatchError;

impl DispatchError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::NoBackendAvailable | DispatchError::RetriesExhausted { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            DispatchError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            DispatchError::Body(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let body = match &self {
            DispatchError::NoBackendAvailable => "Service not available",
            DispatchError::RetriesExhausted { .. } => "All backends failed",
            DispatchError::BodyTooLarge { .. } => "Request body too large",
            DispatchError::Body(_) => "Invalid request body",
        };
        (self.status_code(), body).into_response()
    }
}
