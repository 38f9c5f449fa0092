//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4) and echo it on the response
//! - Record the client address in `X-Forwarded-For`
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - An inbound `X-Request-ID` is kept rather than replaced

use std::net::IpAddr;

use axum::http::{HeaderValue, Request};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Generates a fresh UUID v4 for requests that arrive without an ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// Append the client IP to `X-Forwarded-For`, keeping any prior hops.
pub fn append_forwarded_for<B>(request: &mut Request<B>, client: IpAddr) {
    let headers = request.headers_mut();
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) if !prior.trim().is_empty() => format!("{}, {}", prior, client),
        _ => client.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_uuids() {
        let request = Request::new(());
        let id = MakeRequestUuid.make_request_id(&request).unwrap();
        let text = id.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(text).is_ok());
    }

    #[test]
    fn forwarded_for_appends_hop() {
        let mut request = Request::new(());
        append_forwarded_for(&mut request, "10.0.0.1".parse().unwrap());
        assert_eq!(request.headers()[X_FORWARDED_FOR], "10.0.0.1");

        append_forwarded_for(&mut request, "10.0.0.2".parse().unwrap());
        assert_eq!(request.headers()[X_FORWARDED_FOR], "10.0.0.1, 10.0.0.2");
    }
}
