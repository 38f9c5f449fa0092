//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, X-Forwarded-For)
//!     → dispatcher.rs (peer selection, forwarding, bounded retries)
//!     → response.rs (map dispatch failures to status codes)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::{DispatchError, Dispatcher};
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
