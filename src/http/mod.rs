//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, host extraction)
//!     → routing table snapshot resolves the host
//!     → backend group forwards the request
//!     → response.rs (fixed error responses)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{request_host, MakeRequestUuid, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
