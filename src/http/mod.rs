//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, tracing layer, ACME challenge route)
//!     → request.rs (buffer body, split path and query)
//!     → relay (hop loop against the upstream)
//!     → headers.rs (verbatim multi-value copies)
//!     → response.rs (relay status/headers/body, or map the failure)
//!     → Send to client
//! ```

pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use server::{AppState, HttpServer};
