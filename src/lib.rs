//! HTTP/HTTPS relay library.
//!
//! Accepts inbound requests, re-issues them against one configured upstream,
//! follows the upstream's redirect chain and relays the final response.

pub mod acme;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod relay;

pub use config::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use relay::{ForwardingError, InboundRequest, Relayer, UpstreamResponse};
