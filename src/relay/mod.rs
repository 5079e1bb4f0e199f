//! Request relaying subsystem.
//!
//! # Data Flow
//! ```text
//! InboundRequest (body buffered once)
//!     → forwarder.rs (hop loop, query override, Location resolution)
//!     → upstream.rs (one attempt per hop, redirects never auto-followed)
//!     → UpstreamResponse | ForwardingError
//! ```
//!
//! # Design Decisions
//! - No state survives an exchange; the relayer itself is immutable
//! - Redirect chains are bounded by `redirects.max_hops`
//! - Failures are terminal for their exchange and never retried

pub mod error;
pub mod exchange;
pub mod forwarder;
pub mod upstream;

pub use error::ForwardingError;
pub use exchange::{InboundRequest, OutboundAttempt, UpstreamResponse};
pub use forwarder::Relayer;
pub use upstream::{DispatchError, HttpReply, HttpUpstream, Upstream, UpstreamReply};
