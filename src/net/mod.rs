//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, one task per connection)
//!     → tls.rs (optional TLS handshake, certificate chosen by SNI)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Plain and TLS listeners run independently; either failing is fatal
//! - TLS is optional and handled transparently
//! - Certificates come from a provider, never from the listener itself

pub mod listener;
pub mod tls;

pub use listener::ListenerError;
pub use tls::{CertificateProvider, StaticCertificate, TlsError};
