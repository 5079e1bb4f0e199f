//! ACME automatic certificate management.
//!
//! # Data Flow
//! ```text
//! startup
//!     → manager.rs (open cache dir, load cached cert)
//!     → renewal task: no cert / expiring soon
//!         → client.rs (account, order, HTTP-01)
//!         → challenge.rs (token served by the plain listener on :80)
//!         → storage.rs (persist chain + key)
//!         → manager.rs installs cert → TLS handshakes pick it up
//! ```
//!
//! # Design Decisions
//! - HTTP-01 only; the plain listener is forced to port 80 whenever a domain is set
//! - One domain per process, acting as the host allow-list
//! - The cache directory is the only persistent state

pub mod challenge;
pub mod client;
pub mod manager;
pub mod storage;

use std::path::PathBuf;

use thiserror::Error;

use crate::net::tls::TlsError;

pub use challenge::ChallengeStore;
pub use manager::AcmeManager;
pub use storage::{CertificateCache, IssuedCertificate};

/// Errors from certificate acquisition and caching.
#[derive(Debug, Error)]
pub enum AcmeError {
    #[error("no domain configured for certificate acquisition")]
    MissingDomain,

    #[error("no certificate cache directory configured and $HOME is not set")]
    NoCacheDir,

    #[error("certificate cache I/O on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ACME protocol error: {0}")]
    Protocol(#[from] instant_acme::Error),

    #[error("authorization is {0}, cannot continue")]
    Authorization(String),

    #[error("ACME server offered no HTTP-01 challenge")]
    NoHttpChallenge,

    #[error("order ended in state {0} instead of ready")]
    OrderNotReady(String),

    #[error("timed out waiting for the ACME order")]
    Timeout,

    #[error("CSR generation failed: {0}")]
    Csr(#[from] rcgen::Error),

    #[error("certificate parse error: {0}")]
    Certificate(String),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("account credentials: {0}")]
    Json(#[from] serde_json::Error),
}
