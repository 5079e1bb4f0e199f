//! Forwarding error taxonomy.

use axum::http::{HeaderMap, StatusCode};
use thiserror::Error;

/// Boxed transport/body error from the upstream client.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Terminal failure of a single exchange.
///
/// Every variant ends the exchange it occurred in; none is retried.
#[derive(Debug, Error)]
pub enum ForwardingError {
    /// The inbound request body could not be buffered.
    #[error("failed to read request body: {0}")]
    BodyRead(#[source] BoxError),

    /// An outbound attempt could not be constructed (bad URL, method or header).
    #[error("failed to create request for {url}: {reason}")]
    RequestBuild { url: String, reason: String },

    /// The upstream could not be reached (connect, DNS, TLS, timeout).
    #[error("error forwarding request to {url}: {source}")]
    UpstreamUnreachable {
        url: String,
        #[source]
        source: BoxError,
    },

    /// A 3xx response had no usable `Location`, or the hop limit was exceeded.
    #[error("failed to handle redirect from {url}: {reason}")]
    RedirectResolution { url: String, reason: String },

    /// The terminal response body failed mid-read.
    ///
    /// Status and headers were already decided and are carried here so the
    /// caller still receives them; the body is not delivered.
    #[error("failed to read response body from {url}: {source}")]
    ResponseRead {
        url: String,
        status: StatusCode,
        headers: HeaderMap,
        #[source]
        source: BoxError,
    },
}

impl ForwardingError {
    /// Status code the caller observes for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UpstreamUnreachable { .. } => StatusCode::BAD_GATEWAY,
            Self::ResponseRead { status, .. } => *status,
            Self::BodyRead(_) | Self::RequestBuild { .. } | Self::RedirectResolution { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BodyRead(_) => "body_read",
            Self::RequestBuild { .. } => "request_build",
            Self::UpstreamUnreachable { .. } => "upstream_unreachable",
            Self::RedirectResolution { .. } => "redirect_resolution",
            Self::ResponseRead { .. } => "response_read",
        }
    }

    /// Plain-text body sent to the caller for failures that happen before
    /// anything was committed.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::BodyRead(_) => "Failed to read request body",
            Self::RequestBuild { .. } => "Failed to create request",
            Self::UpstreamUnreachable { .. } => "Error forwarding request",
            Self::RedirectResolution { .. } => "Failed to handle redirect",
            Self::ResponseRead { .. } => "",
        }
    }
}
