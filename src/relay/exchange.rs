//! Per-exchange data: what came in, what goes out on each hop, what comes back.

use axum::http::{HeaderMap, Method, StatusCode, Uri};
use bytes::Bytes;

/// An inbound request with its body fully buffered.
///
/// The body is read exactly once when the exchange starts and reused verbatim
/// on every hop.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Raw path component as received, always starting with `/`.
    pub path: String,
    /// Raw query string without the leading `?`. `None` when absent or empty.
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    /// Build an inbound request from its parts. An empty query is treated as absent.
    pub fn new(
        method: Method,
        path: impl Into<String>,
        query: Option<&str>,
        headers: HeaderMap,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            query: query.filter(|q| !q.is_empty()).map(str::to_owned),
            headers,
            body: body.into(),
        }
    }
}

/// One outbound attempt within an exchange.
#[derive(Debug, Clone)]
pub struct OutboundAttempt {
    pub method: Method,
    /// Absolute URI, sent as-is.
    pub url: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// The terminal (non-3xx) upstream response relayed to the caller.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}
