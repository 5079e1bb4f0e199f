//! Request intake.
//!
//! # Responsibilities
//! - Buffer the whole inbound body once, before the first hop
//! - Split the URI into path and raw query for the relayer
//!
//! # Design Decisions
//! - No streaming: the same bytes must be replayable on every redirect hop
//! - Body size is unbounded unless `limits.max_body_bytes` is configured

use axum::body::Body;
use axum::http::Request;

use crate::relay::{ForwardingError, InboundRequest};

/// Read an inbound request, buffering its body up to `limit` bytes.
pub async fn read_inbound(
    request: Request<Body>,
    limit: Option<usize>,
) -> Result<InboundRequest, ForwardingError> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, limit.unwrap_or(usize::MAX))
        .await
        .map_err(|e| ForwardingError::BodyRead(Box::new(e)))?;

    Ok(InboundRequest::new(
        parts.method,
        parts.uri.path(),
        parts.uri.query(),
        parts.headers,
        body,
    ))
}
