//! Forward-and-follow-redirects loop.
//!
//! # Flow
//! ```text
//! current = base + path                  (raw concatenation, never normalized)
//! loop:
//!     attempt(method, current ?inbound_query, headers, body)
//!     → transport error        → UpstreamUnreachable (no retry)
//!     → 3xx + Location         → current = resolve(Location), next hop
//!     → 3xx, bad/no Location   → RedirectResolution
//!     → anything else          → read body, return
//! ```
//!
//! The inbound path and query travel upstream byte for byte. Only a
//! relative `Location` goes through RFC 3986 resolution.
//!
//! The inbound body is shared by reference count across hops, so every
//! attempt carries the exact same bytes.

use axum::http::header::LOCATION;
use axum::http::uri::PathAndQuery;
use axum::http::{HeaderMap, Uri};
use url::{Position, Url};

use crate::http::headers::{outbound_headers, relayed_headers};
use crate::observability::metrics;
use crate::relay::error::ForwardingError;
use crate::relay::exchange::{InboundRequest, OutboundAttempt, UpstreamResponse};
use crate::relay::upstream::{DispatchError, Upstream, UpstreamReply};

/// Relays inbound requests to one fixed upstream base URL.
#[derive(Debug)]
pub struct Relayer<U> {
    upstream: U,
    base_url: String,
    max_hops: u32,
}

impl<U: Upstream> Relayer<U> {
    /// Create a relayer. A trailing `/` on `base_url` is dropped so that
    /// joining with the inbound path never doubles it.
    pub fn new(upstream: U, base_url: impl Into<String>, max_hops: u32) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            upstream,
            base_url,
            max_hops,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn max_hops(&self) -> u32 {
        self.max_hops
    }

    /// Run one exchange to its terminal response.
    pub async fn forward(&self, inbound: &InboundRequest) -> Result<UpstreamResponse, ForwardingError> {
        let start = format!("{}{}", self.base_url, inbound.path);
        let mut current = Uri::try_from(start.as_str()).map_err(|e| ForwardingError::RequestBuild {
            url: start.clone(),
            reason: e.to_string(),
        })?;
        let mut hops = 0;

        loop {
            let attempt = build_attempt(inbound, &current)?;
            let url = attempt.url.clone();

            let reply = self.upstream.dispatch(attempt).await.map_err(|e| match e {
                DispatchError::Build(source) => ForwardingError::RequestBuild {
                    url: url.to_string(),
                    reason: source.to_string(),
                },
                DispatchError::Transport(source) => ForwardingError::UpstreamUnreachable {
                    url: url.to_string(),
                    source,
                },
            })?;

            let status = reply.status();
            if status.is_redirection() {
                let next = resolve_location(&url, reply.headers())?;
                drop(reply);

                if hops >= self.max_hops {
                    return Err(ForwardingError::RedirectResolution {
                        url: url.to_string(),
                        reason: format!("stopped after {} redirects", self.max_hops),
                    });
                }
                hops += 1;

                tracing::info!(from = %url, to = %next, status = status.as_u16(), hop = hops, "Redirecting");
                metrics::record_redirect();
                current = next;
                continue;
            }

            let headers = relayed_headers(reply.headers());
            return match reply.into_body().await {
                Ok(body) => {
                    tracing::debug!(url = %url, status = status.as_u16(), hops, bytes = body.len(), "Terminal response");
                    Ok(UpstreamResponse { status, headers, body })
                }
                Err(source) => Err(ForwardingError::ResponseRead {
                    url: url.to_string(),
                    status,
                    headers,
                    source,
                }),
            };
        }
    }
}

/// Build the attempt for `target`, forcing the raw inbound query onto it.
fn build_attempt(inbound: &InboundRequest, target: &Uri) -> Result<OutboundAttempt, ForwardingError> {
    let build_err = |reason: String| ForwardingError::RequestBuild {
        url: target.to_string(),
        reason,
    };

    let mut parts = target.clone().into_parts();
    let path = match parts.path_and_query.as_ref().map(PathAndQuery::path) {
        Some(path) if !path.is_empty() => path,
        _ => "/",
    };
    let path_and_query = match &inbound.query {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).map_err(|e| build_err(e.to_string()))?);
    let url = Uri::from_parts(parts).map_err(|e| build_err(e.to_string()))?;

    Ok(OutboundAttempt {
        method: inbound.method.clone(),
        url,
        headers: outbound_headers(&inbound.headers),
        body: inbound.body.clone(),
    })
}

/// Resolve a redirect's `Location` against the URI that produced it.
///
/// The result carries no query; the next attempt puts the inbound one back.
fn resolve_location(from: &Uri, headers: &HeaderMap) -> Result<Uri, ForwardingError> {
    let fail = |reason: String| ForwardingError::RedirectResolution {
        url: from.to_string(),
        reason,
    };
    let value = headers
        .get(LOCATION)
        .ok_or_else(|| fail("missing Location header".to_string()))?;
    let location = value
        .to_str()
        .map_err(|_| fail("Location header is not valid UTF-8".to_string()))?;
    let base = Url::parse(&from.to_string()).map_err(|e| fail(format!("unusable redirect base: {e}")))?;
    let next = base
        .join(location)
        .map_err(|e| fail(format!("invalid Location {location:?}: {e}")))?;
    Uri::try_from(&next[..Position::AfterPath]).map_err(|e| fail(format!("invalid Location {location:?}: {e}")))
}
