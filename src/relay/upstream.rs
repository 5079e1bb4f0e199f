//! Upstream dispatch.
//!
//! # Responsibilities
//! - Send one outbound attempt and hand back the raw reply
//! - Never follow redirects or decode bodies on its own
//! - Keep the reply's body unread until the relayer decides it is terminal
//!
//! The reply owns the upstream connection; dropping it (on a redirect or an
//! early error) releases the connection.

use std::future::Future;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, Response, StatusCode};
use bytes::Bytes;
use hyper::body::Incoming;
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::schema::TimeoutConfig;
use crate::relay::error::BoxError;
use crate::relay::exchange::OutboundAttempt;

/// Failure to get a reply for one attempt.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The attempt could not be turned into a request.
    #[error("invalid request: {0}")]
    Build(#[source] BoxError),
    /// The request was sent but no response arrived.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
}

/// Reply to one attempt, with the body not yet read.
pub trait UpstreamReply: Send {
    fn status(&self) -> StatusCode;

    fn headers(&self) -> &HeaderMap;

    /// Read the remaining body to completion.
    fn into_body(self) -> impl Future<Output = Result<Bytes, BoxError>> + Send;
}

/// Something attempts can be dispatched to.
pub trait Upstream: Send + Sync + 'static {
    type Reply: UpstreamReply;

    fn dispatch(
        &self,
        attempt: OutboundAttempt,
    ) -> impl Future<Output = Result<Self::Reply, DispatchError>> + Send;
}

/// HTTP(S) upstream backed by a pooled hyper client.
///
/// The attempt URI is sent exactly as built; nothing re-encodes or
/// normalizes its path or query on the way out.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    request_timeout: Option<Duration>,
}

impl HttpUpstream {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(timeouts.connect_secs.map(Duration::from_secs));

        let client = Client::builder(TokioExecutor::new()).build(HttpsConnector::new_with_connector(http));

        Self {
            client,
            request_timeout: timeouts.request_secs.map(Duration::from_secs),
        }
    }
}

impl Upstream for HttpUpstream {
    type Reply = HttpReply;

    async fn dispatch(&self, attempt: OutboundAttempt) -> Result<HttpReply, DispatchError> {
        let mut request = Request::builder()
            .method(attempt.method)
            .uri(attempt.url)
            .body(Body::from(attempt.body))
            .map_err(|e| DispatchError::Build(Box::new(e)))?;
        *request.headers_mut() = attempt.headers;

        // One deadline covers the response head and the body read.
        let deadline = self.request_timeout.map(|timeout| Instant::now() + timeout);
        let pending = self.client.request(request);
        let response = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, pending)
                .await
                .map_err(|elapsed| DispatchError::Transport(Box::new(elapsed)))?,
            None => pending.await,
        }
        .map_err(|e| DispatchError::Transport(Box::new(e)))?;

        Ok(HttpReply { response, deadline })
    }
}

/// Reply from [`HttpUpstream`], body still on the wire.
#[derive(Debug)]
pub struct HttpReply {
    response: Response<Incoming>,
    deadline: Option<Instant>,
}

impl UpstreamReply for HttpReply {
    fn status(&self) -> StatusCode {
        self.response.status()
    }

    fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    async fn into_body(self) -> Result<Bytes, BoxError> {
        let read = axum::body::to_bytes(Body::new(self.response.into_body()), usize::MAX);
        let body = match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, read).await?,
            None => read.await,
        };
        Ok(body?)
    }
}
