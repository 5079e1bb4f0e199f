//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router that sends every request to the relayer
//! - Mount the ACME challenge responder on the plain listener when needed
//! - Wire up middleware (tracing)
//! - Log and count every exchange outcome

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::acme::challenge::{self, ChallengeStore};
use crate::config::RelayConfig;
use crate::http::request::read_inbound;
use crate::observability::metrics;
use crate::relay::{HttpUpstream, Relayer};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub relayer: Arc<Relayer<HttpUpstream>>,
    pub max_body_bytes: Option<usize>,
}

/// HTTP front end for the relay.
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: &RelayConfig) -> Self {
        let upstream = HttpUpstream::new(&config.timeouts);
        let relayer = Relayer::new(upstream, config.target_url.clone(), config.redirects.max_hops);

        tracing::info!(
            target_url = %relayer.base_url(),
            max_hops = relayer.max_hops(),
            "Relayer configured"
        );

        Self {
            state: AppState {
                relayer: Arc::new(relayer),
                max_body_bytes: config.limits.max_body_bytes,
            },
        }
    }

    /// Router relaying every method and path.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(relay_handler)
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Relay router with pending ACME challenges answered first.
    pub fn router_with_challenges(&self, challenges: ChallengeStore) -> Router {
        challenge::router(challenges).merge(self.router())
    }
}

/// Forward one exchange to the upstream and relay the outcome.
async fn relay_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::debug!(method = %method, path = %path, "Relaying request");

    let outcome = match read_inbound(request, state.max_body_bytes).await {
        Ok(inbound) => state.relayer.forward(&inbound).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(response) => {
            metrics::record_request(method.as_str(), response.status.as_u16(), start);
            response.into_response()
        }
        Err(err) => {
            tracing::error!(
                method = %method,
                path = %path,
                kind = err.kind(),
                error = %err,
                "Exchange failed"
            );
            metrics::record_error(err.kind());
            metrics::record_request(method.as_str(), err.status_code().as_u16(), start);
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn unreachable_config() -> RelayConfig {
        let mut config = RelayConfig::default();
        // Port 1 on loopback refuses connections.
        config.target_url = "http://127.0.0.1:1".into();
        config
    }

    #[tokio::test]
    async fn unreachable_upstream_yields_bad_gateway() {
        let server = HttpServer::new(&unreachable_config());

        let response = server
            .router()
            .oneshot(Request::builder().uri("/anything?x=1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_before_forwarding() {
        let mut config = unreachable_config();
        config.limits.max_body_bytes = Some(4);
        let server = HttpServer::new(&config);

        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/upload")
                    .body(Body::from("far too long"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Failed to read request body");
    }

    #[tokio::test]
    async fn challenge_route_takes_precedence_over_relay() {
        let server = HttpServer::new(&unreachable_config());
        let challenges = ChallengeStore::new();
        challenges.insert("abc", "abc.key");

        let app = server.router_with_challenges(challenges);
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/.well-known/acme-challenge/abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/other").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
