//! HTTP-01 challenge responses.
//!
//! The ACME server validates a domain by fetching
//! `http://<domain>/.well-known/acme-challenge/<token>` on port 80. Pending
//! tokens live here while an order is in flight; the plain listener mounts
//! [`router`] in front of the relay.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

/// Route the challenge responder is mounted at.
pub const CHALLENGE_ROUTE: &str = "/.well-known/acme-challenge/{token}";

/// Pending token → key authorization pairs.
#[derive(Debug, Clone, Default)]
pub struct ChallengeStore {
    tokens: Arc<RwLock<HashMap<String, String>>>,
}

impl ChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: &str, key_authorization: &str) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.to_string(), key_authorization.to_string());
    }

    pub fn remove(&self, token: &str) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token);
    }

    pub fn get(&self, token: &str) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
    }
}

/// Router answering challenge requests from `store`.
pub fn router(store: ChallengeStore) -> Router {
    Router::new()
        .route(CHALLENGE_ROUTE, get(serve_challenge))
        .with_state(store)
}

async fn serve_challenge(State(store): State<ChallengeStore>, Path(token): Path<String>) -> Response {
    match store.get(&token) {
        Some(key_authorization) => {
            tracing::info!(token = %token, "Answered ACME challenge");
            key_authorization.into_response()
        }
        None => {
            tracing::warn!(token = %token, "Unknown ACME challenge token");
            (StatusCode::NOT_FOUND, "unknown challenge token").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn fetch(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn serves_pending_tokens_only() {
        let store = ChallengeStore::new();
        store.insert("tok123", "tok123.thumbprint");
        let app = router(store.clone());

        let (status, body) = fetch(app.clone(), "/.well-known/acme-challenge/tok123").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "tok123.thumbprint");

        let (status, _) = fetch(app.clone(), "/.well-known/acme-challenge/other").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        store.remove("tok123");
        assert_eq!(store.get("tok123"), None);
        let (status, _) = fetch(app, "/.well-known/acme-challenge/tok123").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
