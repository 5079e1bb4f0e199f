//! Response relaying.
//!
//! # Responsibilities
//! - Turn the terminal upstream response into the caller's response
//! - Map exchange failures to caller-visible status codes
//!
//! # Design Decisions
//! - Transport failures become 502 Bad Gateway, other pre-commit failures 500
//! - A body read failure keeps the upstream status and headers but aborts
//!   the body stream, so the caller never sees a truncated body as complete

use std::io;

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::stream;

use crate::relay::{ForwardingError, UpstreamResponse};

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl IntoResponse for ForwardingError {
    fn into_response(self) -> Response {
        match self {
            ForwardingError::ResponseRead { status, headers, .. } => {
                let aborted = stream::once(async {
                    // Let the head go out before the body fails.
                    tokio::task::yield_now().await;
                    Err::<Bytes, _>(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "upstream response body could not be read",
                    ))
                });
                let mut response = Response::new(Body::from_stream(aborted));
                *response.status_mut() = status;
                *response.headers_mut() = headers;
                response
            }
            other => (other.status_code(), other.client_message()).into_response(),
        }
    }
}
