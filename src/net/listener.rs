//! TCP listeners and the serve loops on top of them.
//!
//! # Responsibilities
//! - Bind configured addresses, surfacing bind failures as fatal errors
//! - Serve a router over plain HTTP or TLS until shutdown
//! - Drain in-flight exchanges on shutdown
//!
//! Every accepted connection runs on its own task; there is no admission
//! control or connection cap.

use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::lifecycle::shutdown::ShutdownSignal;

/// How long TLS connections get to finish after shutdown is signalled.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    /// The serve loop stopped with an error.
    #[error("{listener} listener failed: {source}")]
    Serve {
        listener: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Bind a TCP listener on `address` (`host:port`).
pub async fn bind(address: &str) -> Result<TcpListener, ListenerError> {
    let bind_err = |source| ListenerError::Bind {
        address: address.to_string(),
        source,
    };
    let listener = TcpListener::bind(address).await.map_err(bind_err)?;
    let local_addr = listener.local_addr().map_err(bind_err)?;
    tracing::info!(address = %local_addr, "Listener bound");
    Ok(listener)
}

/// Serve `app` over plain HTTP until a shutdown signal arrives.
pub async fn serve_plain(
    listener: TcpListener,
    app: Router,
    mut shutdown: ShutdownSignal,
) -> Result<(), ListenerError> {
    let serve_err = |source| ListenerError::Serve {
        listener: "HTTP",
        source,
    };
    let addr = listener.local_addr().map_err(serve_err)?;
    tracing::info!(address = %addr, "HTTP server starting");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown.wait().await;
        })
        .await
        .map_err(serve_err)?;

    tracing::info!(address = %addr, "HTTP server stopped");
    Ok(())
}

/// Serve `app` over TLS until a shutdown signal arrives.
pub async fn serve_tls(
    listener: TcpListener,
    tls: RustlsConfig,
    app: Router,
    mut shutdown: ShutdownSignal,
) -> Result<(), ListenerError> {
    let serve_err = |source| ListenerError::Serve {
        listener: "HTTPS",
        source,
    };
    let std_listener = listener.into_std().map_err(serve_err)?;
    let addr = std_listener.local_addr().map_err(serve_err)?;
    tracing::info!(address = %addr, "HTTPS server starting");

    let handle = Handle::new();
    let drain = handle.clone();
    tokio::spawn(async move {
        shutdown.wait().await;
        drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
    });

    axum_server::from_tcp_rustls(std_listener, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .map_err(serve_err)?;

    tracing::info!(address = %addr, "HTTPS server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let first = bind("127.0.0.1:0").await.unwrap();
        let taken = first.local_addr().unwrap().to_string();

        match bind(&taken).await {
            Err(ListenerError::Bind { address, .. }) => assert_eq!(address, taken),
            other => panic!("expected bind error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_address_is_bind_error() {
        assert!(matches!(bind("not-an-address").await, Err(ListenerError::Bind { .. })));
    }
}
