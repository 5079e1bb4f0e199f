//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the relayer from the validated configuration
//! - Prepare certificate material (ACME manager or static files)
//! - Bind the plain and TLS listeners and run them side by side
//! - Start the certificate renewal task once port 80 is being served
//!
//! # Design Decisions
//! - Fail fast: any bind or certificate-directory error is fatal
//! - Listeners run independently; the first one to fail ends `serve`
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinSet;

use crate::acme::{AcmeError, AcmeManager, ChallengeStore};
use crate::config::{CertificateSource, RelayConfig};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::net::listener::{self, ListenerError};
use crate::net::tls::{install_crypto_provider, rustls_config, CertificateProvider, StaticCertificate, TlsError};

/// Fatal conditions that end the process.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Acme(#[from] AcmeError),

    #[error("listener task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Certificate material backing the TLS listener.
#[derive(Debug, Clone)]
pub enum Certificates {
    Acme(Arc<AcmeManager>),
    Static(Arc<StaticCertificate>),
}

impl Certificates {
    pub fn provider(&self) -> Arc<dyn CertificateProvider> {
        match self {
            Certificates::Acme(manager) => manager.clone(),
            Certificates::Static(certificate) => certificate.clone(),
        }
    }
}

/// Load or set up certificate material when the TLS listener is enabled.
pub async fn prepare_certificates(config: &RelayConfig) -> Result<Option<Certificates>, StartupError> {
    if !config.tls_enabled() {
        return Ok(None);
    }
    match config.tls.source() {
        Some(CertificateSource::Acme { .. }) => {
            let manager = AcmeManager::new(&config.tls, ChallengeStore::new())?;
            if !manager.load_cached().await? {
                tracing::info!(domain = %manager.domain(), "No cached certificate, one will be requested");
            }
            Ok(Some(Certificates::Acme(Arc::new(manager))))
        }
        Some(CertificateSource::Static { cert_path, key_path }) => {
            let certificate = StaticCertificate::from_pem_files(cert_path, key_path).await?;
            Ok(Some(Certificates::Static(Arc::new(certificate))))
        }
        None => Ok(None),
    }
}

/// Run every configured listener until shutdown or the first fatal error.
pub async fn serve(config: &RelayConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    install_crypto_provider();

    let server = HttpServer::new(config);
    let certificates = prepare_certificates(config).await?;
    let mut listeners = JoinSet::new();

    if let Some(address) = config.listener.http_address() {
        let tcp = listener::bind(&address).await?;
        let app = match &certificates {
            Some(Certificates::Acme(manager)) => server.router_with_challenges(manager.challenges().clone()),
            _ => server.router(),
        };
        tracing::info!(address = %address, target_url = %config.target_url, "Starting HTTP relay");
        listeners.spawn(listener::serve_plain(tcp, app, shutdown.subscribe()));
    }

    match (&certificates, config.listener.https_address()) {
        (Some(certificates), Some(address)) => {
            let tcp = listener::bind(&address).await?;
            let tls = rustls_config(certificates.provider())?;
            tracing::info!(address = %address, target_url = %config.target_url, "Starting HTTPS relay");
            listeners.spawn(listener::serve_tls(tcp, tls, server.router(), shutdown.subscribe()));

            if let Certificates::Acme(manager) = certificates {
                tokio::spawn(manager.clone().run(shutdown.subscribe()));
            }
        }
        _ => tracing::info!("No certificate source configured. Running HTTP server only (if enabled)."),
    }

    while let Some(joined) = listeners.join_next().await {
        joined??;
    }
    Ok(())
}
