//! Certificate lifecycle for a single allow-listed domain.
//!
//! # Responsibilities
//! - Serve the current certificate to TLS handshakes for the configured domain
//! - Load a cached certificate at startup
//! - Obtain a new certificate when none is cached or expiry is near
//!
//! # Design Decisions
//! - Only the configured domain is ever served or requested
//! - Handshakes for the domain fail until a certificate is installed
//! - Failed acquisitions are retried on a fixed interval, not in a tight loop

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};

use rustls::sign::CertifiedKey;

use crate::acme::challenge::ChallengeStore;
use crate::acme::client::AcmeClient;
use crate::acme::storage::{CertificateCache, IssuedCertificate};
use crate::acme::AcmeError;
use crate::config::TlsConfig;
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::net::tls::CertificateProvider;

const CHECK_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);
const RETRY_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug)]
struct Installed {
    key: Arc<CertifiedKey>,
    expires_at: SystemTime,
}

/// ACME-backed [`CertificateProvider`] for one domain.
#[derive(Debug)]
pub struct AcmeManager {
    domain: String,
    directory_url: String,
    contact_email: Option<String>,
    renew_before: Duration,
    cache: CertificateCache,
    challenges: ChallengeStore,
    installed: RwLock<Option<Installed>>,
}

impl AcmeManager {
    /// Create a manager for `config.domain`, opening (and creating) the cache directory.
    pub fn new(config: &TlsConfig, challenges: ChallengeStore) -> Result<Self, AcmeError> {
        let domain = config.domain.clone().ok_or(AcmeError::MissingDomain)?;
        let cache_dir = config.resolved_cache_dir().ok_or(AcmeError::NoCacheDir)?;
        let cache = CertificateCache::open(cache_dir)?;
        tracing::info!(domain = %domain, cache_dir = ?cache.dir(), "Certificate cache ready");

        Ok(Self {
            domain: domain.to_ascii_lowercase(),
            directory_url: config.directory_url.clone(),
            contact_email: config.contact_email.clone(),
            renew_before: Duration::from_secs(u64::from(config.renew_before_days) * 24 * 60 * 60),
            cache,
            challenges,
            installed: RwLock::new(None),
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn challenges(&self) -> &ChallengeStore {
        &self.challenges
    }

    /// Install the cached certificate if there is a usable one. Returns whether one was installed.
    pub async fn load_cached(&self) -> Result<bool, AcmeError> {
        let Some(issued) = self.cache.load_certificate(&self.domain).await? else {
            return Ok(false);
        };
        match self.install(&issued) {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::warn!(domain = %self.domain, error = %e, "Ignoring unusable cached certificate");
                Ok(false)
            }
        }
    }

    fn install(&self, issued: &IssuedCertificate) -> Result<(), AcmeError> {
        let key = Arc::new(issued.certified_key()?);
        let expires_at = issued.expires_at()?;
        *self.installed.write().unwrap_or_else(PoisonError::into_inner) = Some(Installed { key, expires_at });
        tracing::info!(domain = %self.domain, expires_at = ?expires_at, "Installed certificate");
        Ok(())
    }

    /// Whether a new certificate should be obtained at `now`.
    pub fn needs_renewal(&self, now: SystemTime) -> bool {
        match &*self.installed.read().unwrap_or_else(PoisonError::into_inner) {
            None => true,
            Some(installed) => installed
                .expires_at
                .duration_since(now)
                .map_or(true, |left| left <= self.renew_before),
        }
    }

    /// Run an ACME order, then persist and install the result.
    pub async fn obtain(&self) -> Result<(), AcmeError> {
        tracing::info!(domain = %self.domain, directory = %self.directory_url, "Requesting certificate");
        let client = AcmeClient::connect(
            &self.directory_url,
            self.contact_email.as_deref(),
            &self.cache,
            self.challenges.clone(),
        )
        .await?;
        let issued = client.issue(&self.domain).await?;
        self.cache.store_certificate(&self.domain, &issued).await?;
        self.install(&issued)
    }

    /// Keep the certificate fresh until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: ShutdownSignal) {
        loop {
            let wait = if self.needs_renewal(SystemTime::now()) {
                match self.obtain().await {
                    Ok(()) => CHECK_INTERVAL,
                    Err(e) => {
                        tracing::error!(domain = %self.domain, error = %e, "Certificate acquisition failed");
                        RETRY_INTERVAL
                    }
                }
            } else {
                CHECK_INTERVAL
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.wait() => {
                    tracing::info!("Certificate manager received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

impl CertificateProvider for AcmeManager {
    fn certificate_for(&self, server_name: Option<&str>) -> Option<Arc<CertifiedKey>> {
        let name = server_name?;
        if !name.eq_ignore_ascii_case(&self.domain) {
            return None;
        }
        self.installed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|installed| installed.key.clone())
    }
}
