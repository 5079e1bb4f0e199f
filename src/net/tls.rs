//! TLS configuration and certificate loading.
//!
//! The TLS listener never owns certificates itself. Its handshake
//! configuration asks a [`CertificateProvider`] for the certified key that
//! matches the client's SNI name, so ACME-issued and file-based certificates
//! plug in the same way.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::crypto::aws_lc_rs;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;
use thiserror::Error;

/// Errors while loading certificate material.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("malformed PEM: {0}")]
    Pem(#[source] io::Error),

    #[error("no certificates found in PEM input")]
    NoCertificates,

    #[error("no private key found in PEM input")]
    NoPrivateKey,

    #[error("unsupported private key: {0}")]
    Key(#[source] rustls::Error),

    #[error("TLS configuration error: {0}")]
    Config(#[from] rustls::Error),
}

/// Source of server certificates, keyed by requested domain.
pub trait CertificateProvider: fmt::Debug + Send + Sync + 'static {
    /// Certificate for the SNI `server_name`, if one is available.
    fn certificate_for(&self, server_name: Option<&str>) -> Option<Arc<CertifiedKey>>;
}

/// Adapts a [`CertificateProvider`] to rustls' handshake hook.
#[derive(Debug)]
struct ProviderResolver {
    provider: Arc<dyn CertificateProvider>,
}

impl ResolvesServerCert for ProviderResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let server_name = client_hello.server_name();
        let certificate = self.provider.certificate_for(server_name);
        if certificate.is_none() {
            tracing::warn!(server_name = ?server_name, "No certificate for requested server name");
        }
        certificate
    }
}

/// Make aws-lc-rs the process-wide rustls provider. Later calls are no-ops.
pub fn install_crypto_provider() {
    let _ = aws_lc_rs::default_provider().install_default();
}

/// Build the TLS listener configuration around a certificate provider.
pub fn rustls_config(provider: Arc<dyn CertificateProvider>) -> Result<RustlsConfig, TlsError> {
    let mut config = ServerConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(ProviderResolver { provider }));
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(RustlsConfig::from_config(Arc::new(config)))
}

/// Parse a PEM certificate chain.
pub fn parse_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let chain = rustls_pemfile::certs(&mut &pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(TlsError::Pem)?;
    if chain.is_empty() {
        return Err(TlsError::NoCertificates);
    }
    Ok(chain)
}

/// Parse a PEM chain and private key into a signing-ready certified key.
pub fn certified_key_from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<CertifiedKey, TlsError> {
    let chain = parse_certificates(cert_pem)?;
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut &key_pem[..])
        .map_err(TlsError::Pem)?
        .ok_or(TlsError::NoPrivateKey)?;
    let signing_key = aws_lc_rs::sign::any_supported_type(&key).map_err(TlsError::Key)?;
    Ok(CertifiedKey::new(chain, signing_key))
}

/// A single certificate loaded from PEM files, served for every SNI name.
#[derive(Debug)]
pub struct StaticCertificate {
    key: Arc<CertifiedKey>,
}

impl StaticCertificate {
    /// Load certificate chain and key from disk.
    pub async fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, TlsError> {
        let cert_pem = read(cert_path).await?;
        let key_pem = read(key_path).await?;
        let key = certified_key_from_pem(&cert_pem, &key_pem)?;
        tracing::info!(cert = ?cert_path, "Loaded static TLS certificate");
        Ok(Self { key: Arc::new(key) })
    }
}

impl CertificateProvider for StaticCertificate {
    fn certificate_for(&self, _server_name: Option<&str>) -> Option<Arc<CertifiedKey>> {
        Some(self.key.clone())
    }
}

async fn read(path: &Path) -> Result<Vec<u8>, TlsError> {
    tokio::fs::read(path).await.map_err(|source| TlsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rcgen::{CertificateParams, KeyPair};

    /// Self-signed `(cert_pem, key_pem)` for `names`.
    pub(crate) fn self_signed(names: &[&str]) -> (String, String) {
        let key = KeyPair::generate().unwrap();
        let params = CertificateParams::new(names.iter().map(|n| n.to_string()).collect::<Vec<_>>()).unwrap();
        let cert = params.self_signed(&key).unwrap();
        (cert.pem(), key.serialize_pem())
    }

    #[test]
    fn parses_generated_certificate() {
        let (cert, key) = self_signed(&["localhost"]);
        let certified = certified_key_from_pem(cert.as_bytes(), key.as_bytes()).unwrap();
        assert_eq!(certified.cert.len(), 1);
    }

    #[test]
    fn rejects_missing_material() {
        let (cert, _) = self_signed(&["localhost"]);
        assert!(matches!(
            certified_key_from_pem(b"not pem", b"not pem"),
            Err(TlsError::NoCertificates)
        ));
        assert!(matches!(
            certified_key_from_pem(cert.as_bytes(), b""),
            Err(TlsError::NoPrivateKey)
        ));
    }

    #[tokio::test]
    async fn static_certificate_serves_any_name() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = self_signed(&["localhost"]);
        let cert_path = dir.path().join("cert.pem");
        let key_path = dir.path().join("key.pem");
        std::fs::write(&cert_path, cert).unwrap();
        std::fs::write(&key_path, key).unwrap();

        let provider = StaticCertificate::from_pem_files(&cert_path, &key_path).await.unwrap();
        assert!(provider.certificate_for(Some("localhost")).is_some());
        assert!(provider.certificate_for(None).is_some());

        assert!(rustls_config(Arc::new(provider)).is_ok());
    }

    #[tokio::test]
    async fn missing_file_reports_path() {
        let err = StaticCertificate::from_pem_files(Path::new("/nope/cert.pem"), Path::new("/nope/key.pem"))
            .await
            .unwrap_err();
        match err {
            TlsError::Io { path, .. } => assert_eq!(path, Path::new("/nope/cert.pem")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
