//! Directory-backed certificate cache.
//!
//! # Layout
//! ```text
//! <cache_dir>/
//!     <domain>.crt.pem        issued chain, leaf first
//!     <domain>.key.pem        private key (0600)
//!     account-<ca-host>.json  ACME account credentials (0600)
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use instant_acme::AccountCredentials;
use rustls::sign::CertifiedKey;

use crate::acme::AcmeError;
use crate::net::tls::{certified_key_from_pem, parse_certificates};

/// A certificate chain and its private key, both PEM-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    pub chain_pem: String,
    pub key_pem: String,
}

impl IssuedCertificate {
    pub fn certified_key(&self) -> Result<CertifiedKey, AcmeError> {
        Ok(certified_key_from_pem(self.chain_pem.as_bytes(), self.key_pem.as_bytes())?)
    }

    /// `notAfter` of the leaf certificate.
    pub fn expires_at(&self) -> Result<SystemTime, AcmeError> {
        let chain = parse_certificates(self.chain_pem.as_bytes())?;
        let (_, leaf) = x509_parser::parse_x509_certificate(chain[0].as_ref())
            .map_err(|e| AcmeError::Certificate(e.to_string()))?;
        let not_after = leaf.validity().not_after.timestamp();
        Ok(UNIX_EPOCH + Duration::from_secs(not_after.max(0) as u64))
    }
}

/// Certificate and account storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct CertificateCache {
    dir: PathBuf,
}

impl CertificateCache {
    /// Open the cache, creating the directory (mode 0700) if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, AcmeError> {
        let dir = dir.into();
        create_private_dir(&dir).map_err(|source| AcmeError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn cert_path(&self, domain: &str) -> PathBuf {
        self.dir.join(format!("{domain}.crt.pem"))
    }

    fn key_path(&self, domain: &str) -> PathBuf {
        self.dir.join(format!("{domain}.key.pem"))
    }

    fn account_path(&self, directory_url: &str) -> PathBuf {
        let host = url::Url::parse(directory_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
            .unwrap_or_else(|| "default".to_string());
        self.dir.join(format!("account-{host}.json"))
    }

    /// Cached certificate for `domain`, if both halves are present.
    pub async fn load_certificate(&self, domain: &str) -> Result<Option<IssuedCertificate>, AcmeError> {
        let Some(chain_pem) = read_optional(&self.cert_path(domain)).await? else {
            return Ok(None);
        };
        let Some(key_pem) = read_optional(&self.key_path(domain)).await? else {
            return Ok(None);
        };
        Ok(Some(IssuedCertificate { chain_pem, key_pem }))
    }

    pub async fn store_certificate(&self, domain: &str, certificate: &IssuedCertificate) -> Result<(), AcmeError> {
        write_private(&self.key_path(domain), certificate.key_pem.as_bytes()).await?;
        write_private(&self.cert_path(domain), certificate.chain_pem.as_bytes()).await
    }

    pub async fn load_account(&self, directory_url: &str) -> Result<Option<AccountCredentials>, AcmeError> {
        match read_optional(&self.account_path(directory_url)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn store_account(&self, directory_url: &str, credentials: &AccountCredentials) -> Result<(), AcmeError> {
        let json = serde_json::to_vec_pretty(credentials)?;
        write_private(&self.account_path(directory_url), &json).await
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, AcmeError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(AcmeError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn write_private(path: &Path, content: &[u8]) -> Result<(), AcmeError> {
    let io_err = |source| AcmeError::Io {
        path: path.to_path_buf(),
        source,
    };
    tokio::fs::write(path, content).await.map_err(io_err)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(io_err)?;
    }
    Ok(())
}

fn create_private_dir(dir: &Path) -> io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::tls::tests::self_signed;

    #[tokio::test]
    async fn round_trips_certificate_and_reports_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CertificateCache::open(dir.path().join("certs")).unwrap();
        assert!(cache.load_certificate("relay.example.com").await.unwrap().is_none());

        let (chain_pem, key_pem) = self_signed(&["relay.example.com"]);
        let issued = IssuedCertificate { chain_pem, key_pem };
        cache.store_certificate("relay.example.com", &issued).await.unwrap();

        let loaded = cache.load_certificate("relay.example.com").await.unwrap().unwrap();
        assert_eq!(loaded, issued);
        assert!(loaded.certified_key().is_ok());
        assert!(loaded.expires_at().unwrap() > SystemTime::now());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn directory_and_key_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let cache = CertificateCache::open(dir.path().join("nested/certs")).unwrap();
        let dir_mode = std::fs::metadata(cache.dir()).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);

        let (chain_pem, key_pem) = self_signed(&["relay.example.com"]);
        cache
            .store_certificate("relay.example.com", &IssuedCertificate { chain_pem, key_pem })
            .await
            .unwrap();
        let key_mode = std::fs::metadata(cache.key_path("relay.example.com"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(key_mode & 0o777, 0o600);
    }

    #[test]
    fn account_file_is_keyed_by_directory_host() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CertificateCache::open(dir.path()).unwrap();
        assert_eq!(
            cache.account_path("https://acme-staging-v02.api.letsencrypt.org/directory"),
            dir.path().join("account-acme-staging-v02.api.letsencrypt.org.json")
        );
    }

    #[test]
    fn unwritable_location_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = CertificateCache::open(file.path().join("certs")).unwrap_err();
        assert!(matches!(err, AcmeError::Io { .. }));
    }
}
