//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Let's Encrypt production directory.
pub const LETS_ENCRYPT_DIRECTORY: &str = "https://acme-v02.api.letsencrypt.org/directory";

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Base URL every inbound path is appended to (e.g., "https://api.example.com").
    pub target_url: String,

    /// Listener configuration (ports, bind host).
    pub listener: ListenerConfig,

    /// Certificate source for the TLS listener.
    pub tls: TlsConfig,

    /// Redirect following policy.
    pub redirects: RedirectConfig,

    /// Upstream timeouts.
    pub timeouts: TimeoutConfig,

    /// Inbound size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            target_url: "https://twochicks.ru".to_string(),
            listener: ListenerConfig::default(),
            tls: TlsConfig::default(),
            redirects: RedirectConfig::default(),
            timeouts: TimeoutConfig::default(),
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Pin the listeners to 80/443 when a domain drives certificate acquisition.
    ///
    /// Returns `true` if the ports were changed.
    pub fn force_standard_ports(&mut self) -> bool {
        if self.tls.domain.is_none() {
            return false;
        }
        let changed = self.listener.http_port != Some(80) || self.listener.https_port != Some(443);
        self.listener.http_port = Some(80);
        self.listener.https_port = Some(443);
        changed
    }

    /// Whether the TLS listener should run at all.
    pub fn tls_enabled(&self) -> bool {
        self.listener.https_port.is_some() && self.tls.source().is_some()
    }

    /// An HTTPS port that will not be served because no certificate source is set.
    pub fn ignored_https_port(&self) -> Option<u16> {
        match self.tls.source() {
            Some(_) => None,
            None => self.listener.https_port,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host/IP both listeners bind to.
    pub bind_host: String,

    /// Plain HTTP port; `None` disables the plain listener.
    pub http_port: Option<u16>,

    /// HTTPS port; only used when a certificate source is configured.
    pub https_port: Option<u16>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            http_port: Some(80),
            https_port: Some(443),
        }
    }
}

impl ListenerConfig {
    /// `host:port` string for the plain listener.
    pub fn http_address(&self) -> Option<String> {
        self.http_port.map(|port| format!("{}:{}", self.bind_host, port))
    }

    /// `host:port` string for the TLS listener.
    pub fn https_address(&self) -> Option<String> {
        self.https_port.map(|port| format!("{}:{}", self.bind_host, port))
    }
}

/// Certificate configuration for the TLS listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Domain to obtain an ACME certificate for. Forces ports 80/443.
    pub domain: Option<String>,

    /// Certificate cache directory. Defaults to `$HOME/.relay-proxy-ssl-certs`.
    pub cache_dir: Option<PathBuf>,

    /// ACME directory URL.
    pub directory_url: String,

    /// Contact address registered with the ACME account.
    pub contact_email: Option<String>,

    /// Renew once the certificate has fewer days than this left.
    pub renew_before_days: u32,

    /// Path to a static certificate chain (PEM), used when no domain is set.
    pub cert_path: Option<PathBuf>,

    /// Path to the static certificate's private key (PEM).
    pub key_path: Option<PathBuf>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            domain: None,
            cache_dir: None,
            directory_url: LETS_ENCRYPT_DIRECTORY.to_string(),
            contact_email: None,
            renew_before_days: 30,
            cert_path: None,
            key_path: None,
        }
    }
}

/// Where the TLS listener gets its certificate from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateSource<'a> {
    /// ACME-issued certificate for a single domain.
    Acme { domain: &'a str },
    /// Certificate chain and key loaded from PEM files.
    Static { cert_path: &'a PathBuf, key_path: &'a PathBuf },
}

impl TlsConfig {
    /// Resolve the configured certificate source. A domain wins over static files.
    pub fn source(&self) -> Option<CertificateSource<'_>> {
        if let Some(domain) = self.domain.as_deref() {
            return Some(CertificateSource::Acme { domain });
        }
        match (&self.cert_path, &self.key_path) {
            (Some(cert_path), Some(key_path)) => Some(CertificateSource::Static { cert_path, key_path }),
            _ => None,
        }
    }

    /// Cache directory, falling back to a dot-directory under `$HOME`.
    pub fn resolved_cache_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Some(dir.clone());
        }
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".relay-proxy-ssl-certs"))
    }
}

/// Redirect following configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedirectConfig {
    /// Maximum number of 3xx hops followed within one exchange.
    pub max_hops: u32,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self { max_hops: 10 }
    }
}

/// Timeout configuration for upstream calls. Unset means the transport default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: Option<u64>,

    /// Total time for one upstream request/response in seconds.
    pub request_secs: Option<u64>,
}

/// Inbound limits.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum buffered request body in bytes. Unset means unbounded.
    pub max_body_bytes: Option<usize>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Prometheus endpoint bind address; unset disables the exporter.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_address: None,
        }
    }
}
