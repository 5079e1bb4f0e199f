//! relay-proxy
//!
//! Transparent HTTP/HTTPS relay built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌───────────────────────────────────────────────────┐
//!                     │                    RELAY PROXY                    │
//!   Client Request    │  ┌──────────┐   ┌──────────┐   ┌──────────────┐   │
//!   ──────────────────┼─▶│   net    │──▶│   http   │──▶│    relay     │───┼──▶ Upstream
//!                     │  │ plain/tls│   │  server  │   │  hop loop    │◀──┼─── (3xx → next hop)
//!   Client Response   │  └──────────┘   └──────────┘   └──────────────┘   │
//!   ◀─────────────────┼──────── relayed status / headers / body ◀─────────┤
//!                     │                                                   │
//!                     │  ┌──────────┐ ┌──────────┐ ┌─────────────────┐    │
//!                     │  │  config  │ │   acme   │ │  observability  │    │
//!                     │  └──────────┘ └──────────┘ └─────────────────┘    │
//!                     └───────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use relay_proxy::config::loader::{read_config, validated};
use relay_proxy::config::{ConfigError, RelayConfig};
use relay_proxy::lifecycle::{self, signals, Shutdown};
use relay_proxy::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "relay-proxy", version)]
#[command(about = "Relay every request to a target URL, following its redirects", long_about = None)]
struct Cli {
    /// Optional TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target URL for forwarding requests
    #[arg(long)]
    target_url: Option<String>,

    /// Port for the HTTP server (ignored if --domain is set)
    #[arg(long)]
    http_port: Option<u16>,

    /// Disable the plain HTTP listener
    #[arg(long, conflicts_with = "http_port")]
    no_http: bool,

    /// Port for the HTTPS server (ignored if --domain is set)
    #[arg(long)]
    https_port: Option<u16>,

    /// Domain for an automatic Let's Encrypt certificate (forces ports 80/443)
    #[arg(long)]
    domain: Option<String>,

    /// Host/IP the listeners bind to
    #[arg(long)]
    bind_host: Option<String>,

    /// PEM certificate chain for the HTTPS listener when no domain is given
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// PEM private key matching --tls-cert
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// Certificate cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// ACME directory URL
    #[arg(long)]
    acme_directory: Option<String>,

    /// Contact email for the ACME account
    #[arg(long)]
    email: Option<String>,

    /// Maximum redirects followed per request
    #[arg(long)]
    max_redirects: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,

    /// Prometheus metrics bind address
    #[arg(long)]
    metrics_address: Option<String>,
}

impl Cli {
    /// Layer command-line values over `config`.
    fn apply(self, config: &mut RelayConfig) {
        if let Some(target_url) = self.target_url {
            config.target_url = target_url;
        }
        if let Some(port) = self.http_port {
            config.listener.http_port = Some(port);
        }
        if self.no_http {
            config.listener.http_port = None;
        }
        if let Some(port) = self.https_port {
            config.listener.https_port = Some(port);
        }
        if let Some(host) = self.bind_host {
            config.listener.bind_host = host;
        }
        if let Some(domain) = self.domain.filter(|d| !d.is_empty()) {
            config.tls.domain = Some(domain);
        }
        if let Some(path) = self.tls_cert {
            config.tls.cert_path = Some(path);
        }
        if let Some(path) = self.tls_key {
            config.tls.key_path = Some(path);
        }
        if let Some(dir) = self.cache_dir {
            config.tls.cache_dir = Some(dir);
        }
        if let Some(url) = self.acme_directory {
            config.tls.directory_url = url;
        }
        if let Some(email) = self.email {
            config.tls.contact_email = Some(email);
        }
        if let Some(hops) = self.max_redirects {
            config.redirects.max_hops = hops;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if self.json_logs {
            config.observability.json_logs = true;
        }
        if let Some(address) = self.metrics_address {
            config.observability.metrics_address = Some(address);
        }
    }

    /// File configuration (or defaults) with flags applied, not yet validated.
    fn into_config(self) -> Result<RelayConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => RelayConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init_tracing(&Default::default());
            tracing::error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    logging::init_tracing(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "relay-proxy starting");

    if config.force_standard_ports() {
        tracing::info!("Domain specified. Ignoring custom port flags and forcing HTTP (80) and HTTPS (443).");
    }

    let config = match validated(config) {
        Ok(config) => config,
        Err(e) => {
            if let ConfigError::Validation(errors) = &e {
                for error in errors {
                    tracing::error!(error = %error, "Invalid configuration");
                }
            }
            return Err(e.into());
        }
    };

    if let Some(port) = config.ignored_https_port() {
        tracing::warn!(https_port = port, "No domain or certificate files configured, HTTPS port ignored");
    }

    tracing::info!(
        target_url = %config.target_url,
        http_port = ?config.listener.http_port,
        https_port = ?config.listener.https_port,
        domain = ?config.tls.domain,
        max_hops = config.redirects.max_hops,
        "Configuration loaded"
    );

    if let Some(address) = &config.observability.metrics_address {
        match address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(metrics_address = %address, error = %e, "Failed to parse metrics address"),
        }
    }

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    if let Err(e) = lifecycle::serve(&config, &shutdown).await {
        tracing::error!(error = %e, "Fatal error, shutting down");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> RelayConfig {
        let cli = Cli::try_parse_from(std::iter::once("relay-proxy").chain(args.iter().copied())).unwrap();
        cli.into_config().unwrap()
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--target-url",
            "https://api.example.com",
            "--http-port",
            "8080",
            "--max-redirects",
            "4",
        ]);
        assert_eq!(config.target_url, "https://api.example.com");
        assert_eq!(config.listener.http_port, Some(8080));
        assert_eq!(config.redirects.max_hops, 4);
    }

    #[test]
    fn no_http_disables_plain_listener() {
        let config = parse(&["--no-http"]);
        assert_eq!(config.listener.http_port, None);
    }

    #[test]
    fn empty_domain_is_ignored() {
        let config = parse(&["--domain", ""]);
        assert_eq!(config.tls.domain, None);
    }

    #[test]
    fn tls_cert_requires_key() {
        assert!(Cli::try_parse_from(["relay-proxy", "--tls-cert", "cert.pem"]).is_err());
    }

    #[test]
    fn version_flag_exits_cleanly() {
        let err = Cli::try_parse_from(["relay-proxy", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    fn file_values_are_overridden_by_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(
            &path,
            "target_url = \"https://from-file.example.com\"\n[listener]\nhttp_port = 9000\n",
        )
        .unwrap();

        let config = parse(&["--config", path.to_str().unwrap(), "--http-port", "9001"]);
        assert_eq!(config.target_url, "https://from-file.example.com");
        assert_eq!(config.listener.http_port, Some(9001));
    }
}
