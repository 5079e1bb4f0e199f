//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a configuration file without validating it.
///
/// Validation is deferred so command-line overrides can be applied first.
pub fn read_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse TOML text into a configuration.
pub fn parse_config(content: &str) -> Result<RelayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Accept a fully assembled configuration if it passes validation.
pub fn validated(config: RelayConfig) -> Result<RelayConfig, ConfigError> {
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
            target_url = "https://api.example.com"

            [listener]
            http_port = 8080

            [redirects]
            max_hops = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.target_url, "https://api.example.com");
        assert_eq!(config.listener.http_port, Some(8080));
        assert_eq!(config.listener.bind_host, "0.0.0.0");
        assert_eq!(config.redirects.max_hops, 3);
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.timeouts.request_secs, None);
    }

    #[test]
    fn rejects_unparseable_toml() {
        assert!(matches!(parse_config("target_url = ["), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn validation_errors_are_joined() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "target_url = \"\"\n[redirects]\nmax_hops = 0").unwrap();

        let err = validated(read_config(file.path()).unwrap()).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Validation failed: "));
        assert!(message.contains("target URL is not specified"));
        assert!(message.contains("max_hops"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_config(Path::new("/nonexistent/relay.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
