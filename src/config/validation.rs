//! Configuration validation utilities.

use std::time::Duration;

use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Parse a request timeout such as `10s`, `1m30s` or `500ms`.
///
/// Used as the clap value parser for `--github-timeout`.
///
/// ```
/// use billing_exporter::config::parse_timeout;
///
/// assert_eq!(parse_timeout("1m30s").unwrap().as_secs(), 90);
/// assert!(parse_timeout("0s").is_err());
/// ```
pub fn parse_timeout(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("timeout is empty".to_string());
    }
    let timeout = humantime::parse_duration(s).map_err(|e| e.to_string())?;
    if timeout.is_zero() {
        return Err("timeout must be non-zero".to_string());
    }
    Ok(timeout)
}

/// Expand environment variables in a string.
/// Supports ${VAR} and ${VAR:-default} syntax.
pub fn expand_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

    let regex = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("failed to compile env var regex")
    });

    regex
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .into_owned()
}

/// Split an organization list on commas and whitespace, dropping empties.
pub fn split_orgs(input: &str) -> Vec<String> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|org| !org.is_empty())
        .map(str::to_string)
        .collect()
}

/// Check that the metrics path is usable as a route.
pub fn validate_telemetry_path(path: &str) -> Result<(), ConfigError> {
    if !path.starts_with('/') {
        return Err(ConfigError::ValidationError(format!(
            "telemetry path must start with '/': '{}'",
            path
        )));
    }
    if path == "/" || path == "/healthz" {
        return Err(ConfigError::ValidationError(format!(
            "telemetry path '{}' is reserved",
            path
        )));
    }
    Ok(())
}
