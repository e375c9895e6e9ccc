//! Application configuration structures.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::EnablementOverrides;
use crate::github::{DEFAULT_API_URL, DEFAULT_TIMEOUT, GithubSettings};

use super::validation::{ConfigError, expand_env_vars, validate_telemetry_path};

// =============================================================================
// Constants
// =============================================================================

/// Default exporter port.
pub const DEFAULT_PORT: u16 = 9776;

/// Default path for the metrics endpoint.
pub const DEFAULT_TELEMETRY_PATH: &str = "/metrics";

// =============================================================================
// Server Configuration
// =============================================================================

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "0.0.0.0").
    pub bind: String,

    /// Server port (default: 9776).
    pub port: u16,

    /// Path under which metrics are exposed (default: "/metrics").
    pub telemetry_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            telemetry_path: DEFAULT_TELEMETRY_PATH.to_string(),
        }
    }
}

// =============================================================================
// GitHub Configuration
// =============================================================================

/// GitHub API access used by the billing collectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// API token. `${VAR}` references are expanded when loading from file.
    pub token: Option<String>,

    /// Organizations to get metrics from.
    pub orgs: Vec<String>,

    /// API base URL (default: "https://api.github.com").
    pub api_url: String,

    /// Per-request timeout (default: 10s).
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            orgs: Vec::new(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Web server configuration.
    pub server: ServerConfig,

    /// GitHub API configuration.
    pub github: GithubConfig,

    /// Explicit collector toggles, keyed by collector name.
    pub collectors: EnablementOverrides,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed. Validation
    /// runs after CLI overrides are applied, see [`AppConfig::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = serde_yaml::from_str(&content)?;
        config.github.token = config.github.token.as_deref().map(expand_env_vars);
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate server bind address
        self.server.bind.parse::<IpAddr>().map_err(|_| {
            ConfigError::ValidationError(format!(
                "invalid server bind address: '{}'",
                self.server.bind
            ))
        })?;

        // Validate server port
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server port must be non-zero".to_string(),
            ));
        }

        validate_telemetry_path(&self.server.telemetry_path)?;

        let api_url = &self.github.api_url;
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "github api_url must be an http(s) URL: '{}'",
                api_url
            )));
        }

        if self.github.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "github timeout must be non-zero".to_string(),
            ));
        }

        if self.github.orgs.iter().any(|org| org.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "github orgs must not contain empty names".to_string(),
            ));
        }

        Ok(())
    }

    /// Socket address the server binds to.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.server.bind.parse().map_err(|_| {
            ConfigError::ValidationError(format!(
                "invalid server bind address: '{}'",
                self.server.bind
            ))
        })?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    /// Settings for the GitHub billing collectors.
    pub fn github_settings(&self) -> GithubSettings {
        GithubSettings {
            token: self.github.token.clone(),
            orgs: self.github.orgs.clone(),
            api_url: self.github.api_url.clone(),
            timeout: self.github.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.telemetry_path, "/metrics");
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.collectors.is_empty());
        assert_eq!(config.github.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_load_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
server:
  bind: "127.0.0.1"
  port: 9100
github:
  token: "${{NONEXISTENT_BILLING_TOKEN_987:-ghp_from_default}}"
  orgs: ["acme", "globex"]
  timeout: "30s"
collectors:
  packages: false
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.telemetry_path, DEFAULT_TELEMETRY_PATH);
        assert_eq!(config.github.token.as_deref(), Some("ghp_from_default"));
        assert_eq!(config.github.orgs, vec!["acme", "globex"]);
        assert_eq!(config.github.timeout, Duration::from_secs(30));
        assert_eq!(config.collectors.get("packages"), Some(&false));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let result = AppConfig::load("/nonexistent/billing-exporter.yaml");
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }

    #[test]
    fn test_config_validation_invalid_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_bind_address() {
        let mut config = AppConfig::default();
        config.server.bind = "not-an-ip".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("invalid server bind address")
        );
    }

    #[test]
    fn test_config_validation_api_url_and_timeout() {
        let mut config = AppConfig::default();
        config.github.api_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.github.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_org() {
        let mut config = AppConfig::default();
        config.github.orgs = vec!["acme".to_string(), " ".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_listen_addr_and_settings() {
        let mut config = AppConfig::default();
        config.server.bind = "127.0.0.1".to_string();
        config.github.orgs = vec!["acme".to_string()];

        assert_eq!(config.listen_addr().unwrap().to_string(), "127.0.0.1:9776");
        let settings = config.github_settings();
        assert_eq!(settings.orgs, vec!["acme"]);
        assert_eq!(settings.timeout, DEFAULT_TIMEOUT);
    }
}
