//! Configuration module for the billing exporter.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Server settings (bind address, port, telemetry path)
//! - GitHub API access (token, organizations, API URL, timeout)
//! - Collector toggles
//!
//! Precedence is CLI > ENV > config file > defaults.

pub mod cli;
mod app;
mod validation;

pub use app::{AppConfig, DEFAULT_PORT, DEFAULT_TELEMETRY_PATH, GithubConfig, ServerConfig};
pub use cli::Cli;
pub use validation::{ConfigError, expand_env_vars, parse_timeout, split_orgs};
