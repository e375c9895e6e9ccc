//! Command-line interface.
//!
//! Static flags come from the [`Cli`] derive. One toggle pair per registered
//! collector is added at runtime:
//!
//! - `--collector.<name>[=<bool>]` enables (or sets) the collector
//! - `--no-collector.<name>` disables it
//!
//! Only toggles present on the command line are reported as overrides.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Arg, ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser, value_parser};

use crate::collector::{CollectorRegistry, EnablementOverrides};

use super::app::AppConfig;
use super::validation::{parse_timeout, split_orgs};

/// GitHub billing exporter
#[derive(Parser, Debug, Default)]
#[command(name = "github-billing-exporter", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "BILLING_EXPORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// GitHub token to access the API
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Organizations to get metrics from (comma separated)
    #[arg(long, env = "GITHUB_ORGS")]
    pub github_orgs: Option<String>,

    /// GitHub API base URL (overrides config file)
    #[arg(long, env = "GITHUB_API_URL")]
    pub github_api_url: Option<String>,

    /// Timeout for each GitHub API request, e.g. `10s` (overrides config file)
    #[arg(long, env = "GITHUB_TIMEOUT", value_parser = parse_timeout)]
    pub github_timeout: Option<Duration>,

    /// Server bind address (overrides config file)
    #[arg(long, env = "BILLING_EXPORTER_SERVER_BIND")]
    pub server_bind: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, env = "BILLING_EXPORTER_SERVER_PORT")]
    pub server_port: Option<u16>,

    /// Path under which to expose metrics (overrides config file)
    #[arg(long = "web.telemetry-path")]
    pub telemetry_path: Option<String>,
}

impl Cli {
    /// Apply CLI/env overrides on top of the file configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(token) = &self.github_token {
            config.github.token = Some(token.clone());
        }
        if let Some(orgs) = &self.github_orgs {
            config.github.orgs = split_orgs(orgs);
        }
        if let Some(url) = &self.github_api_url {
            config.github.api_url = url.clone();
        }
        if let Some(timeout) = self.github_timeout {
            config.github.timeout = timeout;
        }
        if let Some(bind) = &self.server_bind {
            config.server.bind = bind.clone();
        }
        if let Some(port) = self.server_port {
            config.server.port = port;
        }
        if let Some(path) = &self.telemetry_path {
            config.server.telemetry_path = path.clone();
        }
    }
}

fn flag_id(name: &str) -> String {
    format!("collector.{name}")
}

fn negated_flag_id(name: &str) -> String {
    format!("no-collector.{name}")
}

/// Build the full command, including one toggle pair per registered collector.
pub fn command<S>(registry: &CollectorRegistry<S>) -> clap::Command {
    let mut cmd = Cli::command();

    for (name, default_enabled) in registry.defaults() {
        let state = if default_enabled { "enabled" } else { "disabled" };
        cmd = cmd
            .arg(
                Arg::new(flag_id(name))
                    .long(flag_id(name))
                    .help(format!("Enable the {name} collector (default: {state})"))
                    .value_name("BOOL")
                    .value_parser(value_parser!(bool))
                    .num_args(0..=1)
                    .require_equals(true)
                    .default_missing_value("true"),
            )
            .arg(
                Arg::new(negated_flag_id(name))
                    .long(negated_flag_id(name))
                    .help(format!("Disable the {name} collector"))
                    .action(ArgAction::SetTrue)
                    .conflicts_with(flag_id(name)),
            );
    }

    cmd
}

/// Collector toggles explicitly given on the command line.
pub fn overrides_from_matches<S>(
    matches: &ArgMatches,
    registry: &CollectorRegistry<S>,
) -> EnablementOverrides {
    let mut overrides = EnablementOverrides::new();

    for (name, _) in registry.defaults() {
        if matches.get_flag(&negated_flag_id(name)) {
            overrides.insert(name.to_string(), false);
        } else if let Some(enabled) = matches.get_one::<bool>(&flag_id(name)) {
            overrides.insert(name.to_string(), *enabled);
        }
    }

    overrides
}

/// Parse arguments into the static CLI and the collector overrides.
///
/// # Errors
/// Returns the clap error for invalid input (including `--help`/`--version`).
pub fn parse_from<S, I, T>(
    registry: &CollectorRegistry<S>,
    args: I,
) -> Result<(Cli, EnablementOverrides), clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = command(registry).try_get_matches_from(args)?;
    let cli = Cli::from_arg_matches(&matches)?;
    let overrides = overrides_from_matches(&matches, registry);
    Ok((cli, overrides))
}
