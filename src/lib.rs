//! GitHub Billing Exporter
//!
//! Prometheus exporter reporting GitHub organization billing usage. It can be
//! used as a library, or run as the `github-billing-exporter` binary.
//!
//! # Architecture
//!
//! - **Collectors**: Pluggable billing collectors, a registry deciding which
//!   run, and a concurrent collection cycle with per-collector `up` reporting
//! - **GitHub**: REST client for the organization billing endpoints
//! - **Config**: YAML file, environment and CLI flags
//! - **Server**: Axum endpoint serving the Prometheus text exposition
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use billing_exporter::collector::{BillingCollector, BillingContext, CollectorRegistry};
//! use billing_exporter::server::{AppState, create_router};
//! use billing_exporter::GithubSettings;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = CollectorRegistry::new();
//!     billing_exporter::collector::register_builtin(&mut registry)?;
//!
//!     let settings = GithubSettings {
//!         orgs: vec!["acme".to_string()],
//!         ..Default::default()
//!     };
//!     let context = BillingContext::new(&settings)?;
//!     let collector = BillingCollector::build(&registry, &context, &tracing::Span::current())?;
//!
//!     let app = create_router(AppState {
//!         collector: Arc::new(collector),
//!         telemetry_path: "/metrics".to_string(),
//!     });
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:9776").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod github;
pub mod server;

pub use collector::{
    BillingCollector, Collector, CollectorError, CollectorRegistry, MetricSink, RegistryError,
};
pub use config::{AppConfig, Cli, ConfigError};
pub use github::{GithubClient, GithubSettings};
