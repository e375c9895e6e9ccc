//! Collector Layer
//!
//! Pluggable metric collectors, the registry that decides which of them run,
//! and the concurrent collection cycle that executes them.
//!
//! # Architecture
//!
//! - [`Collector`]: Core trait implemented by every metric collector
//! - [`CollectorRegistry`]: Collector names, constructors and enablement state
//! - [`BillingCollector`]: The active set, built from the registry; runs one
//!   Tokio task per collector per cycle and reports `github_billing_up`
//! - [`MetricSink`]: Shared, write-only channel the collectors emit into
//!
//! # Example
//!
//! ```rust,no_run
//! use billing_exporter::collector::{
//!     BillingCollector, BillingContext, CollectorRegistry, register_builtin,
//! };
//! use billing_exporter::github::GithubSettings;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = CollectorRegistry::new();
//! register_builtin(&mut registry)?;
//!
//! let settings = GithubSettings {
//!     orgs: vec!["acme".to_string()],
//!     ..Default::default()
//! };
//! let context = BillingContext::new(&settings)?;
//! let billing = BillingCollector::build(&registry, &context, &tracing::Span::current())?;
//! let families = billing.gather().await;
//! # Ok(())
//! # }
//! ```

pub mod actions;
mod billing;
mod orchestrator;
pub mod packages;
mod registry;
mod sink;
pub mod storage;
mod traits;

pub use billing::{BillingContext, ORG_LABEL, register_builtin};
pub use orchestrator::{BillingCollector, COLLECTOR_LABEL, NAMESPACE, UP_HELP, fq_name};
pub use registry::{CollectorRegistry, Enablement, EnablementOverrides, RegistryError};
pub use sink::{MetricReceiver, MetricSink, const_metric, merge_families};
pub use traits::{Collector, CollectorContext, CollectorError};
