//! Core collector traits and types.

use thiserror::Error;

use crate::collector::MetricSink;

/// Errors that can occur while constructing or running a collector.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// HTTP transport error talking to the billing API.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The billing API answered with a non-success status.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Invalid metric descriptor.
    #[error("metric error: {0}")]
    Metric(#[from] prometheus::Error),

    /// Label values do not match the descriptor's variable labels.
    #[error("metric '{metric}' expects {expected} label values, got {got}")]
    LabelMismatch {
        metric: String,
        expected: usize,
        got: usize,
    },

    /// The receiving side of the metric sink is gone.
    #[error("metric sink closed")]
    SinkClosed,

    /// The collector panicked during update.
    #[error("collector panicked: {0}")]
    Panicked(String),

    /// A collector constructor failed.
    #[error("failed to build collector '{collector}': {source}")]
    Build {
        collector: String,
        #[source]
        source: Box<CollectorError>,
    },
}

/// Core collector trait for implementing metric collectors.
///
/// A collector fetches its data and writes samples into the shared sink.
/// Returning `Err` marks this cycle as failed for the collector: the error is
/// logged and `up` is reported as 0, other collectors are unaffected.
#[async_trait::async_trait]
pub trait Collector: Send + Sync + 'static {
    /// Perform one collection cycle.
    async fn update(&self, sink: &MetricSink) -> Result<(), CollectorError>;
}

/// Context handed to a collector constructor.
///
/// Carries the collector's name, a logging span tagged with it, and the
/// shared dependencies supplied by the startup routine.
#[derive(Debug)]
pub struct CollectorContext<'a, S> {
    name: &'a str,
    span: tracing::Span,
    shared: &'a S,
}

impl<'a, S> CollectorContext<'a, S> {
    pub(crate) fn new(name: &'a str, span: tracing::Span, shared: &'a S) -> Self {
        Self { name, span, shared }
    }

    /// Registered collector name.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Span scoped to this collector.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Shared dependencies passed to [`BillingCollector::build`].
    ///
    /// [`BillingCollector::build`]: crate::collector::BillingCollector::build
    pub fn shared(&self) -> &'a S {
        self.shared
    }
}
