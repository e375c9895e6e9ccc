//! Active collector set and the concurrent collection cycle.

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use prometheus::core::Desc;
use prometheus::proto::MetricFamily;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::collector::registry::CollectorRegistry;
use crate::collector::sink::merge_families;
use crate::collector::{Collector, CollectorContext, CollectorError, MetricSink};

/// Metric namespace shared by every exported series.
pub const NAMESPACE: &str = "github_billing";

/// Help text of the per-collector success indicator.
pub const UP_HELP: &str = "whether the named collector's last run succeeded";

/// Label carrying the collector name on the success indicator.
pub const COLLECTOR_LABEL: &str = "collector";

/// Build a fully qualified metric name (`namespace_subsystem_name`).
pub fn fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

struct ActiveCollector {
    collector: Arc<dyn Collector>,
    span: tracing::Span,
}

/// Runs every enabled collector and reports their success.
///
/// The active set is fixed at [`build`](Self::build) time. Each
/// [`collect`](Self::collect) cycle runs all active collectors concurrently
/// and emits one `github_billing_up` sample per collector.
pub struct BillingCollector {
    collectors: BTreeMap<String, ActiveCollector>,
    up: Desc,
}

impl std::fmt::Debug for BillingCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingCollector")
            .field("collectors", &self.collectors.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl BillingCollector {
    /// Instantiate every collector the registry resolves as enabled.
    ///
    /// Each constructor gets a span tagged with the collector name, parented
    /// to `parent`, and a reference to `shared`.
    ///
    /// # Errors
    /// Returns `CollectorError::Build` for the first constructor that fails.
    /// No partially built set is returned.
    pub fn build<S>(
        registry: &CollectorRegistry<S>,
        shared: &S,
        parent: &tracing::Span,
    ) -> Result<Self, CollectorError> {
        let up = Desc::new(
            fq_name(NAMESPACE, "", "up"),
            UP_HELP.to_string(),
            vec![COLLECTOR_LABEL.to_string()],
            HashMap::new(),
        )?;

        let mut collectors = BTreeMap::new();
        for (name, entry) in registry.entries() {
            if !entry.enablement.enabled {
                tracing::info!(collector = %name, "Collector disabled");
                continue;
            }

            let span = tracing::info_span!(parent: parent, "collector", collector = %name);
            let ctx = CollectorContext::new(name, span.clone(), shared);
            let collector = (entry.constructor)(&ctx).map_err(|e| CollectorError::Build {
                collector: name.to_string(),
                source: Box::new(e),
            })?;

            tracing::info!(collector = %name, "Collector enabled");
            collectors.insert(name.to_string(), ActiveCollector { collector, span });
        }

        Ok(Self { collectors, up })
    }

    /// Names of the active collectors, sorted.
    pub fn active(&self) -> impl Iterator<Item = &str> {
        self.collectors.keys().map(String::as_str)
    }

    /// Descriptors advertised up front.
    ///
    /// Only the success indicator is declared; collectors may emit other
    /// families at collect time without declaring them.
    pub fn describe(&self) -> Vec<&Desc> {
        vec![&self.up]
    }

    /// Run one collection cycle.
    ///
    /// All active collectors run concurrently, one task each, writing into
    /// `sink`. Returns once every task has finished. Collector failures are
    /// logged and reported through `up`; they never surface here.
    pub async fn collect(&self, sink: &MetricSink) {
        let mut tasks = JoinSet::new();

        for (name, active) in &self.collectors {
            let name = name.clone();
            let collector = Arc::clone(&active.collector);
            let up = self.up.clone();
            let sink = sink.clone();
            tasks.spawn(
                async move { execute(&name, collector.as_ref(), &up, &sink).await }
                    .instrument(active.span.clone()),
            );
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Collector task aborted");
            }
        }
    }

    /// Run one cycle and return its samples merged per metric name.
    pub async fn gather(&self) -> Vec<MetricFamily> {
        let (sink, mut rx) = MetricSink::channel();
        self.collect(&sink).await;
        drop(sink);
        merge_families(rx.drain())
    }
}

/// Run one collector and record its success indicator.
///
/// Errors and panics from `update` are contained here.
async fn execute(name: &str, collector: &dyn Collector, up: &Desc, sink: &MetricSink) {
    let start = std::time::Instant::now();
    tracing::debug!(collector = %name, "Running collection");

    let result = match AssertUnwindSafe(collector.update(sink)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(CollectorError::Panicked(panic_message(panic.as_ref()))),
    };

    let success = match &result {
        Ok(()) => {
            tracing::debug!(
                collector = %name,
                duration_ms = start.elapsed().as_millis(),
                "Collection succeeded"
            );
            1.0
        }
        Err(e) => {
            tracing::error!(collector = %name, error = %e, "Cannot collect metrics");
            0.0
        }
    };

    if let Err(e) = sink.gauge(up, success, &[name]) {
        tracing::warn!(collector = %name, error = %e, "Failed to record up metric");
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::registry::EnablementOverrides;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Emits one sample of its own, then succeeds or fails.
    struct MockCollector {
        desc: Desc,
        fail_with: Option<String>,
    }

    impl MockCollector {
        fn new(name: &str, fail_with: Option<&str>) -> Self {
            Self {
                desc: Desc::new(
                    format!("mock_{name}_value"),
                    "mock value".to_string(),
                    vec![],
                    HashMap::new(),
                )
                .unwrap(),
                fail_with: fail_with.map(str::to_string),
            }
        }
    }

    #[async_trait::async_trait]
    impl Collector for MockCollector {
        async fn update(&self, sink: &MetricSink) -> Result<(), CollectorError> {
            sink.gauge(&self.desc, 42.0, &[])?;
            match &self.fail_with {
                Some(message) => Err(CollectorError::Api {
                    status: 403,
                    message: message.clone(),
                }),
                None => Ok(()),
            }
        }
    }

    struct HangingCollector;

    #[async_trait::async_trait]
    impl Collector for HangingCollector {
        async fn update(&self, _sink: &MetricSink) -> Result<(), CollectorError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    struct PanickingCollector;

    #[async_trait::async_trait]
    impl Collector for PanickingCollector {
        async fn update(&self, _sink: &MetricSink) -> Result<(), CollectorError> {
            panic!("boom");
        }
    }

    /// `up` samples keyed by collector label.
    fn up_values(samples: &[MetricFamily]) -> BTreeMap<String, f64> {
        samples
            .iter()
            .filter(|f| f.get_name() == "github_billing_up")
            .flat_map(|f| f.get_metric().iter())
            .map(|m| {
                (
                    m.get_label()[0].get_value().to_string(),
                    m.get_gauge().get_value(),
                )
            })
            .collect()
    }

    fn up_count(samples: &[MetricFamily]) -> usize {
        samples
            .iter()
            .filter(|f| f.get_name() == "github_billing_up")
            .map(|f| f.get_metric().len())
            .sum()
    }

    fn three_collectors() -> CollectorRegistry {
        let mut registry = CollectorRegistry::new();
        registry
            .register("A", true, |_| Ok(MockCollector::new("a", None)))
            .unwrap();
        registry
            .register("B", false, |_| Ok(MockCollector::new("b", None)))
            .unwrap();
        registry
            .register("C", true, |_| Ok(MockCollector::new("c", None)))
            .unwrap();
        registry
    }

    #[test]
    fn test_fq_name() {
        assert_eq!(fq_name("github_billing", "", "up"), "github_billing_up");
        assert_eq!(
            fq_name("github_billing", "actions", "included_minutes"),
            "github_billing_actions_included_minutes"
        );
    }

    #[tokio::test]
    async fn test_default_enablement_scenario() {
        let registry = three_collectors();
        let billing = BillingCollector::build(&registry, &(), &tracing::Span::none()).unwrap();

        assert_eq!(billing.active().collect::<Vec<_>>(), vec!["A", "C"]);

        let (sink, mut rx) = MetricSink::channel();
        billing.collect(&sink).await;
        let samples = rx.drain();

        let up = up_values(&samples);
        assert_eq!(up.len(), 2);
        assert_eq!(up["A"], 1.0);
        assert_eq!(up["C"], 1.0);
        assert!(!up.contains_key("B"));
        assert!(!samples.iter().any(|f| f.get_name() == "mock_b_value"));
    }

    #[tokio::test]
    async fn test_failed_collector_reports_zero() {
        let mut registry = CollectorRegistry::new();
        registry
            .register("A", true, |_| Ok(MockCollector::new("a", Some("quota exceeded"))))
            .unwrap();
        registry
            .register("B", true, |_| Ok(MockCollector::new("b", None)))
            .unwrap();

        let billing = BillingCollector::build(&registry, &(), &tracing::Span::none()).unwrap();
        let (sink, mut rx) = MetricSink::channel();
        billing.collect(&sink).await;
        let samples = rx.drain();

        let up = up_values(&samples);
        assert_eq!(up["A"], 0.0);
        assert_eq!(up["B"], 1.0);
        // Samples emitted before the failure are still forwarded
        assert!(samples.iter().any(|f| f.get_name() == "mock_a_value"));
    }

    #[tokio::test]
    async fn test_n_collectors_k_failures() {
        let mut registry = CollectorRegistry::new();
        for i in 0..10 {
            let fail = i % 3 == 0;
            registry
                .register(format!("c{i}"), true, move |_| {
                    Ok(MockCollector::new("x", fail.then_some("failed")))
                })
                .unwrap();
        }

        let billing = BillingCollector::build(&registry, &(), &tracing::Span::none()).unwrap();
        let (sink, mut rx) = MetricSink::channel();
        billing.collect(&sink).await;
        let samples = rx.drain();

        let up = up_values(&samples);
        assert_eq!(up_count(&samples), 10);
        assert_eq!(up.values().filter(|v| **v == 0.0).count(), 4);
        assert_eq!(up.values().filter(|v| **v == 1.0).count(), 6);
        assert_eq!(up["c3"], 0.0);
        assert_eq!(up["c4"], 1.0);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let mut registry = CollectorRegistry::new();
        registry
            .register("bad", true, |_| Ok(PanickingCollector))
            .unwrap();
        registry
            .register("good", true, |_| Ok(MockCollector::new("good", None)))
            .unwrap();

        let billing = BillingCollector::build(&registry, &(), &tracing::Span::none()).unwrap();
        let (sink, mut rx) = MetricSink::channel();
        billing.collect(&sink).await;

        let up = up_values(&rx.drain());
        assert_eq!(up["bad"], 0.0);
        assert_eq!(up["good"], 1.0);
    }

    #[tokio::test]
    async fn test_hanging_collector_delays_only_the_barrier() {
        let mut registry = CollectorRegistry::new();
        registry
            .register("hang", true, |_| Ok(HangingCollector))
            .unwrap();
        registry
            .register("fast", true, |_| Ok(MockCollector::new("fast", None)))
            .unwrap();

        let billing = BillingCollector::build(&registry, &(), &tracing::Span::none()).unwrap();
        let (sink, mut rx) = MetricSink::channel();

        let result = tokio::time::timeout(Duration::from_millis(200), billing.collect(&sink)).await;
        assert!(result.is_err(), "collect should not return while a collector hangs");

        let up = up_values(&rx.drain());
        assert_eq!(up.len(), 1);
        assert_eq!(up["fast"], 1.0);
    }

    #[tokio::test]
    async fn test_disabled_collector_is_never_constructed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = CollectorRegistry::new();
        let counter = Arc::clone(&calls);
        registry
            .register("off", false, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(MockCollector::new("off", None))
            })
            .unwrap();

        let billing = BillingCollector::build(&registry, &(), &tracing::Span::none()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(billing.active().count(), 0);

        let (sink, mut rx) = MetricSink::channel();
        billing.collect(&sink).await;
        assert!(rx.drain().is_empty());
    }

    #[tokio::test]
    async fn test_override_enables_default_disabled() {
        let mut registry = three_collectors();
        registry
            .apply_overrides(&EnablementOverrides::from([("B".to_string(), true)]))
            .unwrap();

        let billing = BillingCollector::build(&registry, &(), &tracing::Span::none()).unwrap();
        assert_eq!(billing.active().collect::<Vec<_>>(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_constructor_failure_fails_build() {
        let mut registry = CollectorRegistry::new();
        registry
            .register("ok", true, |_| Ok(MockCollector::new("ok", None)))
            .unwrap();
        registry
            .register("broken", true, |_| -> Result<MockCollector, CollectorError> {
                Err(CollectorError::Config("missing token".to_string()))
            })
            .unwrap();

        let err = BillingCollector::build(&registry, &(), &tracing::Span::none()).unwrap_err();
        match err {
            CollectorError::Build { collector, source } => {
                assert_eq!(collector, "broken");
                assert!(source.to_string().contains("missing token"));
            }
            other => panic!("expected Build error, got {other}"),
        }
    }

    #[test]
    fn test_constructor_receives_context() {
        let mut registry: CollectorRegistry<String> = CollectorRegistry::new();
        registry
            .register("ctx", true, |ctx| {
                assert_eq!(ctx.name(), "ctx");
                assert_eq!(ctx.shared(), "shared-value");
                Ok(MockCollector::new("ctx", None))
            })
            .unwrap();

        let shared = "shared-value".to_string();
        assert!(BillingCollector::build(&registry, &shared, &tracing::Span::none()).is_ok());
    }

    #[tokio::test]
    async fn test_describe_is_stable() {
        let billing =
            BillingCollector::build(&three_collectors(), &(), &tracing::Span::none()).unwrap();

        for _ in 0..3 {
            let descs = billing.describe();
            assert_eq!(descs.len(), 1);
            assert_eq!(descs[0].fq_name, "github_billing_up");
            assert_eq!(descs[0].help, UP_HELP);
            assert_eq!(descs[0].variable_labels, vec!["collector".to_string()]);
        }
    }

    #[tokio::test]
    async fn test_repeated_collect_one_up_per_collector() {
        let billing =
            BillingCollector::build(&three_collectors(), &(), &tracing::Span::none()).unwrap();

        for _ in 0..3 {
            let samples = billing.gather().await;
            assert_eq!(up_count(&samples), 2);
        }
    }

    #[tokio::test]
    async fn test_gather_merges_up_family() {
        let billing =
            BillingCollector::build(&three_collectors(), &(), &tracing::Span::none()).unwrap();

        let families = billing.gather().await;
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert_eq!(
            names,
            vec!["github_billing_up", "mock_a_value", "mock_c_value"]
        );
        assert_eq!(families[0].get_metric().len(), 2);
    }
}
