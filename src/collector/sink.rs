//! Shared metric sink used by concurrently running collectors.
//!
//! Every [`MetricSink::send`] pushes one complete sample through an unbounded
//! MPSC channel, so writes from parallel tasks never interleave. The caller of
//! a collection cycle owns the [`MetricReceiver`] and drains it once the cycle
//! has returned.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use prometheus::core::Desc;
use prometheus::proto::{self, LabelPair, Metric, MetricFamily, MetricType};
use tokio::sync::mpsc;

use crate::collector::CollectorError;

/// Write-only handle to the metric channel.
#[derive(Debug, Clone)]
pub struct MetricSink {
    tx: mpsc::UnboundedSender<MetricFamily>,
}

/// Receiving half of a metric channel, owned by the caller of `collect`.
#[derive(Debug)]
pub struct MetricReceiver {
    rx: mpsc::UnboundedReceiver<MetricFamily>,
}

impl MetricSink {
    /// Create a connected sink/receiver pair.
    pub fn channel() -> (Self, MetricReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, MetricReceiver { rx })
    }

    /// Send one sample.
    ///
    /// # Errors
    /// Returns `CollectorError::SinkClosed` if the receiver was dropped.
    pub fn send(&self, family: MetricFamily) -> Result<(), CollectorError> {
        self.tx
            .send(family)
            .map_err(|_| CollectorError::SinkClosed)
    }

    /// Send a constant gauge sample for `desc`.
    pub fn gauge(&self, desc: &Desc, value: f64, label_values: &[&str]) -> Result<(), CollectorError> {
        self.send(const_metric(desc, MetricType::GAUGE, value, label_values)?)
    }
}

impl MetricReceiver {
    /// Take every sample currently buffered without waiting.
    pub fn drain(&mut self) -> Vec<MetricFamily> {
        let mut samples = Vec::new();
        while let Ok(family) = self.rx.try_recv() {
            samples.push(family);
        }
        samples
    }
}

/// Build a single-sample metric family for `desc`.
///
/// Label values are paired with the descriptor's variable labels in order;
/// constant labels from the descriptor are included. Pairs are sorted by name.
///
/// # Errors
/// Returns `CollectorError::LabelMismatch` if the number of label values
/// differs from the descriptor's variable labels.
pub fn const_metric(
    desc: &Desc,
    metric_type: MetricType,
    value: f64,
    label_values: &[&str],
) -> Result<MetricFamily, CollectorError> {
    if desc.variable_labels.len() != label_values.len() {
        return Err(CollectorError::LabelMismatch {
            metric: desc.fq_name.clone(),
            expected: desc.variable_labels.len(),
            got: label_values.len(),
        });
    }

    let mut labels: Vec<LabelPair> = desc.const_label_pairs.clone();
    for (name, value) in desc.variable_labels.iter().zip(label_values) {
        let mut pair = LabelPair::default();
        pair.set_name(name.clone());
        pair.set_value((*value).to_string());
        labels.push(pair);
    }
    labels.sort_by(|a, b| a.get_name().cmp(b.get_name()));

    let mut metric = Metric::default();
    metric.set_label(labels.into());
    match metric_type {
        MetricType::COUNTER => {
            let mut counter = proto::Counter::default();
            counter.set_value(value);
            metric.set_counter(counter);
        }
        MetricType::GAUGE => {
            let mut gauge = proto::Gauge::default();
            gauge.set_value(value);
            metric.set_gauge(gauge);
        }
        _ => {
            let mut untyped = proto::Untyped::default();
            untyped.set_value(value);
            metric.set_untyped(untyped);
        }
    }

    let mut family = MetricFamily::default();
    family.set_name(desc.fq_name.clone());
    family.set_help(desc.help.clone());
    family.set_field_type(metric_type);
    family.set_metric(vec![metric].into());
    Ok(family)
}

/// Merge samples into one family per metric name.
///
/// Families come out sorted by name and their metrics sorted by label values,
/// which is the shape text exposition expects.
pub fn merge_families(samples: Vec<MetricFamily>) -> Vec<MetricFamily> {
    let mut merged: BTreeMap<String, MetricFamily> = BTreeMap::new();

    for mut family in samples {
        match merged.entry(family.get_name().to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(family);
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                for metric in family.take_metric().into_vec() {
                    existing.mut_metric().push(metric);
                }
            }
        }
    }

    merged
        .into_values()
        .map(|mut family| {
            let mut metrics = family.take_metric().into_vec();
            metrics.sort_by(|a, b| label_values(a).cmp(&label_values(b)));
            family.set_metric(metrics.into());
            family
        })
        .collect()
}

fn label_values(metric: &Metric) -> Vec<&str> {
    metric.get_label().iter().map(|l| l.get_value()).collect()
}
