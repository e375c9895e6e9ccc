//! GitHub Actions minutes usage.

use std::sync::Arc;

use prometheus::core::Desc;

use crate::collector::billing::{BillingContext, billing_desc, for_each_org};
use crate::collector::{Collector, CollectorError, MetricSink};
use crate::github::{ActionsBilling, GithubClient};

const SUBSYSTEM: &str = "actions";

/// Reports Actions minutes per organization and runner OS.
pub struct ActionsCollector {
    client: GithubClient,
    orgs: Arc<[String]>,
    total_minutes_used: Desc,
    total_paid_minutes_used: Desc,
    included_minutes: Desc,
    minutes_used_breakdown: Desc,
}

impl ActionsCollector {
    /// Registry name.
    pub const NAME: &'static str = "actions";

    /// Fails when no organization is configured.
    pub fn new(ctx: &BillingContext) -> Result<Self, CollectorError> {
        Ok(Self {
            client: ctx.client.clone(),
            orgs: ctx.require_orgs()?,
            total_minutes_used: billing_desc(
                SUBSYSTEM,
                "total_minutes_used",
                "Total GitHub Actions minutes used in the billing cycle",
                &[],
            )?,
            total_paid_minutes_used: billing_desc(
                SUBSYSTEM,
                "total_paid_minutes_used",
                "Paid GitHub Actions minutes used in the billing cycle",
                &[],
            )?,
            included_minutes: billing_desc(
                SUBSYSTEM,
                "included_minutes",
                "GitHub Actions minutes included in the plan",
                &[],
            )?,
            minutes_used_breakdown: billing_desc(
                SUBSYSTEM,
                "minutes_used_breakdown",
                "GitHub Actions minutes used per runner type",
                &["runner"],
            )?,
        })
    }

    fn emit(&self, sink: &MetricSink, org: &str, billing: &ActionsBilling) -> Result<(), CollectorError> {
        sink.gauge(&self.total_minutes_used, billing.total_minutes_used, &[org])?;
        sink.gauge(&self.total_paid_minutes_used, billing.total_paid_minutes_used, &[org])?;
        sink.gauge(&self.included_minutes, billing.included_minutes, &[org])?;
        for (runner, minutes) in &billing.minutes_used_breakdown {
            sink.gauge(&self.minutes_used_breakdown, *minutes, &[org, runner.as_str()])?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Collector for ActionsCollector {
    async fn update(&self, sink: &MetricSink) -> Result<(), CollectorError> {
        for_each_org(&self.orgs, |org| async move {
            let billing = self.client.actions_billing(org).await?;
            self.emit(sink, org, &billing)
        })
        .await
    }
}
