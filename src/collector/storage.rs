//! Shared storage (Actions artifacts and Packages) usage.

use std::sync::Arc;

use prometheus::core::Desc;

use crate::collector::billing::{BillingContext, billing_desc, for_each_org};
use crate::collector::{Collector, CollectorError, MetricSink};
use crate::github::{GithubClient, SharedStorageBilling};

const SUBSYSTEM: &str = "storage";

/// Reports shared storage estimates per organization.
pub struct StorageCollector {
    client: GithubClient,
    orgs: Arc<[String]>,
    days_left: Desc,
    estimated_paid: Desc,
    estimated: Desc,
}

impl StorageCollector {
    /// Registry name.
    pub const NAME: &'static str = "storage";

    /// Fails when no organization is configured.
    pub fn new(ctx: &BillingContext) -> Result<Self, CollectorError> {
        Ok(Self {
            client: ctx.client.clone(),
            orgs: ctx.require_orgs()?,
            days_left: billing_desc(
                SUBSYSTEM,
                "days_left_in_billing_cycle",
                "Days left in the current billing cycle",
                &[],
            )?,
            estimated_paid: billing_desc(
                SUBSYSTEM,
                "estimated_paid_storage_for_month",
                "Estimated paid shared storage for the month, in gigabytes",
                &[],
            )?,
            estimated: billing_desc(
                SUBSYSTEM,
                "estimated_storage_for_month",
                "Estimated shared storage for the month, in gigabytes",
                &[],
            )?,
        })
    }

    fn emit(
        &self,
        sink: &MetricSink,
        org: &str,
        billing: &SharedStorageBilling,
    ) -> Result<(), CollectorError> {
        sink.gauge(&self.days_left, billing.days_left_in_billing_cycle, &[org])?;
        sink.gauge(&self.estimated_paid, billing.estimated_paid_storage_for_month, &[org])?;
        sink.gauge(&self.estimated, billing.estimated_storage_for_month, &[org])
    }
}

#[async_trait::async_trait]
impl Collector for StorageCollector {
    async fn update(&self, sink: &MetricSink) -> Result<(), CollectorError> {
        for_each_org(&self.orgs, |org| async move {
            let billing = self.client.shared_storage_billing(org).await?;
            self.emit(sink, org, &billing)
        })
        .await
    }
}
