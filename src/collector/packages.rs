//! GitHub Packages bandwidth usage.

use std::sync::Arc;

use prometheus::core::Desc;

use crate::collector::billing::{BillingContext, billing_desc, for_each_org};
use crate::collector::{Collector, CollectorError, MetricSink};
use crate::github::{GithubClient, PackagesBilling};

const SUBSYSTEM: &str = "packages";

/// Reports Packages bandwidth per organization.
pub struct PackagesCollector {
    client: GithubClient,
    orgs: Arc<[String]>,
    total_bandwidth_used: Desc,
    total_paid_bandwidth_used: Desc,
    included_bandwidth: Desc,
}

impl PackagesCollector {
    /// Registry name.
    pub const NAME: &'static str = "packages";

    /// Fails when no organization is configured.
    pub fn new(ctx: &BillingContext) -> Result<Self, CollectorError> {
        Ok(Self {
            client: ctx.client.clone(),
            orgs: ctx.require_orgs()?,
            total_bandwidth_used: billing_desc(
                SUBSYSTEM,
                "total_gigabytes_bandwidth_used",
                "Total GitHub Packages bandwidth used, in gigabytes",
                &[],
            )?,
            total_paid_bandwidth_used: billing_desc(
                SUBSYSTEM,
                "total_paid_gigabytes_bandwidth_used",
                "Paid GitHub Packages bandwidth used, in gigabytes",
                &[],
            )?,
            included_bandwidth: billing_desc(
                SUBSYSTEM,
                "included_gigabytes_bandwidth",
                "GitHub Packages bandwidth included in the plan, in gigabytes",
                &[],
            )?,
        })
    }

    fn emit(&self, sink: &MetricSink, org: &str, billing: &PackagesBilling) -> Result<(), CollectorError> {
        sink.gauge(&self.total_bandwidth_used, billing.total_gigabytes_bandwidth_used, &[org])?;
        sink.gauge(
            &self.total_paid_bandwidth_used,
            billing.total_paid_gigabytes_bandwidth_used,
            &[org],
        )?;
        sink.gauge(&self.included_bandwidth, billing.included_gigabytes_bandwidth, &[org])
    }
}

#[async_trait::async_trait]
impl Collector for PackagesCollector {
    async fn update(&self, sink: &MetricSink) -> Result<(), CollectorError> {
        for_each_org(&self.orgs, |org| async move {
            let billing = self.client.packages_billing(org).await?;
            self.emit(sink, org, &billing)
        })
        .await
    }
}
