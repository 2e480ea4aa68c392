use nodeconductor_application::{CustomerStats, TimeSegment};
use nodeconductor_domain::QuotaTotals;
use serde::Serialize;
use uuid::Uuid;

/// Visible entity counts of one customer.
#[derive(Debug, Serialize)]
pub struct CustomerStatsResponse {
    pub customer_id: Uuid,
    pub name: String,
    pub projects: i64,
    pub project_groups: i64,
    pub instances: i64,
}

impl From<CustomerStats> for CustomerStatsResponse {
    fn from(stats: CustomerStats) -> Self {
        Self {
            customer_id: stats.customer_id,
            name: stats.name,
            projects: stats.projects,
            project_groups: stats.project_groups,
            instances: stats.instances,
        }
    }
}

/// Summed quotas and usage over the visible memberships.
#[derive(Debug, Serialize)]
pub struct QuotaStatsResponse {
    pub vcpu: i64,
    pub ram: i64,
    pub storage: i64,
    pub max_instances: i64,
    pub backup_storage: i64,
    pub vcpu_usage: i64,
    pub ram_usage: i64,
    pub storage_usage: i64,
    pub max_instances_usage: i64,
    pub backup_storage_usage: i64,
}

impl From<QuotaTotals> for QuotaStatsResponse {
    fn from(totals: QuotaTotals) -> Self {
        Self {
            vcpu: totals.vcpu,
            ram: totals.ram,
            storage: totals.storage,
            max_instances: totals.max_instances,
            backup_storage: totals.backup_storage,
            vcpu_usage: totals.vcpu_usage,
            ram_usage: totals.ram_usage,
            storage_usage: totals.storage_usage,
            max_instances_usage: totals.max_instances_usage,
            backup_storage_usage: totals.backup_storage_usage,
        }
    }
}

/// One bucket of the creation-time histogram, in unix seconds.
#[derive(Debug, Serialize)]
pub struct TimeSegmentResponse {
    pub from: i64,
    pub to: i64,
    pub value: i64,
}

impl From<TimeSegment> for TimeSegmentResponse {
    fn from(segment: TimeSegment) -> Self {
        Self {
            from: segment.from,
            to: segment.to,
            value: segment.value,
        }
    }
}
