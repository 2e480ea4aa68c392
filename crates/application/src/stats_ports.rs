use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nodeconductor_core::AppResult;
use nodeconductor_domain::{EntityKind, MembershipQuotas, VisibleIds};
use uuid::Uuid;

/// Read-only aggregate queries backing the statistics endpoints.
#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Counts visible entities of `kind` grouped by owning customer.
    ///
    /// Supported kinds are project, project group and instance.
    async fn count_per_customer(
        &self,
        kind: EntityKind,
        visible: &VisibleIds,
    ) -> AppResult<BTreeMap<Uuid, i64>>;

    /// Returns quota and usage rows of the given memberships.
    async fn list_membership_quotas(
        &self,
        memberships: &VisibleIds,
    ) -> AppResult<Vec<MembershipQuotas>>;

    /// Returns creation timestamps of visible entities inside `[from, to]`.
    async fn list_creation_times(
        &self,
        kind: EntityKind,
        visible: &VisibleIds,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<DateTime<Utc>>>;
}
