//! Customer, quota and creation-time statistics.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use nodeconductor_core::{AppError, AppResult, UserIdentity};
use nodeconductor_domain::{EntityKind, QuotaTotals, RoleScope, ScopeLevel, VisibleIds};
use serde::Serialize;
use uuid::Uuid;

use crate::{ScopeFilterService, StatsRepository, StructureListQuery, StructureRepository};

/// Visible entity counts of one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerStats {
    /// Customer id.
    pub customer_id: Uuid,
    /// Customer display name.
    pub name: String,
    /// Visible projects of the customer.
    pub projects: i64,
    /// Visible project groups of the customer.
    pub project_groups: i64,
    /// Visible instances across the customer's projects.
    pub instances: i64,
}

/// One bucket of the creation-time histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSegment {
    /// Segment start, unix seconds.
    pub from: i64,
    /// Segment end, unix seconds.
    pub to: i64,
    /// Entities created inside the segment.
    pub value: i64,
}

/// Creation-time histogram request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreationTimeQuery {
    /// Entity level whose creation times are counted.
    pub level: ScopeLevel,
    /// Range start.
    pub from: DateTime<Utc>,
    /// Range end, inclusive.
    pub to: DateTime<Utc>,
    /// Number of segments, `1..=MAX_DATAPOINTS`.
    pub datapoints: u32,
}

impl CreationTimeQuery {
    /// Default datapoint count.
    pub const DEFAULT_DATAPOINTS: u32 = 6;

    /// Largest accepted datapoint count.
    pub const MAX_DATAPOINTS: u32 = 500;

    /// Customers created during the last 30 days, in six segments.
    #[must_use]
    pub fn last_month(now: DateTime<Utc>) -> Self {
        Self {
            level: ScopeLevel::Customer,
            from: now - Duration::days(30),
            to: now,
            datapoints: Self::DEFAULT_DATAPOINTS,
        }
    }
}

/// Application service for the read-only statistics endpoints.
#[derive(Clone)]
pub struct StatsService {
    scope_filter: ScopeFilterService,
    structure_repository: Arc<dyn StructureRepository>,
    repository: Arc<dyn StatsRepository>,
}

impl StatsService {
    /// Creates a new statistics service.
    #[must_use]
    pub fn new(
        scope_filter: ScopeFilterService,
        structure_repository: Arc<dyn StructureRepository>,
        repository: Arc<dyn StatsRepository>,
    ) -> Self {
        Self {
            scope_filter,
            structure_repository,
            repository,
        }
    }

    /// Counts visible projects, project groups and instances per visible
    /// customer.
    pub async fn customer_stats(&self, actor: &UserIdentity) -> AppResult<Vec<CustomerStats>> {
        let resolved = self.scope_filter.resolve(actor).await?;
        let customers = self
            .scope_filter
            .visible_ids_within(&resolved, EntityKind::Customer)
            .await?;
        if customers.is_empty() {
            return Ok(Vec::new());
        }

        let customers = self
            .structure_repository
            .list_customers(&customers, &StructureListQuery::default())
            .await?;

        let mut counts = Vec::with_capacity(3);
        for kind in [
            EntityKind::Project,
            EntityKind::ProjectGroup,
            EntityKind::Instance,
        ] {
            let visible = self.scope_filter.visible_ids_within(&resolved, kind).await?;
            counts.push(self.repository.count_per_customer(kind, &visible).await?);
        }
        let count = |index: usize, customer_id: &Uuid| {
            counts
                .get(index)
                .and_then(|per_customer| per_customer.get(customer_id))
                .copied()
                .unwrap_or(0)
        };

        Ok(customers
            .into_iter()
            .map(|customer| CustomerStats {
                projects: count(0, &customer.id),
                project_groups: count(1, &customer.id),
                instances: count(2, &customer.id),
                customer_id: customer.id,
                name: customer.name.into(),
            })
            .collect())
    }

    /// Sums quotas and usage over visible memberships under the visible
    /// aggregate entities, optionally narrowed to one of them.
    pub async fn quota_stats(
        &self,
        actor: &UserIdentity,
        aggregate: ScopeLevel,
        aggregate_id: Option<Uuid>,
    ) -> AppResult<QuotaTotals> {
        let resolved = self.scope_filter.resolve(actor).await?;
        let mut aggregates = self
            .scope_filter
            .visible_ids_within(&resolved, EntityKind::from(aggregate))
            .await?;
        if let Some(aggregate_id) = aggregate_id {
            aggregates = aggregates.intersect(&VisibleIds::from_iter([aggregate_id]));
        }

        let under_aggregates = match aggregates {
            VisibleIds::Unrestricted => VisibleIds::Unrestricted,
            VisibleIds::Restricted(ids) => {
                let mut roots = RoleScope::default();
                match aggregate {
                    ScopeLevel::Customer => roots.customer_ids = ids,
                    ScopeLevel::ProjectGroup => roots.project_group_ids = ids,
                    ScopeLevel::Project => roots.project_ids = ids,
                }
                self.scope_filter
                    .ids_under(EntityKind::CloudProjectMembership, &roots)
                    .await?
            }
        };
        if under_aggregates.is_empty() {
            return Ok(QuotaTotals::default());
        }

        let visible_memberships = self
            .scope_filter
            .visible_ids_within(&resolved, EntityKind::CloudProjectMembership)
            .await?;
        let memberships = under_aggregates.intersect(&visible_memberships);
        if memberships.is_empty() {
            return Ok(QuotaTotals::default());
        }

        let rows = self.repository.list_membership_quotas(&memberships).await?;
        Ok(QuotaTotals::sum(&rows))
    }

    /// Counts visible entities created in evenly spaced segments.
    pub async fn creation_time_stats(
        &self,
        actor: &UserIdentity,
        query: CreationTimeQuery,
    ) -> AppResult<Vec<TimeSegment>> {
        if query.from >= query.to {
            return Err(AppError::Validation(
                "'from' must be earlier than 'to'".to_owned(),
            ));
        }
        if !(1..=CreationTimeQuery::MAX_DATAPOINTS).contains(&query.datapoints) {
            return Err(AppError::Validation(format!(
                "datapoints must be between 1 and {}",
                CreationTimeQuery::MAX_DATAPOINTS
            )));
        }

        let kind = EntityKind::from(query.level);
        let visible = self.scope_filter.visible_ids(actor, kind).await?;
        let created = if visible.is_empty() {
            Vec::new()
        } else {
            self.repository
                .list_creation_times(kind, &visible, query.from, query.to)
                .await?
        };

        Ok(segment_counts(
            query.from.timestamp(),
            query.to.timestamp(),
            query.datapoints,
            created.iter().map(DateTime::timestamp),
        ))
    }
}

/// Splits `[from, to]` into `datapoints` segments and counts timestamps per
/// segment. The last segment includes its end.
///
/// Bounds are computed in `i128` so any pair of `i64` timestamps is safe.
pub(crate) fn segment_counts(
    from: i64,
    to: i64,
    datapoints: u32,
    timestamps: impl IntoIterator<Item = i64>,
) -> Vec<TimeSegment> {
    let span = i128::from(to) - i128::from(from);
    let count = i128::from(datapoints.max(1));
    let bound = |index: i128| {
        let offset = span * index / count;
        i64::try_from(i128::from(from) + offset).unwrap_or(to)
    };
    let mut segments: Vec<TimeSegment> = (0..count)
        .map(|index| TimeSegment {
            from: bound(index),
            to: bound(index + 1),
            value: 0,
        })
        .collect();

    for timestamp in timestamps {
        if timestamp < from || timestamp > to {
            continue;
        }
        let index = if timestamp == to || span == 0 {
            count - 1
        } else {
            ((i128::from(timestamp) - i128::from(from)) * count / span).min(count - 1)
        };
        if let Some(segment) = usize::try_from(index)
            .ok()
            .and_then(|index| segments.get_mut(index))
        {
            segment.value += 1;
        }
    }

    segments
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use nodeconductor_core::AppError;
    use nodeconductor_domain::{
        MembershipQuotas, ResourceQuota, Role, ScopeLevel, SynchronizationState,
    };
    use proptest::prelude::*;

    use super::{CreationTimeQuery, StatsService, segment_counts};
    use crate::test_support::{FakeStore, scope_filter, user};

    fn service(store: &Arc<FakeStore>) -> StatsService {
        StatsService::new(scope_filter(store), store.clone(), store.clone())
    }

    fn quota(vcpu: i64) -> ResourceQuota {
        ResourceQuota {
            vcpu,
            ram: vcpu * 1024,
            storage: vcpu * 10,
            max_instances: vcpu,
            backup_storage: 0,
        }
    }

    #[tokio::test]
    async fn quota_totals_cover_visible_memberships_only() {
        let store = Arc::new(FakeStore::default());
        let owner = user(false);
        let customer_id = store.add_customer().await;
        let other_customer = store.add_customer().await;
        let project_id = store.add_project(customer_id, Vec::new()).await;
        let other_project = store.add_project(other_customer, Vec::new()).await;
        let cloud_id = store.add_cloud(customer_id).await;
        let with_quota = store
            .add_membership(cloud_id, project_id, SynchronizationState::InSync)
            .await;
        let second_project = store.add_project(customer_id, Vec::new()).await;
        let without_quota = store
            .add_membership(cloud_id, second_project, SynchronizationState::InSync)
            .await;
        let foreign = store
            .add_membership(cloud_id, other_project, SynchronizationState::InSync)
            .await;
        store
            .add_role(owner.user_id(), ScopeLevel::Customer, customer_id, Role::Owner)
            .await;
        {
            let mut state = store.state.lock().await;
            state.quotas.push(MembershipQuotas {
                membership_id: with_quota,
                quota: Some(quota(4)),
                usage: Some(quota(1)),
            });
            state.quotas.push(MembershipQuotas {
                membership_id: without_quota,
                quota: None,
                usage: None,
            });
            state.quotas.push(MembershipQuotas {
                membership_id: foreign,
                quota: Some(quota(100)),
                usage: None,
            });
        }

        let totals = service(&store)
            .quota_stats(&owner, ScopeLevel::Customer, None)
            .await
            .unwrap_or_default();

        assert_eq!(totals.vcpu, 4);
        assert_eq!(totals.vcpu_usage, 1);
        assert_eq!(totals.ram, 4096);
    }

    #[tokio::test]
    async fn quota_stats_for_invisible_aggregate_are_zero() {
        let store = Arc::new(FakeStore::default());
        let customer_id = store.add_customer().await;

        let totals = service(&store)
            .quota_stats(&user(false), ScopeLevel::Customer, Some(customer_id))
            .await;

        assert!(totals.is_ok_and(|totals| totals == nodeconductor_domain::QuotaTotals::default()));
    }

    #[tokio::test]
    async fn customer_stats_count_visible_entities() {
        let store = Arc::new(FakeStore::default());
        let customer_id = store.add_customer().await;
        let group_id = store.add_project_group(customer_id).await;
        store.add_project(customer_id, vec![group_id]).await;
        store.add_project(customer_id, Vec::new()).await;

        let stats = service(&store)
            .customer_stats(&user(true))
            .await
            .unwrap_or_default();

        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].projects, 2);
        assert_eq!(stats[0].project_groups, 1);
        assert_eq!(stats[0].instances, 0);
    }

    #[tokio::test]
    async fn creation_stats_reject_inverted_range() {
        let store = Arc::new(FakeStore::default());
        let now = Utc::now();
        let query = CreationTimeQuery {
            from: now,
            to: now - Duration::days(1),
            ..CreationTimeQuery::last_month(now)
        };

        let result = service(&store).creation_time_stats(&user(true), query).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn creation_stats_count_new_customers_in_last_segment() {
        let store = Arc::new(FakeStore::default());
        store.add_customer().await;
        store.add_customer().await;

        let query = CreationTimeQuery::last_month(Utc::now() + Duration::seconds(5));
        let segments = service(&store)
            .creation_time_stats(&user(true), query)
            .await
            .unwrap_or_default();

        assert_eq!(segments.len(), 6);
        assert_eq!(segments.last().map(|segment| segment.value), Some(2));
    }

    #[tokio::test]
    async fn creation_stats_reject_too_many_datapoints() {
        let store = Arc::new(FakeStore::default());
        let query = CreationTimeQuery {
            datapoints: CreationTimeQuery::MAX_DATAPOINTS + 1,
            ..CreationTimeQuery::last_month(Utc::now())
        };

        let result = service(&store).creation_time_stats(&user(true), query).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn extreme_ranges_do_not_overflow() {
        let (from, to) = (i64::MIN, i64::MAX);
        let segments = segment_counts(from, to, CreationTimeQuery::MAX_DATAPOINTS, [0, from, to]);

        assert_eq!(segments.len(), CreationTimeQuery::MAX_DATAPOINTS as usize);
        assert_eq!(segments.first().map(|segment| segment.from), Some(from));
        assert_eq!(segments.last().map(|segment| segment.to), Some(to));
        assert!(segments.windows(2).all(|pair| pair[0].to == pair[1].from));
        assert_eq!(segments.iter().map(|segment| segment.value).sum::<i64>(), 3);
    }

    #[test]
    fn segments_are_contiguous() {
        let segments = segment_counts(0, 100, 3, [0, 50, 100]);
        assert_eq!(segments[0].from, 0);
        assert_eq!(segments[0].to, segments[1].from);
        assert_eq!(segments[2].to, 100);
        assert_eq!(
            segments.iter().map(|segment| segment.value).collect::<Vec<_>>(),
            vec![1, 1, 1]
        );
    }

    proptest! {
        #[test]
        fn every_timestamp_in_range_is_counted_once(
            from in 0_i64..1_000_000,
            span in 1_i64..1_000_000,
            datapoints in 1_u32..24,
            offsets in proptest::collection::vec(0_i64..1_000_000, 0..50),
        ) {
            let to = from + span;
            let timestamps: Vec<i64> = offsets.iter().map(|offset| from + offset % (span + 1)).collect();
            let segments = segment_counts(from, to, datapoints, timestamps.iter().copied());

            prop_assert_eq!(segments.len(), datapoints as usize);
            prop_assert_eq!(
                segments.iter().map(|segment| segment.value).sum::<i64>(),
                timestamps.len() as i64
            );
        }
    }
}
