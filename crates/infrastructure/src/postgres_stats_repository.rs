//! Aggregate queries for the statistics endpoints.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nodeconductor_application::StatsRepository;
use nodeconductor_core::{AppError, AppResult};
use nodeconductor_domain::{EntityKind, MembershipQuotas, ResourceQuota, VisibleIds};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// PostgreSQL implementation of the statistics port.
#[derive(Clone)]
pub struct PostgresStatsRepository {
    pool: PgPool,
}

impl PostgresStatsRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CustomerCountRow {
    customer_id: Uuid,
    total: i64,
}

#[derive(Debug, FromRow)]
struct MembershipQuotaRow {
    membership_id: Uuid,
    has_quota: bool,
    quota_vcpu: Option<i64>,
    quota_ram: Option<i64>,
    quota_storage: Option<i64>,
    quota_max_instances: Option<i64>,
    quota_backup_storage: Option<i64>,
    has_usage: bool,
    usage_vcpu: Option<i64>,
    usage_ram: Option<i64>,
    usage_storage: Option<i64>,
    usage_max_instances: Option<i64>,
    usage_backup_storage: Option<i64>,
}

impl From<MembershipQuotaRow> for MembershipQuotas {
    fn from(row: MembershipQuotaRow) -> Self {
        let quota = row.has_quota.then(|| ResourceQuota {
            vcpu: row.quota_vcpu.unwrap_or_default(),
            ram: row.quota_ram.unwrap_or_default(),
            storage: row.quota_storage.unwrap_or_default(),
            max_instances: row.quota_max_instances.unwrap_or_default(),
            backup_storage: row.quota_backup_storage.unwrap_or_default(),
        });
        let usage = row.has_usage.then(|| ResourceQuota {
            vcpu: row.usage_vcpu.unwrap_or_default(),
            ram: row.usage_ram.unwrap_or_default(),
            storage: row.usage_storage.unwrap_or_default(),
            max_instances: row.usage_max_instances.unwrap_or_default(),
            backup_storage: row.usage_backup_storage.unwrap_or_default(),
        });

        Self {
            membership_id: row.membership_id,
            quota,
            usage,
        }
    }
}

fn count_statement(kind: EntityKind) -> AppResult<&'static str> {
    match kind {
        EntityKind::Project => Ok(r#"
            SELECT customer_id, COUNT(*) AS total
            FROM projects
            WHERE ($1::UUID[] IS NULL OR id = ANY($1))
            GROUP BY customer_id
            "#),
        EntityKind::ProjectGroup => Ok(r#"
            SELECT customer_id, COUNT(*) AS total
            FROM project_groups
            WHERE ($1::UUID[] IS NULL OR id = ANY($1))
            GROUP BY customer_id
            "#),
        EntityKind::Instance => Ok(r#"
            SELECT projects.customer_id, COUNT(*) AS total
            FROM instances
            INNER JOIN cloud_project_memberships memberships ON memberships.id = instances.membership_id
            INNER JOIN projects ON projects.id = memberships.project_id
            WHERE ($1::UUID[] IS NULL OR instances.id = ANY($1))
            GROUP BY projects.customer_id
            "#),
        other => Err(AppError::Validation(format!(
            "per-customer counts are not available for {}",
            other.as_str()
        ))),
    }
}

fn creation_table(kind: EntityKind) -> AppResult<&'static str> {
    match kind {
        EntityKind::Customer => Ok("customers"),
        EntityKind::ProjectGroup => Ok("project_groups"),
        EntityKind::Project => Ok("projects"),
        EntityKind::Instance => Ok("instances"),
        other => Err(AppError::Validation(format!(
            "creation statistics are not available for {}",
            other.as_str()
        ))),
    }
}

#[async_trait]
impl StatsRepository for PostgresStatsRepository {
    async fn count_per_customer(
        &self,
        kind: EntityKind,
        visible: &VisibleIds,
    ) -> AppResult<BTreeMap<Uuid, i64>> {
        let rows = sqlx::query_as::<_, CustomerCountRow>(count_statement(kind)?)
            .bind(visible.to_bind())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to count {} per customer: {error}",
                    kind.as_str()
                ))
            })?;

        Ok(rows
            .into_iter()
            .map(|row| (row.customer_id, row.total))
            .collect())
    }

    async fn list_membership_quotas(
        &self,
        memberships: &VisibleIds,
    ) -> AppResult<Vec<MembershipQuotas>> {
        let rows = sqlx::query_as::<_, MembershipQuotaRow>(
            r#"
            SELECT
                memberships.id AS membership_id,
                quota.membership_id IS NOT NULL AS has_quota,
                quota.vcpu AS quota_vcpu,
                quota.ram AS quota_ram,
                quota.storage AS quota_storage,
                quota.max_instances AS quota_max_instances,
                quota.backup_storage AS quota_backup_storage,
                usage.membership_id IS NOT NULL AS has_usage,
                usage.vcpu AS usage_vcpu,
                usage.ram AS usage_ram,
                usage.storage AS usage_storage,
                usage.max_instances AS usage_max_instances,
                usage.backup_storage AS usage_backup_storage
            FROM cloud_project_memberships memberships
            LEFT JOIN membership_resource_quotas quota
                ON quota.membership_id = memberships.id AND quota.kind = 'quota'
            LEFT JOIN membership_resource_quotas usage
                ON usage.membership_id = memberships.id AND usage.kind = 'usage'
            WHERE ($1::UUID[] IS NULL OR memberships.id = ANY($1))
            ORDER BY memberships.id
            "#,
        )
        .bind(memberships.to_bind())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list membership quotas: {error}"))
        })?;

        Ok(rows.into_iter().map(MembershipQuotas::from).collect())
    }

    async fn list_creation_times(
        &self,
        kind: EntityKind,
        visible: &VisibleIds,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<DateTime<Utc>>> {
        let statement = format!(
            r#"
            SELECT created_at
            FROM {}
            WHERE ($1::UUID[] IS NULL OR id = ANY($1))
              AND created_at >= $2
              AND created_at <= $3
            ORDER BY created_at ASC
            "#,
            creation_table(kind)?
        );

        sqlx::query_scalar::<_, DateTime<Utc>>(statement.as_str())
            .bind(visible.to_bind())
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to list creation times of {}: {error}",
                    kind.as_str()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use nodeconductor_application::StatsRepository;
    use nodeconductor_domain::{EntityKind, VisibleIds};

    use super::PostgresStatsRepository;
    use crate::postgres_test_support::{insert_customer, insert_instance, insert_project, test_pool};

    #[tokio::test]
    async fn memberships_without_quota_rows_report_none() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let repository = PostgresStatsRepository::new(pool.clone());
        let customer_id = insert_customer(&pool).await;
        let project_id = insert_project(&pool, customer_id).await;
        let (_, membership_id, _) = insert_instance(&pool, customer_id, project_id, "online").await;

        let inserted = sqlx::query(
            r#"
            INSERT INTO membership_resource_quotas (membership_id, kind, vcpu, ram, storage, max_instances, backup_storage)
            VALUES ($1, 'quota', 4, 4096, 102400, 5, 20480)
            "#,
        )
        .bind(membership_id)
        .execute(&pool)
        .await;
        assert!(inserted.is_ok());

        let quotas = repository
            .list_membership_quotas(&VisibleIds::Restricted([membership_id].into_iter().collect()))
            .await
            .unwrap_or_default();

        assert_eq!(quotas.len(), 1);
        assert!(quotas[0].quota.is_some_and(|quota| quota.vcpu == 4));
        assert!(quotas[0].usage.is_none());
    }

    #[tokio::test]
    async fn instances_are_counted_under_their_customer() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let repository = PostgresStatsRepository::new(pool.clone());
        let customer_id = insert_customer(&pool).await;
        let project_id = insert_project(&pool, customer_id).await;
        let (_, _, instance_id) = insert_instance(&pool, customer_id, project_id, "online").await;

        let counts = repository
            .count_per_customer(
                EntityKind::Instance,
                &VisibleIds::Restricted([instance_id].into_iter().collect()),
            )
            .await
            .unwrap_or_default();

        assert_eq!(counts.get(&customer_id), Some(&1));
    }
}
