//! PostgreSQL-backed clouds, flavors, memberships and security groups.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nodeconductor_application::{
    CloudListQuery, CloudRepository, NewTask, SecurityGroupListQuery,
};
use nodeconductor_core::{AppError, AppResult, NonEmptyString};
use nodeconductor_domain::{
    Cloud, CloudProjectMembership, Flavor, SecurityGroup, SecurityGroupRule,
    SynchronizationState, VisibleIds,
};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::postgres_errors::{reference_conflict_or_internal, unique_conflict_or_internal};
use crate::postgres_task_queue_repository::insert_task;

/// PostgreSQL implementation of the cloud repository port.
#[derive(Clone)]
pub struct PostgresCloudRepository {
    pool: PgPool,
}

impl PostgresCloudRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CloudRow {
    id: Uuid,
    customer_id: Uuid,
    name: String,
    auth_url: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<CloudRow> for Cloud {
    type Error = AppError;

    fn try_from(row: CloudRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            customer_id: row.customer_id,
            name: NonEmptyString::new(row.name)?,
            auth_url: row.auth_url,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct FlavorRow {
    id: Uuid,
    cloud_id: Uuid,
    name: String,
    cores: i32,
    ram: i32,
    disk: i32,
}

impl From<FlavorRow> for Flavor {
    fn from(row: FlavorRow) -> Self {
        Self {
            id: row.id,
            cloud_id: row.cloud_id,
            name: row.name,
            cores: row.cores,
            ram: row.ram,
            disk: row.disk,
        }
    }
}

#[derive(Debug, FromRow)]
struct MembershipRow {
    id: Uuid,
    cloud_id: Uuid,
    project_id: Uuid,
    tenant_id: Option<String>,
    state: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MembershipRow> for CloudProjectMembership {
    type Error = AppError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            cloud_id: row.cloud_id,
            project_id: row.project_id,
            tenant_id: row.tenant_id,
            state: SynchronizationState::from_str(row.state.as_str())?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SecurityGroupRow {
    id: Uuid,
    membership_id: Uuid,
    name: String,
    description: Option<String>,
    rules: Value,
}

impl TryFrom<SecurityGroupRow> for SecurityGroup {
    type Error = AppError;

    fn try_from(row: SecurityGroupRow) -> Result<Self, Self::Error> {
        let rules: Vec<SecurityGroupRule> = serde_json::from_value(row.rules).map_err(|error| {
            AppError::Internal(format!(
                "stored rules of security group '{}' are invalid: {error}",
                row.id
            ))
        })?;

        Ok(Self {
            id: row.id,
            membership_id: row.membership_id,
            name: NonEmptyString::new(row.name)?,
            description: row.description,
            rules,
        })
    }
}

mod memberships;

#[cfg(test)]
mod tests;

#[async_trait]
impl CloudRepository for PostgresCloudRepository {
    async fn list_clouds(
        &self,
        visible: &VisibleIds,
        query: &CloudListQuery,
    ) -> AppResult<Vec<Cloud>> {
        let rows = sqlx::query_as::<_, CloudRow>(
            r#"
            SELECT id, customer_id, name, auth_url, created_at
            FROM clouds
            WHERE ($1::UUID[] IS NULL OR id = ANY($1))
              AND ($2::TEXT IS NULL OR name ILIKE '%' || $2 || '%')
              AND ($3::UUID IS NULL OR customer_id = $3)
            ORDER BY name ASC, id ASC
            "#,
        )
        .bind(visible.to_bind())
        .bind(query.name.as_deref())
        .bind(query.customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list clouds: {error}")))?;

        rows.into_iter().map(Cloud::try_from).collect()
    }

    async fn find_cloud(&self, cloud_id: Uuid) -> AppResult<Option<Cloud>> {
        let row = sqlx::query_as::<_, CloudRow>(
            "SELECT id, customer_id, name, auth_url, created_at FROM clouds WHERE id = $1",
        )
        .bind(cloud_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find cloud '{cloud_id}': {error}"))
        })?;

        row.map(Cloud::try_from).transpose()
    }

    async fn create_cloud(&self, cloud: Cloud, task: NewTask) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start cloud create transaction: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO clouds (id, customer_id, name, auth_url, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(cloud.id)
        .bind(cloud.customer_id)
        .bind(cloud.name.as_str())
        .bind(cloud.auth_url.as_str())
        .bind(cloud.created_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            reference_conflict_or_internal(
                error,
                "customer of the cloud does not exist",
                "create cloud",
            )
        })?;

        insert_task(&mut *transaction, &task).await?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit cloud create transaction: {error}"))
        })?;

        Ok(())
    }

    async fn list_flavors(
        &self,
        visible: &VisibleIds,
        cloud_id: Option<Uuid>,
    ) -> AppResult<Vec<Flavor>> {
        let rows = sqlx::query_as::<_, FlavorRow>(
            r#"
            SELECT id, cloud_id, name, cores, ram, disk
            FROM flavors
            WHERE ($1::UUID[] IS NULL OR id = ANY($1))
              AND ($2::UUID IS NULL OR cloud_id = $2)
            ORDER BY cores ASC, ram ASC, name ASC
            "#,
        )
        .bind(visible.to_bind())
        .bind(cloud_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list flavors: {error}")))?;

        Ok(rows.into_iter().map(Flavor::from).collect())
    }

    async fn find_flavor(&self, flavor_id: Uuid) -> AppResult<Option<Flavor>> {
        let row = sqlx::query_as::<_, FlavorRow>(
            "SELECT id, cloud_id, name, cores, ram, disk FROM flavors WHERE id = $1",
        )
        .bind(flavor_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find flavor '{flavor_id}': {error}"))
        })?;

        Ok(row.map(Flavor::from))
    }

    async fn upsert_flavors(&self, cloud_id: Uuid, flavors: Vec<Flavor>) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start flavor sync transaction: {error}"))
        })?;

        for flavor in &flavors {
            sqlx::query(
                r#"
                INSERT INTO flavors (id, cloud_id, name, cores, ram, disk)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (cloud_id, name)
                DO UPDATE SET
                    cores = EXCLUDED.cores,
                    ram = EXCLUDED.ram,
                    disk = EXCLUDED.disk
                "#,
            )
            .bind(flavor.id)
            .bind(cloud_id)
            .bind(flavor.name.as_str())
            .bind(flavor.cores)
            .bind(flavor.ram)
            .bind(flavor.disk)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to upsert flavor '{}' of cloud '{cloud_id}': {error}",
                    flavor.name
                ))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit flavor sync transaction: {error}"))
        })?;

        Ok(())
    }

    async fn list_memberships(
        &self,
        visible: &VisibleIds,
    ) -> AppResult<Vec<CloudProjectMembership>> {
        self.list_memberships_impl(visible).await
    }

    async fn find_membership(
        &self,
        membership_id: Uuid,
    ) -> AppResult<Option<CloudProjectMembership>> {
        self.find_membership_impl(membership_id).await
    }

    async fn find_membership_by_link(
        &self,
        cloud_id: Uuid,
        project_id: Uuid,
    ) -> AppResult<Option<CloudProjectMembership>> {
        self.find_membership_by_link_impl(cloud_id, project_id)
            .await
    }

    async fn create_membership(
        &self,
        membership: CloudProjectMembership,
        security_groups: Vec<SecurityGroup>,
        task: NewTask,
    ) -> AppResult<()> {
        self.create_membership_impl(membership, security_groups, task)
            .await
    }

    async fn set_membership_state(
        &self,
        membership_id: Uuid,
        state: SynchronizationState,
        tenant_id: Option<String>,
    ) -> AppResult<()> {
        self.set_membership_state_impl(membership_id, state, tenant_id)
            .await
    }

    async fn list_security_groups(
        &self,
        visible: &VisibleIds,
        query: &SecurityGroupListQuery,
    ) -> AppResult<Vec<SecurityGroup>> {
        self.list_security_groups_impl(visible, query).await
    }

    async fn list_membership_security_groups(
        &self,
        membership_id: Uuid,
    ) -> AppResult<Vec<SecurityGroup>> {
        self.list_membership_security_groups_impl(membership_id)
            .await
    }
}
