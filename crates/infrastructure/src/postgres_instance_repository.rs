//! PostgreSQL-backed instances.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nodeconductor_application::{
    InstanceListQuery, InstanceOrdering, InstanceRepository, InstanceUpdate, NewTask,
};
use nodeconductor_core::{AppError, AppResult, NonEmptyString};
use nodeconductor_domain::{Instance, InstanceState, StateMachine, VisibleIds};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::postgres_errors::reference_conflict_or_internal;
use crate::postgres_task_queue_repository::insert_task;

const INSTANCE_COLUMNS: &str = r#"
    SELECT
        instances.id,
        instances.hostname,
        instances.description,
        instances.membership_id,
        memberships.project_id,
        memberships.cloud_id,
        projects.customer_id,
        instances.flavor_id,
        instances.template_name,
        instances.cores,
        instances.ram,
        instances.system_volume_size,
        instances.data_volume_size,
        instances.agreed_sla,
        COALESCE(
            array_agg(links.security_group_id) FILTER (WHERE links.security_group_id IS NOT NULL),
            '{}'
        ) AS security_group_ids,
        instances.state,
        instances.start_time,
        instances.created_at
    FROM instances
    INNER JOIN cloud_project_memberships memberships ON memberships.id = instances.membership_id
    INNER JOIN projects ON projects.id = memberships.project_id
    LEFT JOIN instance_security_groups links ON links.instance_id = instances.id
"#;

/// PostgreSQL implementation of the instance repository port.
#[derive(Clone)]
pub struct PostgresInstanceRepository {
    pool: PgPool,
}

impl PostgresInstanceRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct InstanceRow {
    id: Uuid,
    hostname: String,
    description: Option<String>,
    membership_id: Uuid,
    project_id: Uuid,
    cloud_id: Uuid,
    flavor_id: Uuid,
    template_name: Option<String>,
    cores: i32,
    ram: i32,
    system_volume_size: i32,
    data_volume_size: i32,
    agreed_sla: Option<f64>,
    security_group_ids: Vec<Uuid>,
    state: String,
    start_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<InstanceRow> for Instance {
    type Error = AppError;

    fn try_from(row: InstanceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            hostname: NonEmptyString::new(row.hostname)?,
            description: row.description,
            membership_id: row.membership_id,
            project_id: row.project_id,
            cloud_id: row.cloud_id,
            flavor_id: row.flavor_id,
            template_name: row.template_name,
            cores: row.cores,
            ram: row.ram,
            system_volume_size: row.system_volume_size,
            data_volume_size: row.data_volume_size,
            agreed_sla: row.agreed_sla,
            security_group_ids: row.security_group_ids,
            state: InstanceState::from_str(row.state.as_str())?,
            start_time: row.start_time,
            created_at: row.created_at,
        })
    }
}

fn order_clause(ordering: InstanceOrdering) -> &'static str {
    match ordering {
        InstanceOrdering::CreatedAt => "instances.created_at ASC, instances.id ASC",
        InstanceOrdering::CreatedAtDesc => "instances.created_at DESC, instances.id DESC",
        InstanceOrdering::Hostname => "instances.hostname ASC, instances.id ASC",
        InstanceOrdering::HostnameDesc => "instances.hostname DESC, instances.id DESC",
        InstanceOrdering::State => "instances.state ASC, instances.id ASC",
        InstanceOrdering::StateDesc => "instances.state DESC, instances.id DESC",
    }
}

async fn replace_security_groups(
    connection: &mut PgConnection,
    instance_id: Uuid,
    security_group_ids: &[Uuid],
) -> AppResult<()> {
    sqlx::query("DELETE FROM instance_security_groups WHERE instance_id = $1")
        .bind(instance_id)
        .execute(&mut *connection)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to clear security groups of instance '{instance_id}': {error}"
            ))
        })?;

    sqlx::query(
        r#"
        INSERT INTO instance_security_groups (instance_id, security_group_id)
        SELECT $1, group_id
        FROM UNNEST($2::UUID[]) AS group_id
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(instance_id)
    .bind(security_group_ids)
    .execute(&mut *connection)
    .await
    .map_err(|error| {
        reference_conflict_or_internal(
            error,
            "security group does not exist",
            "attach security groups",
        )
    })?;

    Ok(())
}

#[async_trait]
impl InstanceRepository for PostgresInstanceRepository {
    async fn list_instances(
        &self,
        visible: &VisibleIds,
        query: &InstanceListQuery,
    ) -> AppResult<Vec<Instance>> {
        let statement = format!(
            r#"
            {INSTANCE_COLUMNS}
            WHERE ($1::UUID[] IS NULL OR instances.id = ANY($1))
              AND ($2::TEXT IS NULL OR instances.hostname ILIKE '%' || $2 || '%')
              AND ($3::TEXT IS NULL OR instances.state = $3)
              AND ($4::UUID IS NULL OR memberships.project_id = $4)
              AND ($5::UUID IS NULL OR projects.customer_id = $5)
            GROUP BY instances.id, memberships.id, projects.id
            ORDER BY {}
            "#,
            order_clause(query.ordering)
        );

        let rows = sqlx::query_as::<_, InstanceRow>(statement.as_str())
            .bind(visible.to_bind())
            .bind(query.hostname.as_deref())
            .bind(query.state.map(|state| state.as_str()))
            .bind(query.project_id)
            .bind(query.customer_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list instances: {error}")))?;

        rows.into_iter().map(Instance::try_from).collect()
    }

    async fn find_instance(&self, instance_id: Uuid) -> AppResult<Option<Instance>> {
        let statement = format!(
            "{INSTANCE_COLUMNS} WHERE instances.id = $1 GROUP BY instances.id, memberships.id, projects.id"
        );

        let row = sqlx::query_as::<_, InstanceRow>(statement.as_str())
            .bind(instance_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to find instance '{instance_id}': {error}"))
            })?;

        row.map(Instance::try_from).transpose()
    }

    async fn create_instance(&self, instance: Instance, task: NewTask) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start instance create transaction: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO instances (
                id,
                hostname,
                description,
                membership_id,
                flavor_id,
                template_name,
                cores,
                ram,
                system_volume_size,
                data_volume_size,
                agreed_sla,
                state,
                version,
                start_time,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 1, $13, $14)
            "#,
        )
        .bind(instance.id)
        .bind(instance.hostname.as_str())
        .bind(instance.description.as_deref())
        .bind(instance.membership_id)
        .bind(instance.flavor_id)
        .bind(instance.template_name.as_deref())
        .bind(instance.cores)
        .bind(instance.ram)
        .bind(instance.system_volume_size)
        .bind(instance.data_volume_size)
        .bind(instance.agreed_sla)
        .bind(instance.state.as_str())
        .bind(instance.start_time)
        .bind(instance.created_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            reference_conflict_or_internal(
                error,
                "membership of the instance does not exist",
                "create instance",
            )
        })?;

        replace_security_groups(&mut transaction, instance.id, &instance.security_group_ids)
            .await?;
        insert_task(&mut *transaction, &task).await?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit instance create transaction: {error}"))
        })?;

        Ok(())
    }

    async fn update_instance(
        &self,
        update: InstanceUpdate,
        task: Option<NewTask>,
    ) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start instance update transaction: {error}"))
        })?;

        let result = sqlx::query(
            "UPDATE instances SET hostname = $2, description = $3 WHERE id = $1",
        )
        .bind(update.id)
        .bind(update.hostname.as_str())
        .bind(update.description.as_deref())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to update instance '{}': {error}", update.id))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "instance '{}' not found",
                update.id
            )));
        }

        if let Some(security_group_ids) = &update.security_group_ids {
            replace_security_groups(&mut transaction, update.id, security_group_ids).await?;
        }
        if let Some(task) = &task {
            insert_task(&mut *transaction, task).await?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit instance update transaction: {error}"))
        })?;

        Ok(())
    }

    async fn delete_instance_in_state(
        &self,
        instance_id: Uuid,
        state: InstanceState,
    ) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM instances WHERE id = $1 AND state = $2")
            .bind(instance_id)
            .bind(state.as_str())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to delete instance '{instance_id}': {error}"))
            })?;

        Ok(result.rows_affected() == 1)
    }
}
