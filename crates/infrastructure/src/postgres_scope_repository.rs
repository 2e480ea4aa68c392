//! Role scope resolution and expansion in SQL.
//!
//! Every call is answered with one statement: the user's assignments for
//! [`RoleScopeRepository::resolve_scope`], and one set query per entity kind
//! for [`RoleScopeRepository::ids_within_scope`]. Expansion binds the three
//! scope levels as arrays (`$1` customers, `$2` project groups, `$3`
//! projects) and never iterates rows in Rust.

use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use nodeconductor_application::RoleScopeRepository;
use nodeconductor_core::{AppError, AppResult, UserId};
use nodeconductor_domain::{EntityKind, Role, RoleAssignment, RoleScope, ScopeLevel};
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

/// Projects reachable from any level of the scope.
const SCOPED_PROJECTS: &str = r#"
    WITH scoped_projects AS (
        SELECT id FROM projects WHERE customer_id = ANY($1) OR id = ANY($3)
        UNION
        SELECT project_id FROM project_group_projects WHERE project_group_id = ANY($2)
    ),
    scoped_memberships AS (
        SELECT memberships.id, memberships.cloud_id
        FROM cloud_project_memberships memberships
        INNER JOIN scoped_projects ON scoped_projects.id = memberships.project_id
    ),
    scoped_clouds AS (
        SELECT id FROM clouds WHERE customer_id = ANY($1)
        UNION
        SELECT cloud_id FROM scoped_memberships
    ),
    scoped_instances AS (
        SELECT instances.id
        FROM instances
        INNER JOIN scoped_memberships ON scoped_memberships.id = instances.membership_id
    )
"#;

fn expansion_select(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Customer => {
            r#"
            SELECT id FROM customers WHERE id = ANY($1)
            UNION
            SELECT customer_id FROM project_groups WHERE id = ANY($2)
            UNION
            SELECT projects.customer_id
            FROM projects
            INNER JOIN scoped_projects ON scoped_projects.id = projects.id
            "#
        }
        EntityKind::ProjectGroup => {
            r#"
            SELECT id FROM project_groups WHERE customer_id = ANY($1) OR id = ANY($2)
            UNION
            SELECT project_group_id FROM project_group_projects WHERE project_id = ANY($3)
            "#
        }
        EntityKind::Project => "SELECT id FROM scoped_projects",
        EntityKind::Cloud => "SELECT id FROM scoped_clouds",
        EntityKind::Flavor => {
            r#"
            SELECT flavors.id
            FROM flavors
            INNER JOIN scoped_clouds ON scoped_clouds.id = flavors.cloud_id
            "#
        }
        EntityKind::CloudProjectMembership => "SELECT id FROM scoped_memberships",
        EntityKind::Instance => "SELECT id FROM scoped_instances",
        EntityKind::SecurityGroup => {
            r#"
            SELECT security_groups.id
            FROM security_groups
            INNER JOIN scoped_memberships
                ON scoped_memberships.id = security_groups.membership_id
            "#
        }
        EntityKind::Backup => {
            r#"
            SELECT backups.id
            FROM backups
            INNER JOIN scoped_instances ON scoped_instances.id = backups.instance_id
            "#
        }
    }
}

/// PostgreSQL implementation of the role scope port.
#[derive(Clone)]
pub struct PostgresScopeRepository {
    pool: PgPool,
}

impl PostgresScopeRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    id: Uuid,
    level: String,
    scope_id: Uuid,
    role: String,
}

#[async_trait]
impl RoleScopeRepository for PostgresScopeRepository {
    async fn resolve_scope(&self, user_id: UserId) -> AppResult<RoleScope> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT id, level, scope_id, role
            FROM role_assignments
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to resolve role scope for user '{user_id}': {error}"
            ))
        })?;

        let assignments = rows
            .into_iter()
            .map(|row| {
                Ok(RoleAssignment {
                    id: row.id,
                    user_id,
                    level: ScopeLevel::from_str(row.level.as_str())?,
                    scope_id: row.scope_id,
                    role: Role::from_str(row.role.as_str())?,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(RoleScope::from_assignments(&assignments))
    }

    async fn ids_within_scope(
        &self,
        kind: EntityKind,
        scope: &RoleScope,
    ) -> AppResult<BTreeSet<Uuid>> {
        let statement = format!("{SCOPED_PROJECTS} {}", expansion_select(kind));
        debug!(entity = kind.as_str(), "expanding role scope");

        let ids = sqlx::query_scalar::<_, Uuid>(statement.as_str())
            .bind(scope.customer_ids.iter().copied().collect::<Vec<_>>())
            .bind(scope.project_group_ids.iter().copied().collect::<Vec<_>>())
            .bind(scope.project_ids.iter().copied().collect::<Vec<_>>())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to expand role scope for {}: {error}",
                    kind.as_str()
                ))
            })?;

        Ok(ids.into_iter().collect())
    }
}
