//! In-process repository implementing every storage port.
//!
//! Backs handler tests and local experiments without PostgreSQL. Scope
//! expansion, compare-and-write and task leasing follow the same rules as the
//! SQL repositories.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use nodeconductor_application::{AuditEvent, NewTask, UserRecord};
use nodeconductor_domain::{
    Backup, Cloud, CloudProjectMembership, Customer, EntityKind, Flavor, Instance,
    MembershipQuotas, Project, ProjectGroup, RoleAssignment, RoleScope, SecurityGroup,
    SshPublicKey,
};
use tokio::sync::RwLock;
use uuid::Uuid;

mod iaas;
mod lifecycle;
mod structure;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobStatus {
    Pending,
    Leased,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
struct StoredJob {
    id: Uuid,
    task: NewTask,
    status: JobStatus,
    attempts: i32,
    leased_by: Option<String>,
    lease_token: Option<String>,
    lease_expires_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    users: Vec<UserRecord>,
    customers: BTreeMap<Uuid, Customer>,
    project_groups: BTreeMap<Uuid, ProjectGroup>,
    projects: BTreeMap<Uuid, Project>,
    roles: Vec<RoleAssignment>,
    clouds: BTreeMap<Uuid, Cloud>,
    flavors: BTreeMap<Uuid, Flavor>,
    memberships: BTreeMap<Uuid, CloudProjectMembership>,
    security_groups: BTreeMap<Uuid, SecurityGroup>,
    instances: BTreeMap<Uuid, Instance>,
    ssh_keys: BTreeMap<Uuid, SshPublicKey>,
    backups: BTreeMap<Uuid, Backup>,
    versions: BTreeMap<Uuid, i64>,
    quotas: BTreeMap<Uuid, MembershipQuotas>,
    jobs: Vec<StoredJob>,
    audit: Vec<AuditEvent>,
}

/// In-memory implementation of the storage ports.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: RwLock<InMemoryState>,
}

impl InMemoryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores quota and usage rows of one membership.
    pub async fn set_membership_quotas(&self, quotas: MembershipQuotas) {
        self.state
            .write()
            .await
            .quotas
            .insert(quotas.membership_id, quotas);
    }

    /// Returns tasks that were enqueued and not yet claimed.
    pub async fn pending_tasks(&self) -> Vec<NewTask> {
        self.state
            .read()
            .await
            .jobs
            .iter()
            .filter(|job| job.status == JobStatus::Pending)
            .map(|job| job.task.clone())
            .collect()
    }

    /// Returns recorded audit events in append order.
    pub async fn audit_events(&self) -> Vec<AuditEvent> {
        self.state.read().await.audit.clone()
    }
}

impl InMemoryState {
    fn enqueue(&mut self, task: NewTask) -> Uuid {
        let id = Uuid::new_v4();
        self.jobs.push(StoredJob {
            id,
            task,
            status: JobStatus::Pending,
            attempts: 0,
            leased_by: None,
            lease_token: None,
            lease_expires_at: None,
            last_error: None,
        });
        id
    }

    fn projects_in_scope(&self, scope: &RoleScope) -> BTreeSet<Uuid> {
        self.projects
            .values()
            .filter(|project| {
                scope.customer_ids.contains(&project.customer_id)
                    || scope.project_ids.contains(&project.id)
                    || project
                        .project_group_ids
                        .iter()
                        .any(|group_id| scope.project_group_ids.contains(group_id))
            })
            .map(|project| project.id)
            .collect()
    }

    fn ids_within(&self, kind: EntityKind, scope: &RoleScope) -> BTreeSet<Uuid> {
        let projects = self.projects_in_scope(scope);
        let memberships: BTreeSet<Uuid> = self
            .memberships
            .values()
            .filter(|membership| projects.contains(&membership.project_id))
            .map(|membership| membership.id)
            .collect();
        let clouds: BTreeSet<Uuid> = self
            .clouds
            .values()
            .filter(|cloud| {
                scope.customer_ids.contains(&cloud.customer_id)
                    || self.memberships.values().any(|membership| {
                        membership.cloud_id == cloud.id && memberships.contains(&membership.id)
                    })
            })
            .map(|cloud| cloud.id)
            .collect();
        let instances: BTreeSet<Uuid> = self
            .instances
            .values()
            .filter(|instance| memberships.contains(&instance.membership_id))
            .map(|instance| instance.id)
            .collect();

        match kind {
            EntityKind::Customer => self
                .customers
                .keys()
                .copied()
                .filter(|customer_id| {
                    scope.customer_ids.contains(customer_id)
                        || self.project_groups.values().any(|group| {
                            group.customer_id == *customer_id
                                && scope.project_group_ids.contains(&group.id)
                        })
                        || self.projects.values().any(|project| {
                            project.customer_id == *customer_id && projects.contains(&project.id)
                        })
                })
                .collect(),
            EntityKind::ProjectGroup => self
                .project_groups
                .values()
                .filter(|group| {
                    scope.customer_ids.contains(&group.customer_id)
                        || scope.project_group_ids.contains(&group.id)
                        || scope.project_ids.iter().any(|project_id| {
                            self.projects.get(project_id).is_some_and(|project| {
                                project.project_group_ids.contains(&group.id)
                            })
                        })
                })
                .map(|group| group.id)
                .collect(),
            EntityKind::Project => projects,
            EntityKind::Cloud => clouds,
            EntityKind::Flavor => self
                .flavors
                .values()
                .filter(|flavor| clouds.contains(&flavor.cloud_id))
                .map(|flavor| flavor.id)
                .collect(),
            EntityKind::CloudProjectMembership => memberships,
            EntityKind::Instance => instances,
            EntityKind::SecurityGroup => self
                .security_groups
                .values()
                .filter(|group| memberships.contains(&group.membership_id))
                .map(|group| group.id)
                .collect(),
            EntityKind::Backup => self
                .backups
                .values()
                .filter(|backup| instances.contains(&backup.instance_id))
                .map(|backup| backup.id)
                .collect(),
        }
    }
}
