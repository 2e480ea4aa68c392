//! Shared in-process fake implementing every application port for service tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nodeconductor_core::{AppError, AppResult, NonEmptyString, UserId, UserIdentity};
use nodeconductor_domain::{
    Backup, BackupState, Cloud, CloudProjectMembership, Customer, EntityKind, Flavor, Instance,
    InstanceState, MembershipQuotas, Project, ProjectGroup, Role, RoleAssignment, RoleScope,
    ScopeLevel, SecurityGroup, SshPublicKey, StateMachine, StatefulKind, SynchronizationState,
    TaskName, TransitionEffect, VisibleIds,
};
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    AuditEvent, AuditRepository, AuthorizationService, BackupRepository, ClaimedTask,
    CloudListQuery, CloudRepository, InstanceListQuery, InstanceRepository, InstanceUpdate,
    NewTask, PasswordHasher, RoleAssignmentRepository, RoleGrant, RoleScopeRepository,
    ScopeFilterService, SecurityGroupListQuery, SshKeyRepository, StateSnapshot, StateWrite,
    StatefulRepository, StatsRepository, StructureListQuery, StructureRepository,
    StateTransitionExecutor, TaskQueueRepository, UserRecord, UserRepository,
    WorkerHeartbeatInput,
};

#[derive(Default)]
pub(crate) struct FakeState {
    pub users: Vec<UserRecord>,
    pub customers: BTreeMap<Uuid, Customer>,
    pub project_groups: BTreeMap<Uuid, ProjectGroup>,
    pub projects: BTreeMap<Uuid, Project>,
    pub roles: Vec<RoleAssignment>,
    pub clouds: BTreeMap<Uuid, Cloud>,
    pub flavors: BTreeMap<Uuid, Flavor>,
    pub memberships: BTreeMap<Uuid, CloudProjectMembership>,
    pub security_groups: BTreeMap<Uuid, SecurityGroup>,
    pub instances: BTreeMap<Uuid, Instance>,
    pub ssh_keys: BTreeMap<Uuid, SshPublicKey>,
    pub backups: BTreeMap<Uuid, Backup>,
    pub versions: BTreeMap<Uuid, i64>,
    pub quotas: Vec<MembershipQuotas>,
    pub enqueued: Vec<NewTask>,
    pub claimable: Vec<ClaimedTask>,
    pub completed: Vec<Uuid>,
    pub failed: Vec<(Uuid, String)>,
    pub heartbeats: Vec<(String, WorkerHeartbeatInput)>,
    pub audit: Vec<AuditEvent>,
    pub fail_audit: bool,
    pub fail_state_writes: bool,
    pub lose_write_races: bool,
    pub scope_queries: usize,
}

#[derive(Default)]
pub(crate) struct FakeStore {
    pub state: Mutex<FakeState>,
}

pub(crate) fn user(is_staff: bool) -> UserIdentity {
    UserIdentity::new(UserId::new(), "alice", "Alice", is_staff)
}

pub(crate) fn scope_filter(store: &Arc<FakeStore>) -> ScopeFilterService {
    ScopeFilterService::new(store.clone())
}

pub(crate) fn authorization(store: &Arc<FakeStore>) -> AuthorizationService {
    AuthorizationService::new(store.clone(), store.clone())
}

pub(crate) fn executor(store: &Arc<FakeStore>) -> StateTransitionExecutor {
    StateTransitionExecutor::new(store.clone(), store.clone())
}

pub(crate) struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        Ok(format!("plain:{password}"))
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        Ok(hash == format!("plain:{password}"))
    }
}

fn name(value: &str) -> NonEmptyString {
    NonEmptyString::new(value).unwrap_or_else(|_| panic!("test names are not empty"))
}

impl FakeStore {
    pub async fn add_user(&self, identity: &UserIdentity) {
        self.state.lock().await.users.push(UserRecord {
            id: identity.user_id(),
            username: identity.username().to_owned(),
            full_name: identity.full_name().to_owned(),
            password_hash: "plain:secret".to_owned(),
            is_staff: identity.is_staff(),
        });
    }

    pub async fn add_role(&self, user_id: UserId, level: ScopeLevel, scope_id: Uuid, role: Role) {
        self.state.lock().await.roles.push(RoleAssignment {
            id: Uuid::new_v4(),
            user_id,
            level,
            scope_id,
            role,
        });
    }

    pub async fn add_customer(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.customers.insert(
            id,
            Customer {
                id,
                name: name("Acme"),
                native_name: None,
                abbreviation: None,
                contact_details: None,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub async fn add_project_group(&self, customer_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.project_groups.insert(
            id,
            ProjectGroup {
                id,
                customer_id,
                name: name("Operations"),
                created_at: Utc::now(),
            },
        );
        id
    }

    pub async fn add_project(&self, customer_id: Uuid, project_group_ids: Vec<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.projects.insert(
            id,
            Project {
                id,
                customer_id,
                name: name("Web"),
                description: None,
                project_group_ids,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub async fn add_cloud(&self, customer_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.clouds.insert(
            id,
            Cloud {
                id,
                customer_id,
                name: name("Main cloud"),
                auth_url: "https://keystone.example.com/v2.0".to_owned(),
                created_at: Utc::now(),
            },
        );
        id
    }

    pub async fn add_flavor(&self, cloud_id: Uuid, disk: i32) -> Flavor {
        let flavor = Flavor {
            id: Uuid::new_v4(),
            cloud_id,
            name: "m1.small".to_owned(),
            cores: 2,
            ram: 2048,
            disk,
        };
        self.state
            .lock()
            .await
            .flavors
            .insert(flavor.id, flavor.clone());
        flavor
    }

    pub async fn add_membership(
        &self,
        cloud_id: Uuid,
        project_id: Uuid,
        state: SynchronizationState,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.memberships.insert(
            id,
            CloudProjectMembership {
                id,
                cloud_id,
                project_id,
                tenant_id: None,
                state,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub async fn add_instance(&self, membership_id: Uuid, state: InstanceState) -> Uuid {
        let mut fake = self.state.lock().await;
        let (project_id, cloud_id) = fake
            .memberships
            .get(&membership_id)
            .map(|membership| (membership.project_id, membership.cloud_id))
            .unwrap_or_else(|| panic!("membership must be seeded first"));
        let id = Uuid::new_v4();
        fake.instances.insert(
            id,
            Instance {
                id,
                hostname: name("web-1"),
                description: None,
                membership_id,
                project_id,
                cloud_id,
                flavor_id: Uuid::new_v4(),
                template_name: None,
                cores: 1,
                ram: 1024,
                system_volume_size: 10,
                data_volume_size: 20,
                agreed_sla: None,
                security_group_ids: Vec::new(),
                state,
                start_time: None,
                created_at: Utc::now(),
            },
        );
        fake.versions.insert(id, 1);
        id
    }

    pub async fn add_backup(&self, instance_id: Uuid, state: BackupState) -> Uuid {
        let id = Uuid::new_v4();
        let mut fake = self.state.lock().await;
        fake.backups.insert(
            id,
            Backup {
                id,
                instance_id,
                description: None,
                state,
                metadata: None,
                kept_until: None,
                created_at: Utc::now(),
            },
        );
        fake.versions.insert(id, 1);
        id
    }

    pub async fn instance_state(&self, id: Uuid) -> Option<InstanceState> {
        self.state
            .lock()
            .await
            .instances
            .get(&id)
            .map(|instance| instance.state)
    }

    pub async fn backup_state(&self, id: Uuid) -> Option<BackupState> {
        self.state
            .lock()
            .await
            .backups
            .get(&id)
            .map(|backup| backup.state)
    }
}

impl FakeState {
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
                        membership.cloud_id == cloud.id && projects.contains(&membership.project_id)
                    })
            })
            .map(|cloud| cloud.id)
            .collect();
        let instances: BTreeSet<Uuid> = self
            .instances
            .values()
            .filter(|instance| projects.contains(&instance.project_id))
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
                            self.projects
                                .get(project_id)
                                .is_some_and(|project| project.project_group_ids.contains(&group.id))
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

    fn customer_of(&self, kind: EntityKind, id: Uuid) -> Option<Uuid> {
        match kind {
            EntityKind::Project => self.projects.get(&id).map(|project| project.customer_id),
            EntityKind::ProjectGroup => self.project_groups.get(&id).map(|group| group.customer_id),
            EntityKind::Instance => self
                .instances
                .get(&id)
                .and_then(|instance| self.projects.get(&instance.project_id))
                .map(|project| project.customer_id),
            _ => None,
        }
    }
}

#[async_trait]
impl UserRepository for FakeStore {
    async fn find_by_username(&self, username: &str) -> AppResult<Option<UserRecord>> {
        Ok(self
            .state
            .lock()
            .await
            .users
            .iter()
            .find(|user| user.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        Ok(self
            .state
            .lock()
            .await
            .users
            .iter()
            .find(|user| user.id == user_id)
            .cloned())
    }

    async fn create(&self, user: UserRecord) -> AppResult<()> {
        self.state.lock().await.users.push(user);
        Ok(())
    }
}

#[async_trait]
impl RoleScopeRepository for FakeStore {
    async fn resolve_scope(&self, user_id: UserId) -> AppResult<RoleScope> {
        let mut fake = self.state.lock().await;
        fake.scope_queries += 1;
        Ok(RoleScope::from_assignments(
            fake.roles.iter().filter(|role| role.user_id == user_id),
        ))
    }

    async fn ids_within_scope(
        &self,
        kind: EntityKind,
        scope: &RoleScope,
    ) -> AppResult<BTreeSet<Uuid>> {
        let mut fake = self.state.lock().await;
        fake.scope_queries += 1;
        Ok(fake.ids_within(kind, scope))
    }
}

fn name_matches(name: &NonEmptyString, filter: Option<&String>) -> bool {
    filter.is_none_or(|filter| {
        name.as_str()
            .to_lowercase()
            .contains(filter.to_lowercase().as_str())
    })
}

#[async_trait]
impl StructureRepository for FakeStore {
    async fn list_customers(
        &self,
        visible: &VisibleIds,
        query: &StructureListQuery,
    ) -> AppResult<Vec<Customer>> {
        Ok(self
            .state
            .lock()
            .await
            .customers
            .values()
            .filter(|customer| visible.contains(&customer.id))
            .filter(|customer| name_matches(&customer.name, query.name.as_ref()))
            .cloned()
            .collect())
    }

    async fn find_customer(&self, customer_id: Uuid) -> AppResult<Option<Customer>> {
        Ok(self.state.lock().await.customers.get(&customer_id).cloned())
    }

    async fn save_customer(&self, customer: Customer) -> AppResult<()> {
        self.state
            .lock()
            .await
            .customers
            .insert(customer.id, customer);
        Ok(())
    }

    async fn delete_customer(&self, customer_id: Uuid) -> AppResult<()> {
        let mut fake = self.state.lock().await;
        if fake
            .projects
            .values()
            .any(|project| project.customer_id == customer_id)
        {
            return Err(AppError::Conflict("customer has projects".to_owned()));
        }
        fake.customers.remove(&customer_id);
        Ok(())
    }

    async fn list_project_groups(
        &self,
        visible: &VisibleIds,
        query: &StructureListQuery,
    ) -> AppResult<Vec<ProjectGroup>> {
        Ok(self
            .state
            .lock()
            .await
            .project_groups
            .values()
            .filter(|group| visible.contains(&group.id))
            .filter(|group| query.customer_id.is_none_or(|id| id == group.customer_id))
            .cloned()
            .collect())
    }

    async fn find_project_group(
        &self,
        project_group_id: Uuid,
    ) -> AppResult<Option<ProjectGroup>> {
        Ok(self
            .state
            .lock()
            .await
            .project_groups
            .get(&project_group_id)
            .cloned())
    }

    async fn create_project_group(&self, project_group: ProjectGroup) -> AppResult<()> {
        self.state
            .lock()
            .await
            .project_groups
            .insert(project_group.id, project_group);
        Ok(())
    }

    async fn delete_project_group(&self, project_group_id: Uuid) -> AppResult<()> {
        let mut fake = self.state.lock().await;
        fake.project_groups.remove(&project_group_id);
        for project in fake.projects.values_mut() {
            project.project_group_ids.retain(|id| *id != project_group_id);
        }
        Ok(())
    }

    async fn list_projects(
        &self,
        visible: &VisibleIds,
        query: &StructureListQuery,
    ) -> AppResult<Vec<Project>> {
        Ok(self
            .state
            .lock()
            .await
            .projects
            .values()
            .filter(|project| visible.contains(&project.id))
            .filter(|project| query.customer_id.is_none_or(|id| id == project.customer_id))
            .cloned()
            .collect())
    }

    async fn find_project(&self, project_id: Uuid) -> AppResult<Option<Project>> {
        Ok(self.state.lock().await.projects.get(&project_id).cloned())
    }

    async fn create_project(&self, project: Project) -> AppResult<()> {
        self.state.lock().await.projects.insert(project.id, project);
        Ok(())
    }

    async fn delete_project(&self, project_id: Uuid) -> AppResult<()> {
        let mut fake = self.state.lock().await;
        if fake
            .instances
            .values()
            .any(|instance| instance.project_id == project_id)
        {
            return Err(AppError::Conflict("project has instances".to_owned()));
        }
        fake.projects.remove(&project_id);
        Ok(())
    }

    async fn add_project_to_group(
        &self,
        project_id: Uuid,
        project_group_id: Uuid,
    ) -> AppResult<()> {
        let mut fake = self.state.lock().await;
        if let Some(project) = fake.projects.get_mut(&project_id)
            && !project.project_group_ids.contains(&project_group_id)
        {
            project.project_group_ids.push(project_group_id);
        }
        Ok(())
    }

    async fn remove_project_from_group(
        &self,
        project_id: Uuid,
        project_group_id: Uuid,
    ) -> AppResult<()> {
        let mut fake = self.state.lock().await;
        if let Some(project) = fake.projects.get_mut(&project_id) {
            project.project_group_ids.retain(|id| *id != project_group_id);
        }
        Ok(())
    }
}

#[async_trait]
impl RoleAssignmentRepository for FakeStore {
    async fn list_role_assignments(
        &self,
        level: ScopeLevel,
        visible_scopes: &VisibleIds,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<RoleAssignment>> {
        Ok(self
            .state
            .lock()
            .await
            .roles
            .iter()
            .filter(|role| role.level == level && visible_scopes.contains(&role.scope_id))
            .filter(|role| user_id.is_none_or(|user_id| role.user_id == user_id))
            .cloned()
            .collect())
    }

    async fn find_role_assignment(
        &self,
        assignment_id: Uuid,
    ) -> AppResult<Option<RoleAssignment>> {
        Ok(self
            .state
            .lock()
            .await
            .roles
            .iter()
            .find(|role| role.id == assignment_id)
            .cloned())
    }

    async fn has_role(
        &self,
        user_id: UserId,
        level: ScopeLevel,
        scope_id: Uuid,
        role: Role,
    ) -> AppResult<bool> {
        Ok(self.state.lock().await.roles.iter().any(|assignment| {
            assignment.user_id == user_id
                && assignment.level == level
                && assignment.scope_id == scope_id
                && assignment.role == role
        }))
    }

    async fn grant_role(&self, assignment: RoleAssignment) -> AppResult<RoleGrant> {
        let mut fake = self.state.lock().await;
        if let Some(existing) = fake.roles.iter().find(|role| {
            role.user_id == assignment.user_id
                && role.level == assignment.level
                && role.scope_id == assignment.scope_id
                && role.role == assignment.role
        }) {
            return Ok(RoleGrant::AlreadyGranted(existing.clone()));
        }
        fake.roles.push(assignment.clone());
        Ok(RoleGrant::Created(assignment))
    }

    async fn revoke_role(&self, assignment_id: Uuid) -> AppResult<()> {
        self.state
            .lock()
            .await
            .roles
            .retain(|role| role.id != assignment_id);
        Ok(())
    }
}

#[async_trait]
impl CloudRepository for FakeStore {
    async fn list_clouds(
        &self,
        visible: &VisibleIds,
        query: &CloudListQuery,
    ) -> AppResult<Vec<Cloud>> {
        Ok(self
            .state
            .lock()
            .await
            .clouds
            .values()
            .filter(|cloud| visible.contains(&cloud.id))
            .filter(|cloud| name_matches(&cloud.name, query.name.as_ref()))
            .cloned()
            .collect())
    }

    async fn find_cloud(&self, cloud_id: Uuid) -> AppResult<Option<Cloud>> {
        Ok(self.state.lock().await.clouds.get(&cloud_id).cloned())
    }

    async fn create_cloud(&self, cloud: Cloud, task: NewTask) -> AppResult<()> {
        let mut fake = self.state.lock().await;
        fake.clouds.insert(cloud.id, cloud);
        fake.enqueued.push(task);
        Ok(())
    }

    async fn list_flavors(
        &self,
        visible: &VisibleIds,
        cloud_id: Option<Uuid>,
    ) -> AppResult<Vec<Flavor>> {
        Ok(self
            .state
            .lock()
            .await
            .flavors
            .values()
            .filter(|flavor| visible.contains(&flavor.id))
            .filter(|flavor| cloud_id.is_none_or(|id| id == flavor.cloud_id))
            .cloned()
            .collect())
    }

    async fn find_flavor(&self, flavor_id: Uuid) -> AppResult<Option<Flavor>> {
        Ok(self.state.lock().await.flavors.get(&flavor_id).cloned())
    }

    async fn upsert_flavors(&self, cloud_id: Uuid, flavors: Vec<Flavor>) -> AppResult<()> {
        let mut fake = self.state.lock().await;
        for flavor in flavors {
            let existing = fake
                .flavors
                .values()
                .find(|stored| stored.cloud_id == cloud_id && stored.name == flavor.name)
                .map(|stored| stored.id);
            let id = existing.unwrap_or(flavor.id);
            fake.flavors.insert(id, Flavor { id, ..flavor });
        }
        Ok(())
    }

    async fn list_memberships(
        &self,
        visible: &VisibleIds,
    ) -> AppResult<Vec<CloudProjectMembership>> {
        Ok(visible.filter(
            self.state
                .lock()
                .await
                .memberships
                .values()
                .cloned()
                .collect(),
            |membership| membership.id,
        ))
    }

    async fn find_membership(
        &self,
        membership_id: Uuid,
    ) -> AppResult<Option<CloudProjectMembership>> {
        Ok(self
            .state
            .lock()
            .await
            .memberships
            .get(&membership_id)
            .cloned())
    }

    async fn find_membership_by_link(
        &self,
        cloud_id: Uuid,
        project_id: Uuid,
    ) -> AppResult<Option<CloudProjectMembership>> {
        Ok(self
            .state
            .lock()
            .await
            .memberships
            .values()
            .find(|membership| membership.cloud_id == cloud_id && membership.project_id == project_id)
            .cloned())
    }

    async fn create_membership(
        &self,
        membership: CloudProjectMembership,
        security_groups: Vec<SecurityGroup>,
        task: NewTask,
    ) -> AppResult<()> {
        let mut fake = self.state.lock().await;
        if fake.memberships.values().any(|stored| {
            stored.cloud_id == membership.cloud_id && stored.project_id == membership.project_id
        }) {
            return Err(AppError::Conflict("membership exists".to_owned()));
        }
        fake.memberships.insert(membership.id, membership);
        for group in security_groups {
            fake.security_groups.insert(group.id, group);
        }
        fake.enqueued.push(task);
        Ok(())
    }

    async fn set_membership_state(
        &self,
        membership_id: Uuid,
        state: SynchronizationState,
        tenant_id: Option<String>,
    ) -> AppResult<()> {
        let mut fake = self.state.lock().await;
        if let Some(membership) = fake.memberships.get_mut(&membership_id) {
            membership.state = state;
            if tenant_id.is_some() {
                membership.tenant_id = tenant_id;
            }
        }
        Ok(())
    }

    async fn list_security_groups(
        &self,
        visible: &VisibleIds,
        query: &SecurityGroupListQuery,
    ) -> AppResult<Vec<SecurityGroup>> {
        let fake = self.state.lock().await;
        Ok(fake
            .security_groups
            .values()
            .filter(|group| visible.contains(&group.id))
            .filter(|group| {
                let membership = fake.memberships.get(&group.membership_id);
                query
                    .cloud_id
                    .is_none_or(|id| membership.is_some_and(|m| m.cloud_id == id))
                    && query
                        .project_id
                        .is_none_or(|id| membership.is_some_and(|m| m.project_id == id))
            })
            .cloned()
            .collect())
    }

    async fn list_membership_security_groups(
        &self,
        membership_id: Uuid,
    ) -> AppResult<Vec<SecurityGroup>> {
        Ok(self
            .state
            .lock()
            .await
            .security_groups
            .values()
            .filter(|group| group.membership_id == membership_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl InstanceRepository for FakeStore {
    async fn list_instances(
        &self,
        visible: &VisibleIds,
        query: &InstanceListQuery,
    ) -> AppResult<Vec<Instance>> {
        Ok(self
            .state
            .lock()
            .await
            .instances
            .values()
            .filter(|instance| visible.contains(&instance.id))
            .filter(|instance| query.state.is_none_or(|state| state == instance.state))
            .filter(|instance| query.project_id.is_none_or(|id| id == instance.project_id))
            .cloned()
            .collect())
    }

    async fn find_instance(&self, instance_id: Uuid) -> AppResult<Option<Instance>> {
        Ok(self.state.lock().await.instances.get(&instance_id).cloned())
    }

    async fn create_instance(&self, instance: Instance, task: NewTask) -> AppResult<()> {
        let mut fake = self.state.lock().await;
        fake.versions.insert(instance.id, 1);
        fake.instances.insert(instance.id, instance);
        fake.enqueued.push(task);
        Ok(())
    }

    async fn update_instance(
        &self,
        update: InstanceUpdate,
        task: Option<NewTask>,
    ) -> AppResult<()> {
        let mut fake = self.state.lock().await;
        let instance = fake
            .instances
            .get_mut(&update.id)
            .ok_or_else(|| AppError::NotFound("instance".to_owned()))?;
        instance.hostname = NonEmptyString::new(update.hostname)?;
        instance.description = update.description;
        if let Some(security_group_ids) = update.security_group_ids {
            instance.security_group_ids = security_group_ids;
        }
        if let Some(task) = task {
            fake.enqueued.push(task);
        }
        Ok(())
    }

    async fn delete_instance_in_state(
        &self,
        instance_id: Uuid,
        state: InstanceState,
    ) -> AppResult<bool> {
        let mut fake = self.state.lock().await;
        if fake
            .instances
            .get(&instance_id)
            .is_some_and(|instance| instance.state == state)
        {
            fake.instances.remove(&instance_id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[async_trait]
impl SshKeyRepository for FakeStore {
    async fn list_keys(&self, owner: Option<UserId>) -> AppResult<Vec<SshPublicKey>> {
        Ok(self
            .state
            .lock()
            .await
            .ssh_keys
            .values()
            .filter(|key| owner.is_none_or(|owner| owner == key.user_id))
            .cloned()
            .collect())
    }

    async fn find_key(&self, key_id: Uuid) -> AppResult<Option<SshPublicKey>> {
        Ok(self.state.lock().await.ssh_keys.get(&key_id).cloned())
    }

    async fn create_key(&self, key: SshPublicKey, task: NewTask) -> AppResult<()> {
        let mut fake = self.state.lock().await;
        if fake
            .ssh_keys
            .values()
            .any(|stored| stored.user_id == key.user_id && stored.name == key.name)
        {
            return Err(AppError::Conflict("duplicate key name".to_owned()));
        }
        fake.ssh_keys.insert(key.id, key);
        fake.enqueued.push(task);
        Ok(())
    }

    async fn delete_key(&self, key_id: Uuid) -> AppResult<()> {
        self.state.lock().await.ssh_keys.remove(&key_id);
        Ok(())
    }
}

#[async_trait]
impl BackupRepository for FakeStore {
    async fn list_backups(&self, visible_instances: &VisibleIds) -> AppResult<Vec<Backup>> {
        Ok(self
            .state
            .lock()
            .await
            .backups
            .values()
            .filter(|backup| visible_instances.contains(&backup.instance_id))
            .cloned()
            .collect())
    }

    async fn find_backup(&self, backup_id: Uuid) -> AppResult<Option<Backup>> {
        Ok(self.state.lock().await.backups.get(&backup_id).cloned())
    }

    async fn create_backup(&self, backup: Backup, task: NewTask) -> AppResult<()> {
        let mut fake = self.state.lock().await;
        fake.versions.insert(backup.id, 1);
        fake.backups.insert(backup.id, backup);
        fake.enqueued.push(task);
        Ok(())
    }
}

#[async_trait]
impl StatsRepository for FakeStore {
    async fn count_per_customer(
        &self,
        kind: EntityKind,
        visible: &VisibleIds,
    ) -> AppResult<BTreeMap<Uuid, i64>> {
        let fake = self.state.lock().await;
        let ids: Vec<Uuid> = match kind {
            EntityKind::Project => fake.projects.keys().copied().collect(),
            EntityKind::ProjectGroup => fake.project_groups.keys().copied().collect(),
            EntityKind::Instance => fake.instances.keys().copied().collect(),
            _ => Vec::new(),
        };

        let mut counts = BTreeMap::new();
        for id in visible.filter(ids, |id| *id) {
            if let Some(customer_id) = fake.customer_of(kind, id) {
                *counts.entry(customer_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn list_membership_quotas(
        &self,
        memberships: &VisibleIds,
    ) -> AppResult<Vec<MembershipQuotas>> {
        Ok(memberships.filter(self.state.lock().await.quotas.clone(), |quotas| {
            quotas.membership_id
        }))
    }

    async fn list_creation_times(
        &self,
        kind: EntityKind,
        visible: &VisibleIds,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<DateTime<Utc>>> {
        let fake = self.state.lock().await;
        let rows: Vec<(Uuid, DateTime<Utc>)> = match kind {
            EntityKind::Customer => fake
                .customers
                .values()
                .map(|customer| (customer.id, customer.created_at))
                .collect(),
            EntityKind::Project => fake
                .projects
                .values()
                .map(|project| (project.id, project.created_at))
                .collect(),
            EntityKind::ProjectGroup => fake
                .project_groups
                .values()
                .map(|group| (group.id, group.created_at))
                .collect(),
            _ => Vec::new(),
        };

        Ok(visible
            .filter(rows, |(id, _)| *id)
            .into_iter()
            .map(|(_, created_at)| created_at)
            .filter(|created_at| *created_at >= from && *created_at <= to)
            .collect())
    }
}

fn apply_effect(fake: &mut FakeState, write: &StateWrite) {
    match (&write.effect, write.kind) {
        (TransitionEffect::InstanceFlavor { flavor_id, cores, ram }, StatefulKind::Instance) => {
            if let Some(instance) = fake.instances.get_mut(&write.id) {
                instance.flavor_id = *flavor_id;
                instance.cores = *cores;
                instance.ram = *ram;
            }
        }
        (TransitionEffect::InstanceDataVolume { size }, StatefulKind::Instance) => {
            if let Some(instance) = fake.instances.get_mut(&write.id) {
                instance.data_volume_size = *size;
            }
        }
        (TransitionEffect::InstanceStarted, StatefulKind::Instance) => {
            if let Some(instance) = fake.instances.get_mut(&write.id) {
                instance.start_time = Some(Utc::now());
            }
        }
        (TransitionEffect::BackupMetadata(metadata), StatefulKind::Backup) => {
            if let Some(backup) = fake.backups.get_mut(&write.id) {
                backup.metadata = Some(metadata.clone());
            }
        }
        _ => {}
    }
}

#[async_trait]
impl StatefulRepository for FakeStore {
    async fn load_state(&self, kind: StatefulKind, id: Uuid) -> AppResult<Option<StateSnapshot>> {
        let fake = self.state.lock().await;
        let state = match kind {
            StatefulKind::Instance => fake
                .instances
                .get(&id)
                .map(|instance| instance.state.as_str()),
            StatefulKind::Backup => fake.backups.get(&id).map(|backup| backup.state.as_str()),
        };

        Ok(state.map(|state| StateSnapshot {
            state: state.to_owned(),
            version: fake.versions.get(&id).copied().unwrap_or(1),
        }))
    }

    async fn compare_and_write(&self, write: StateWrite) -> AppResult<bool> {
        let mut fake = self.state.lock().await;
        if fake.fail_state_writes {
            return Err(AppError::Internal("storage unavailable".to_owned()));
        }
        if fake.lose_write_races {
            return Ok(false);
        }

        let current_version = fake.versions.get(&write.id).copied().unwrap_or(1);
        if current_version != write.expected_version {
            return Ok(false);
        }

        let written = match write.kind {
            StatefulKind::Instance => match fake.instances.get_mut(&write.id) {
                Some(instance) if instance.state.as_str() == write.expected_state => {
                    instance.state = InstanceState::parse(write.target_state)?;
                    true
                }
                _ => false,
            },
            StatefulKind::Backup => match fake.backups.get_mut(&write.id) {
                Some(backup) if backup.state.as_str() == write.expected_state => {
                    backup.state = BackupState::parse(write.target_state)?;
                    true
                }
                _ => false,
            },
        };
        if !written {
            return Ok(false);
        }

        apply_effect(&mut fake, &write);
        fake.versions.insert(write.id, current_version + 1);
        if let Some(task) = write.follow_up {
            fake.enqueued.push(task);
        }
        Ok(true)
    }
}

#[async_trait]
impl AuditRepository for FakeStore {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        let mut fake = self.state.lock().await;
        if fake.fail_audit {
            return Err(AppError::Internal("audit sink unavailable".to_owned()));
        }
        fake.audit.push(event);
        Ok(())
    }
}

#[async_trait]
impl TaskQueueRepository for FakeStore {
    async fn enqueue(&self, task: NewTask) -> AppResult<Uuid> {
        self.state.lock().await.enqueued.push(task);
        Ok(Uuid::new_v4())
    }

    async fn claim_tasks(
        &self,
        _worker_id: &str,
        limit: usize,
        _lease_seconds: u32,
    ) -> AppResult<Vec<ClaimedTask>> {
        let mut fake = self.state.lock().await;
        let count = limit.min(fake.claimable.len());
        Ok(fake.claimable.drain(..count).collect())
    }

    async fn complete_task(
        &self,
        job_id: Uuid,
        _worker_id: &str,
        _lease_token: &str,
    ) -> AppResult<()> {
        self.state.lock().await.completed.push(job_id);
        Ok(())
    }

    async fn fail_task(
        &self,
        job_id: Uuid,
        _worker_id: &str,
        _lease_token: &str,
        error_message: &str,
    ) -> AppResult<()> {
        self.state
            .lock()
            .await
            .failed
            .push((job_id, error_message.to_owned()));
        Ok(())
    }

    async fn upsert_worker_heartbeat(
        &self,
        worker_id: &str,
        input: WorkerHeartbeatInput,
    ) -> AppResult<()> {
        self.state
            .lock()
            .await
            .heartbeats
            .push((worker_id.to_owned(), input));
        Ok(())
    }
}

pub(crate) fn claimed(task: TaskName, entity_id: Uuid, payload: Value) -> ClaimedTask {
    ClaimedTask {
        job_id: Uuid::new_v4(),
        task,
        entity_id,
        payload,
        attempt: 1,
        lease_token: Uuid::new_v4().to_string(),
        leased_until: Utc::now(),
    }
}
