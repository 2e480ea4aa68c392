use async_trait::async_trait;
use nodeconductor_application::{
    BackupRepository, CloudListQuery, CloudRepository, InstanceListQuery, InstanceOrdering,
    InstanceRepository, InstanceUpdate, NewTask, SecurityGroupListQuery, SshKeyRepository,
};
use nodeconductor_core::{AppError, AppResult, NonEmptyString, UserId};
use nodeconductor_domain::{
    Backup, Cloud, CloudProjectMembership, Flavor, Instance, InstanceState, SecurityGroup,
    SshPublicKey, StateMachine, SynchronizationState, VisibleIds,
};
use uuid::Uuid;

use super::InMemoryRepository;
use super::structure::name_contains;

fn sort_instances(instances: &mut [Instance], ordering: InstanceOrdering) {
    match ordering {
        InstanceOrdering::CreatedAt => instances.sort_by_key(|instance| (instance.created_at, instance.id)),
        InstanceOrdering::CreatedAtDesc => {
            instances.sort_by_key(|instance| (instance.created_at, instance.id));
            instances.reverse();
        }
        InstanceOrdering::Hostname => instances.sort_by(|left, right| {
            left.hostname
                .as_str()
                .cmp(right.hostname.as_str())
                .then(left.id.cmp(&right.id))
        }),
        InstanceOrdering::HostnameDesc => instances.sort_by(|left, right| {
            right
                .hostname
                .as_str()
                .cmp(left.hostname.as_str())
                .then(right.id.cmp(&left.id))
        }),
        InstanceOrdering::State => instances.sort_by(|left, right| {
            left.state
                .as_str()
                .cmp(right.state.as_str())
                .then(left.id.cmp(&right.id))
        }),
        InstanceOrdering::StateDesc => instances.sort_by(|left, right| {
            right
                .state
                .as_str()
                .cmp(left.state.as_str())
                .then(right.id.cmp(&left.id))
        }),
    }
}

#[async_trait]
impl CloudRepository for InMemoryRepository {
    async fn list_clouds(
        &self,
        visible: &VisibleIds,
        query: &CloudListQuery,
    ) -> AppResult<Vec<Cloud>> {
        Ok(self
            .state
            .read()
            .await
            .clouds
            .values()
            .filter(|cloud| visible.contains(&cloud.id))
            .filter(|cloud| name_contains(&cloud.name, query.name.as_ref()))
            .filter(|cloud| query.customer_id.is_none_or(|id| id == cloud.customer_id))
            .cloned()
            .collect())
    }

    async fn find_cloud(&self, cloud_id: Uuid) -> AppResult<Option<Cloud>> {
        Ok(self.state.read().await.clouds.get(&cloud_id).cloned())
    }

    async fn create_cloud(&self, cloud: Cloud, task: NewTask) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.customers.contains_key(&cloud.customer_id) {
            return Err(AppError::Conflict(
                "customer of the cloud does not exist".to_owned(),
            ));
        }

        state.clouds.insert(cloud.id, cloud);
        state.enqueue(task);
        Ok(())
    }

    async fn list_flavors(
        &self,
        visible: &VisibleIds,
        cloud_id: Option<Uuid>,
    ) -> AppResult<Vec<Flavor>> {
        Ok(self
            .state
            .read()
            .await
            .flavors
            .values()
            .filter(|flavor| visible.contains(&flavor.id))
            .filter(|flavor| cloud_id.is_none_or(|id| id == flavor.cloud_id))
            .cloned()
            .collect())
    }

    async fn find_flavor(&self, flavor_id: Uuid) -> AppResult<Option<Flavor>> {
        Ok(self.state.read().await.flavors.get(&flavor_id).cloned())
    }

    async fn upsert_flavors(&self, cloud_id: Uuid, flavors: Vec<Flavor>) -> AppResult<()> {
        let mut state = self.state.write().await;
        for flavor in flavors {
            let id = state
                .flavors
                .values()
                .find(|stored| stored.cloud_id == cloud_id && stored.name == flavor.name)
                .map_or(flavor.id, |stored| stored.id);
            state.flavors.insert(
                id,
                Flavor {
                    id,
                    cloud_id,
                    ..flavor
                },
            );
        }
        Ok(())
    }

    async fn list_memberships(
        &self,
        visible: &VisibleIds,
    ) -> AppResult<Vec<CloudProjectMembership>> {
        Ok(self
            .state
            .read()
            .await
            .memberships
            .values()
            .filter(|membership| visible.contains(&membership.id))
            .cloned()
            .collect())
    }

    async fn find_membership(
        &self,
        membership_id: Uuid,
    ) -> AppResult<Option<CloudProjectMembership>> {
        Ok(self
            .state
            .read()
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
            .read()
            .await
            .memberships
            .values()
            .find(|membership| {
                membership.cloud_id == cloud_id && membership.project_id == project_id
            })
            .cloned())
    }

    async fn create_membership(
        &self,
        membership: CloudProjectMembership,
        security_groups: Vec<SecurityGroup>,
        task: NewTask,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.memberships.values().any(|stored| {
            stored.cloud_id == membership.cloud_id && stored.project_id == membership.project_id
        }) {
            return Err(AppError::Conflict(
                "cloud is already linked to the project".to_owned(),
            ));
        }

        state.memberships.insert(membership.id, membership);
        for group in security_groups {
            state.security_groups.insert(group.id, group);
        }
        state.enqueue(task);
        Ok(())
    }

    async fn set_membership_state(
        &self,
        membership_id: Uuid,
        sync_state: SynchronizationState,
        tenant_id: Option<String>,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let membership = state.memberships.get_mut(&membership_id).ok_or_else(|| {
            AppError::NotFound(format!("membership '{membership_id}' not found"))
        })?;

        membership.state = sync_state;
        if tenant_id.is_some() {
            membership.tenant_id = tenant_id;
        }
        Ok(())
    }

    async fn list_security_groups(
        &self,
        visible: &VisibleIds,
        query: &SecurityGroupListQuery,
    ) -> AppResult<Vec<SecurityGroup>> {
        let state = self.state.read().await;
        Ok(state
            .security_groups
            .values()
            .filter(|group| visible.contains(&group.id))
            .filter(|group| {
                let membership = state.memberships.get(&group.membership_id);
                query.cloud_id.is_none_or(|cloud_id| {
                    membership.is_some_and(|membership| membership.cloud_id == cloud_id)
                }) && query.project_id.is_none_or(|project_id| {
                    membership.is_some_and(|membership| membership.project_id == project_id)
                })
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
            .read()
            .await
            .security_groups
            .values()
            .filter(|group| group.membership_id == membership_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl InstanceRepository for InMemoryRepository {
    async fn list_instances(
        &self,
        visible: &VisibleIds,
        query: &InstanceListQuery,
    ) -> AppResult<Vec<Instance>> {
        let state = self.state.read().await;
        let mut instances: Vec<Instance> = state
            .instances
            .values()
            .filter(|instance| visible.contains(&instance.id))
            .filter(|instance| name_contains(&instance.hostname, query.hostname.as_ref()))
            .filter(|instance| query.state.is_none_or(|wanted| wanted == instance.state))
            .filter(|instance| query.project_id.is_none_or(|id| id == instance.project_id))
            .filter(|instance| {
                query.customer_id.is_none_or(|customer_id| {
                    state
                        .projects
                        .get(&instance.project_id)
                        .is_some_and(|project| project.customer_id == customer_id)
                })
            })
            .cloned()
            .collect();

        sort_instances(&mut instances, query.ordering);
        Ok(instances)
    }

    async fn find_instance(&self, instance_id: Uuid) -> AppResult<Option<Instance>> {
        Ok(self.state.read().await.instances.get(&instance_id).cloned())
    }

    async fn create_instance(&self, instance: Instance, task: NewTask) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.memberships.contains_key(&instance.membership_id) {
            return Err(AppError::Conflict(
                "membership of the instance does not exist".to_owned(),
            ));
        }

        state.versions.insert(instance.id, 1);
        state.instances.insert(instance.id, instance);
        state.enqueue(task);
        Ok(())
    }

    async fn update_instance(
        &self,
        update: InstanceUpdate,
        task: Option<NewTask>,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let instance = state
            .instances
            .get_mut(&update.id)
            .ok_or_else(|| AppError::NotFound(format!("instance '{}' not found", update.id)))?;

        instance.hostname = NonEmptyString::new(update.hostname)?;
        instance.description = update.description;
        if let Some(security_group_ids) = update.security_group_ids {
            instance.security_group_ids = security_group_ids;
        }
        if let Some(task) = task {
            state.enqueue(task);
        }
        Ok(())
    }

    async fn delete_instance_in_state(
        &self,
        instance_id: Uuid,
        expected: InstanceState,
    ) -> AppResult<bool> {
        let mut state = self.state.write().await;
        if !state
            .instances
            .get(&instance_id)
            .is_some_and(|instance| instance.state == expected)
        {
            return Ok(false);
        }

        state.instances.remove(&instance_id);
        state.versions.remove(&instance_id);
        state
            .backups
            .retain(|_, backup| backup.instance_id != instance_id);
        Ok(true)
    }
}

#[async_trait]
impl SshKeyRepository for InMemoryRepository {
    async fn list_keys(&self, owner: Option<UserId>) -> AppResult<Vec<SshPublicKey>> {
        let mut keys: Vec<SshPublicKey> = self
            .state
            .read()
            .await
            .ssh_keys
            .values()
            .filter(|key| owner.is_none_or(|owner| owner == key.user_id))
            .cloned()
            .collect();
        keys.sort_by(|left, right| left.name.as_str().cmp(right.name.as_str()));
        Ok(keys)
    }

    async fn find_key(&self, key_id: Uuid) -> AppResult<Option<SshPublicKey>> {
        Ok(self.state.read().await.ssh_keys.get(&key_id).cloned())
    }

    async fn create_key(&self, key: SshPublicKey, task: NewTask) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state
            .ssh_keys
            .values()
            .any(|stored| stored.user_id == key.user_id && stored.name == key.name)
        {
            return Err(AppError::Conflict(format!(
                "ssh key named '{}' already exists",
                key.name.as_str()
            )));
        }

        state.ssh_keys.insert(key.id, key);
        state.enqueue(task);
        Ok(())
    }

    async fn delete_key(&self, key_id: Uuid) -> AppResult<()> {
        self.state
            .write()
            .await
            .ssh_keys
            .remove(&key_id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("ssh key '{key_id}' not found")))
    }
}

#[async_trait]
impl BackupRepository for InMemoryRepository {
    async fn list_backups(&self, visible_instances: &VisibleIds) -> AppResult<Vec<Backup>> {
        Ok(self
            .state
            .read()
            .await
            .backups
            .values()
            .filter(|backup| visible_instances.contains(&backup.instance_id))
            .cloned()
            .collect())
    }

    async fn find_backup(&self, backup_id: Uuid) -> AppResult<Option<Backup>> {
        Ok(self.state.read().await.backups.get(&backup_id).cloned())
    }

    async fn create_backup(&self, backup: Backup, task: NewTask) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.instances.contains_key(&backup.instance_id) {
            return Err(AppError::Conflict(
                "backed up instance does not exist".to_owned(),
            ));
        }

        state.versions.insert(backup.id, 1);
        state.backups.insert(backup.id, backup);
        state.enqueue(task);
        Ok(())
    }
}
