use std::str::FromStr;

use async_trait::async_trait;
use nodeconductor_core::{AppError, AppResult, UserId};
use nodeconductor_domain::{
    Cloud, CloudProjectMembership, Flavor, Instance, InstanceState, SecurityGroup, SshPublicKey,
    SynchronizationState, VisibleIds,
};
use uuid::Uuid;

use crate::NewTask;

/// Cloud listing filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudListQuery {
    /// Case-insensitive name fragment.
    pub name: Option<String>,
    /// Owning customer.
    pub customer_id: Option<Uuid>,
}

/// Security group listing filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityGroupListQuery {
    /// Cloud of the owning membership.
    pub cloud_id: Option<Uuid>,
    /// Project of the owning membership.
    pub project_id: Option<Uuid>,
}

/// Sort order of instance listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InstanceOrdering {
    /// Oldest first.
    #[default]
    CreatedAt,
    /// Newest first.
    CreatedAtDesc,
    /// Host name ascending.
    Hostname,
    /// Host name descending.
    HostnameDesc,
    /// State ascending.
    State,
    /// State descending.
    StateDesc,
}

impl FromStr for InstanceOrdering {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "created" | "created_at" => Ok(Self::CreatedAt),
            "-created" | "-created_at" => Ok(Self::CreatedAtDesc),
            "hostname" => Ok(Self::Hostname),
            "-hostname" => Ok(Self::HostnameDesc),
            "state" => Ok(Self::State),
            "-state" => Ok(Self::StateDesc),
            _ => Err(AppError::Validation(format!("unknown ordering '{value}'"))),
        }
    }
}

/// Instance listing filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceListQuery {
    /// Case-insensitive host name fragment.
    pub hostname: Option<String>,
    /// Exact state.
    pub state: Option<InstanceState>,
    /// Project of the membership.
    pub project_id: Option<Uuid>,
    /// Customer of the project.
    pub customer_id: Option<Uuid>,
    /// Sort order.
    pub ordering: InstanceOrdering,
}

/// Editable instance fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceUpdate {
    /// Instance identifier.
    pub id: Uuid,
    /// New host name.
    pub hostname: String,
    /// New description.
    pub description: Option<String>,
    /// Replacement security group set, when changed.
    pub security_group_ids: Option<Vec<Uuid>>,
}

/// Repository port for clouds, flavors, memberships and security groups.
#[async_trait]
pub trait CloudRepository: Send + Sync {
    /// Lists visible clouds.
    async fn list_clouds(&self, visible: &VisibleIds, query: &CloudListQuery)
    -> AppResult<Vec<Cloud>>;

    /// Returns one cloud.
    async fn find_cloud(&self, cloud_id: Uuid) -> AppResult<Option<Cloud>>;

    /// Inserts a cloud and enqueues its account sync in one transaction.
    async fn create_cloud(&self, cloud: Cloud, task: NewTask) -> AppResult<()>;

    /// Lists visible flavors, optionally of one cloud.
    async fn list_flavors(
        &self,
        visible: &VisibleIds,
        cloud_id: Option<Uuid>,
    ) -> AppResult<Vec<Flavor>>;

    /// Returns one flavor.
    async fn find_flavor(&self, flavor_id: Uuid) -> AppResult<Option<Flavor>>;

    /// Inserts or refreshes the flavors of a cloud by name.
    async fn upsert_flavors(&self, cloud_id: Uuid, flavors: Vec<Flavor>) -> AppResult<()>;

    /// Lists visible memberships.
    async fn list_memberships(&self, visible: &VisibleIds)
    -> AppResult<Vec<CloudProjectMembership>>;

    /// Returns one membership.
    async fn find_membership(&self, membership_id: Uuid)
    -> AppResult<Option<CloudProjectMembership>>;

    /// Returns the membership linking `cloud_id` to `project_id`.
    async fn find_membership_by_link(
        &self,
        cloud_id: Uuid,
        project_id: Uuid,
    ) -> AppResult<Option<CloudProjectMembership>>;

    /// Inserts a membership with its default security groups and enqueues the
    /// tenant sync in one transaction.
    async fn create_membership(
        &self,
        membership: CloudProjectMembership,
        security_groups: Vec<SecurityGroup>,
        task: NewTask,
    ) -> AppResult<()>;

    /// Updates the synchronization state of one membership.
    async fn set_membership_state(
        &self,
        membership_id: Uuid,
        state: SynchronizationState,
        tenant_id: Option<String>,
    ) -> AppResult<()>;

    /// Lists visible security groups.
    async fn list_security_groups(
        &self,
        visible: &VisibleIds,
        query: &SecurityGroupListQuery,
    ) -> AppResult<Vec<SecurityGroup>>;

    /// Lists the security groups of one membership.
    async fn list_membership_security_groups(
        &self,
        membership_id: Uuid,
    ) -> AppResult<Vec<SecurityGroup>>;
}

/// Repository port for instances.
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    /// Lists visible instances.
    async fn list_instances(
        &self,
        visible: &VisibleIds,
        query: &InstanceListQuery,
    ) -> AppResult<Vec<Instance>>;

    /// Returns one instance.
    async fn find_instance(&self, instance_id: Uuid) -> AppResult<Option<Instance>>;

    /// Inserts an instance and enqueues its provisioning in one transaction.
    async fn create_instance(&self, instance: Instance, task: NewTask) -> AppResult<()>;

    /// Updates editable fields and optionally enqueues a follow-up task.
    async fn update_instance(&self, update: InstanceUpdate, task: Option<NewTask>)
    -> AppResult<()>;

    /// Deletes the row only while it is in `state`; returns whether it was deleted.
    async fn delete_instance_in_state(
        &self,
        instance_id: Uuid,
        state: InstanceState,
    ) -> AppResult<bool>;
}

/// Repository port for SSH public keys.
#[async_trait]
pub trait SshKeyRepository: Send + Sync {
    /// Lists keys, optionally of one owner.
    async fn list_keys(&self, owner: Option<UserId>) -> AppResult<Vec<SshPublicKey>>;

    /// Returns one key.
    async fn find_key(&self, key_id: Uuid) -> AppResult<Option<SshPublicKey>>;

    /// Inserts a key and enqueues its push in one transaction; duplicate
    /// names per owner fail with `Conflict`.
    async fn create_key(&self, key: SshPublicKey, task: NewTask) -> AppResult<()>;

    /// Deletes one key.
    async fn delete_key(&self, key_id: Uuid) -> AppResult<()>;
}
