use nodeconductor_domain::{
    Cloud, CloudProjectMembership, Flavor, Instance, InstanceState, SecurityGroup,
    SecurityGroupRule, SshPublicKey, SynchronizationState,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Incoming payload for cloud account registration.
#[derive(Debug, Deserialize)]
pub struct CreateCloudRequest {
    pub customer_id: Uuid,
    pub name: String,
    pub auth_url: String,
}

/// API representation of a cloud account.
#[derive(Debug, Serialize)]
pub struct CloudResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
    pub auth_url: String,
    pub created_at: String,
}

impl From<Cloud> for CloudResponse {
    fn from(cloud: Cloud) -> Self {
        Self {
            id: cloud.id,
            customer_id: cloud.customer_id,
            name: cloud.name.into(),
            auth_url: cloud.auth_url,
            created_at: cloud.created_at.to_rfc3339(),
        }
    }
}

/// API representation of a flavor.
#[derive(Debug, Serialize)]
pub struct FlavorResponse {
    pub id: Uuid,
    pub cloud_id: Uuid,
    pub name: String,
    pub cores: i32,
    pub ram: i32,
    pub disk: i32,
}

impl From<Flavor> for FlavorResponse {
    fn from(flavor: Flavor) -> Self {
        Self {
            id: flavor.id,
            cloud_id: flavor.cloud_id,
            name: flavor.name,
            cores: flavor.cores,
            ram: flavor.ram,
            disk: flavor.disk,
        }
    }
}

/// Incoming payload for linking a cloud to a project.
#[derive(Debug, Deserialize)]
pub struct CreateMembershipRequest {
    pub cloud_id: Uuid,
    pub project_id: Uuid,
}

/// API representation of a cloud-project membership.
#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub id: Uuid,
    pub cloud_id: Uuid,
    pub project_id: Uuid,
    pub tenant_id: Option<String>,
    pub state: SynchronizationState,
    pub created_at: String,
}

impl From<CloudProjectMembership> for MembershipResponse {
    fn from(membership: CloudProjectMembership) -> Self {
        Self {
            id: membership.id,
            cloud_id: membership.cloud_id,
            project_id: membership.project_id,
            tenant_id: membership.tenant_id,
            state: membership.state,
            created_at: membership.created_at.to_rfc3339(),
        }
    }
}

/// API representation of a security group.
#[derive(Debug, Serialize)]
pub struct SecurityGroupResponse {
    pub id: Uuid,
    pub membership_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub rules: Vec<SecurityGroupRule>,
}

impl From<SecurityGroup> for SecurityGroupResponse {
    fn from(group: SecurityGroup) -> Self {
        Self {
            id: group.id,
            membership_id: group.membership_id,
            name: group.name.into(),
            description: group.description,
            rules: group.rules,
        }
    }
}

/// Incoming payload for instance creation.
#[derive(Debug, Deserialize)]
pub struct CreateInstanceRequest {
    pub project_id: Uuid,
    pub flavor_id: Uuid,
    pub hostname: String,
    pub description: Option<String>,
    pub template_name: Option<String>,
    pub agreed_sla: Option<f64>,
    pub data_volume_size: Option<i32>,
    #[serde(default)]
    pub security_group_ids: Vec<Uuid>,
    pub ssh_key_id: Option<Uuid>,
}

/// Incoming payload for instance edits.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateInstanceRequest {
    pub hostname: Option<String>,
    pub description: Option<String>,
    pub security_group_ids: Option<Vec<Uuid>>,
}

/// Incoming payload for the resize action; exactly one field is expected.
#[derive(Debug, Default, Deserialize)]
pub struct ResizeInstanceRequest {
    pub flavor: Option<Uuid>,
    pub disk_size: Option<i32>,
}

/// API representation of a VM instance.
#[derive(Debug, Serialize)]
pub struct InstanceResponse {
    pub id: Uuid,
    pub hostname: String,
    pub description: Option<String>,
    pub membership_id: Uuid,
    pub project_id: Uuid,
    pub cloud_id: Uuid,
    pub flavor_id: Uuid,
    pub template_name: Option<String>,
    pub cores: i32,
    pub ram: i32,
    pub system_volume_size: i32,
    pub data_volume_size: i32,
    pub agreed_sla: Option<f64>,
    pub security_group_ids: Vec<Uuid>,
    pub state: InstanceState,
    pub start_time: Option<String>,
    pub created_at: String,
}

impl From<Instance> for InstanceResponse {
    fn from(instance: Instance) -> Self {
        Self {
            id: instance.id,
            hostname: instance.hostname.into(),
            description: instance.description,
            membership_id: instance.membership_id,
            project_id: instance.project_id,
            cloud_id: instance.cloud_id,
            flavor_id: instance.flavor_id,
            template_name: instance.template_name,
            cores: instance.cores,
            ram: instance.ram,
            system_volume_size: instance.system_volume_size,
            data_volume_size: instance.data_volume_size,
            agreed_sla: instance.agreed_sla,
            security_group_ids: instance.security_group_ids,
            state: instance.state,
            start_time: instance.start_time.map(|value| value.to_rfc3339()),
            created_at: instance.created_at.to_rfc3339(),
        }
    }
}

/// Incoming payload for SSH key uploads.
#[derive(Debug, Deserialize)]
pub struct CreateSshKeyRequest {
    pub name: String,
    pub public_key: String,
}

/// API representation of an SSH public key.
#[derive(Debug, Serialize)]
pub struct SshKeyResponse {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub public_key: String,
    pub fingerprint: String,
    pub created_at: String,
}

impl From<SshPublicKey> for SshKeyResponse {
    fn from(key: SshPublicKey) -> Self {
        Self {
            id: key.id,
            user_id: key.user_id.to_string(),
            name: key.name.into(),
            public_key: key.public_key,
            fingerprint: key.fingerprint,
            created_at: key.created_at.to_rfc3339(),
        }
    }
}
