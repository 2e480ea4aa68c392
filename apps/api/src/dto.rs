mod backups;
mod common;
mod iaas;
mod stats;
mod structure;

pub use backups::{BackupResponse, CreateBackupRequest};
pub use common::{
    HealthResponse, LoginRequest, OperationStatusResponse, UserIdentityResponse,
};
pub use iaas::{
    CloudResponse, CreateCloudRequest, CreateInstanceRequest, CreateMembershipRequest,
    CreateSshKeyRequest, FlavorResponse, InstanceResponse, MembershipResponse,
    ResizeInstanceRequest, SecurityGroupResponse, SshKeyResponse, UpdateInstanceRequest,
};
pub use stats::{CustomerStatsResponse, QuotaStatsResponse, TimeSegmentResponse};
pub use structure::{
    CreateCustomerRequest, CreateProjectGroupRequest, CreateProjectRequest, CustomerResponse,
    GrantRoleRequest, ProjectCloudResponse, ProjectGroupLinkRequest, ProjectGroupResponse,
    ProjectResponse, RoleAssignmentResponse, UpdateCustomerRequest,
};
