//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_ports;
mod authorization_service;
mod backup_ports;
mod backup_service;
mod cloud_service;
mod iaas_ports;
mod instance_service;
mod scope_filter_service;
mod scope_ports;
mod ssh_key_service;
mod stats_ports;
mod stats_service;
mod structure_ports;
mod structure_service;
mod task_ports;
mod task_processor;
mod task_service;
mod transition_executor;
mod transition_ports;
mod user_service;

#[cfg(test)]
mod test_support;

pub use audit_ports::{AuditEvent, AuditRepository};
pub use authorization_service::AuthorizationService;
pub use backup_ports::BackupRepository;
pub use backup_service::{BackupService, CreateBackupInput};
pub use cloud_service::{CloudService, CreateCloudInput};
pub use iaas_ports::{
    CloudListQuery, CloudRepository, InstanceListQuery, InstanceOrdering, InstanceRepository,
    InstanceUpdate, SecurityGroupListQuery, SshKeyRepository,
};
pub use instance_service::{
    CreateInstanceInput, InstanceService, OperationScheduled, ResizeInstanceInput,
    UpdateInstanceInput,
};
pub use scope_filter_service::{ResolvedScope, ScopeFilterService};
pub use scope_ports::RoleScopeRepository;
pub use ssh_key_service::SshKeyService;
pub use stats_ports::StatsRepository;
pub use stats_service::{CreationTimeQuery, CustomerStats, StatsService, TimeSegment};
pub use structure_ports::{
    CreateCustomerInput, CreateProjectGroupInput, CreateProjectInput, GrantRoleInput,
    RoleAssignmentRepository, RoleGrant, StructureListQuery, StructureRepository,
    UpdateCustomerInput,
};
pub use structure_service::StructureService;
pub use task_ports::{ClaimedTask, CloudBackend, NewTask, TaskQueueRepository, WorkerHeartbeatInput};
pub use task_processor::TaskProcessor;
pub use task_service::TaskQueueService;
pub use transition_executor::{
    StateChangeError, StateChangeReason, StateTransitionExecutor, TransitionRequest,
};
pub use transition_ports::{StateSnapshot, StateWrite, StatefulRepository};
pub use user_service::{PasswordHasher, UserRecord, UserRepository, UserService};
