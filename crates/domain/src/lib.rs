//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod backup;
mod cloud;
mod entity;
mod instance;
mod scope;
mod security;
mod security_group;
mod ssh_key;
mod state_machine;
mod structure;
mod task;

pub use backup::{Backup, BackupState, BackupTransition};
pub use cloud::{
    Cloud, CloudProjectMembership, Flavor, MembershipQuotas, QuotaTotals, ResourceQuota,
    SynchronizationState,
};
pub use entity::EntityKind;
pub use instance::{
    Instance, InstanceOperation, InstanceState, InstanceTransition, NewInstance, ResizeTarget,
};
pub use scope::{RoleScope, VisibleIds};
pub use security::AuditAction;
pub use security_group::{
    SecurityGroup, SecurityGroupRule, SecurityGroupTemplate, SecurityProtocol,
    parse_default_security_groups,
};
pub use ssh_key::{SshPublicKey, ssh_key_fingerprint};
pub use state_machine::{
    StateMachine, StatefulKind, Transition, TransitionEffect, TransitionRejection, next_state,
};
pub use structure::{
    Customer, Project, ProjectGroup, Role, RoleAssignment, ScopeLevel,
};
pub use task::TaskName;
