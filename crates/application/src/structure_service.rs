//! Customers, project groups, projects and their role assignments.

use std::sync::Arc;

use nodeconductor_core::{AppError, AppResult, NonEmptyString, UserIdentity};
use nodeconductor_domain::{
    AuditAction, Customer, EntityKind, Project, ProjectGroup, RoleAssignment, ScopeLevel,
};
use uuid::Uuid;

use crate::{
    AuditEvent, AuditRepository, AuthorizationService, CreateCustomerInput,
    CreateProjectGroupInput, CreateProjectInput, GrantRoleInput, RoleAssignmentRepository,
    RoleGrant, ScopeFilterService, StructureListQuery, StructureRepository, UpdateCustomerInput,
    UserRepository,
};

mod customers;
mod permissions;
mod projects;


/// Application service for the structure hierarchy.
#[derive(Clone)]
pub struct StructureService {
    scope_filter: ScopeFilterService,
    authorization_service: AuthorizationService,
    repository: Arc<dyn StructureRepository>,
    role_repository: Arc<dyn RoleAssignmentRepository>,
    user_repository: Arc<dyn UserRepository>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl StructureService {
    /// Creates a new structure service.
    #[must_use]
    pub fn new(
        scope_filter: ScopeFilterService,
        authorization_service: AuthorizationService,
        repository: Arc<dyn StructureRepository>,
        role_repository: Arc<dyn RoleAssignmentRepository>,
        user_repository: Arc<dyn UserRepository>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            scope_filter,
            authorization_service,
            repository,
            role_repository,
            user_repository,
            audit_repository,
        }
    }

    async fn audit(
        &self,
        actor: &UserIdentity,
        action: AuditAction,
        resource_type: &str,
        resource_id: Uuid,
        detail: String,
    ) {
        self.audit_repository
            .record(AuditEvent {
                subject: actor.user_id().to_string(),
                action,
                resource_type: resource_type.to_owned(),
                resource_id,
                detail: Some(detail),
            })
            .await;
    }
}
