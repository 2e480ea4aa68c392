use std::sync::Arc;

use nodeconductor_application::{
    AuditRepository, AuthorizationService, BackupRepository, BackupService, CloudRepository,
    CloudService, InstanceRepository, InstanceService, PasswordHasher, RoleAssignmentRepository,
    RoleScopeRepository, ScopeFilterService, SshKeyRepository, SshKeyService,
    StateTransitionExecutor, StatefulRepository, StatsRepository, StatsService,
    StructureRepository, StructureService, TaskQueueRepository, TaskQueueService, UserRepository,
    UserService,
};
use nodeconductor_core::AppError;
use nodeconductor_domain::{SecurityGroupTemplate, parse_default_security_groups};
use nodeconductor_infrastructure::{
    Argon2PasswordHasher, PostgresAuditRepository, PostgresBackupRepository,
    PostgresCloudRepository, PostgresInstanceRepository, PostgresScopeRepository,
    PostgresSshKeyRepository, PostgresStateRepository, PostgresStatsRepository,
    PostgresStructureRepository, PostgresTaskQueueRepository, PostgresUserRepository,
};
use sqlx::PgPool;
use tracing::warn;

use crate::api_config::ApiConfig;
use crate::state::AppState;

struct RepositorySet {
    users: Arc<dyn UserRepository>,
    scopes: Arc<dyn RoleScopeRepository>,
    structure: Arc<dyn StructureRepository>,
    roles: Arc<dyn RoleAssignmentRepository>,
    clouds: Arc<dyn CloudRepository>,
    instances: Arc<dyn InstanceRepository>,
    ssh_keys: Arc<dyn SshKeyRepository>,
    backups: Arc<dyn BackupRepository>,
    states: Arc<dyn StatefulRepository>,
    tasks: Arc<dyn TaskQueueRepository>,
    audit: Arc<dyn AuditRepository>,
    stats: Arc<dyn StatsRepository>,
}

impl RepositorySet {
    fn postgres(pool: &PgPool) -> Self {
        let structure = Arc::new(PostgresStructureRepository::new(pool.clone()));
        Self {
            users: Arc::new(PostgresUserRepository::new(pool.clone())),
            scopes: Arc::new(PostgresScopeRepository::new(pool.clone())),
            structure: structure.clone(),
            roles: structure,
            clouds: Arc::new(PostgresCloudRepository::new(pool.clone())),
            instances: Arc::new(PostgresInstanceRepository::new(pool.clone())),
            ssh_keys: Arc::new(PostgresSshKeyRepository::new(pool.clone())),
            backups: Arc::new(PostgresBackupRepository::new(pool.clone())),
            states: Arc::new(PostgresStateRepository::new(pool.clone())),
            tasks: Arc::new(PostgresTaskQueueRepository::new(pool.clone())),
            audit: Arc::new(PostgresAuditRepository::new(pool.clone())),
            stats: Arc::new(PostgresStatsRepository::new(pool.clone())),
        }
    }
}

struct StateSettings {
    frontend_url: String,
    worker_shared_secret: String,
    worker_max_claim_limit: usize,
    worker_default_lease_seconds: u32,
    default_security_groups: Vec<SecurityGroupTemplate>,
}

pub fn build_app_state(pool: PgPool, config: &ApiConfig) -> Result<AppState, AppError> {
    let default_security_groups = match config.default_security_groups.as_deref() {
        Some(raw) => {
            let (templates, skipped) = parse_default_security_groups(raw)?;
            for message in skipped {
                warn!(reason = %message, "skipping misconfigured default security group");
            }
            templates
        }
        None => Vec::new(),
    };

    Ok(assemble(
        RepositorySet::postgres(&pool),
        Arc::new(Argon2PasswordHasher::new()),
        StateSettings {
            frontend_url: config.frontend_url.clone(),
            worker_shared_secret: config.worker_shared_secret.clone(),
            worker_max_claim_limit: config.worker_max_claim_limit,
            worker_default_lease_seconds: config.worker_default_lease_seconds,
            default_security_groups,
        },
    ))
}

fn assemble(
    repositories: RepositorySet,
    password_hasher: Arc<dyn PasswordHasher>,
    settings: StateSettings,
) -> AppState {
    let scope_filter = ScopeFilterService::new(repositories.scopes);
    let authorization_service =
        AuthorizationService::new(repositories.roles.clone(), repositories.structure.clone());
    let executor =
        StateTransitionExecutor::new(repositories.states, repositories.audit.clone());

    AppState {
        user_service: UserService::new(repositories.users.clone(), password_hasher),
        structure_service: StructureService::new(
            scope_filter.clone(),
            authorization_service.clone(),
            repositories.structure.clone(),
            repositories.roles,
            repositories.users,
            repositories.audit.clone(),
        ),
        cloud_service: CloudService::new(
            scope_filter.clone(),
            authorization_service.clone(),
            repositories.clouds.clone(),
            repositories.structure.clone(),
            repositories.audit.clone(),
            settings.default_security_groups,
        ),
        instance_service: InstanceService::new(
            scope_filter.clone(),
            authorization_service.clone(),
            executor.clone(),
            repositories.instances.clone(),
            repositories.clouds.clone(),
            repositories.audit.clone(),
        ),
        ssh_key_service: SshKeyService::new(
            scope_filter.clone(),
            repositories.ssh_keys,
            repositories.clouds,
            repositories.audit.clone(),
        ),
        backup_service: BackupService::new(
            scope_filter.clone(),
            authorization_service,
            executor,
            repositories.backups,
            repositories.instances,
            repositories.audit,
        ),
        stats_service: StatsService::new(scope_filter, repositories.structure, repositories.stats),
        task_queue_service: TaskQueueService::new(
            repositories.tasks,
            settings.worker_max_claim_limit,
        ),
        frontend_url: settings.frontend_url,
        worker_shared_secret: settings.worker_shared_secret,
        worker_max_claim_limit: settings.worker_max_claim_limit,
        worker_default_lease_seconds: settings.worker_default_lease_seconds,
    }
}

/// Wires every service to one shared in-memory repository.
#[cfg(test)]
pub(crate) fn in_memory_app_state(
    repository: Arc<nodeconductor_infrastructure::InMemoryRepository>,
) -> AppState {
    assemble(
        RepositorySet {
            users: repository.clone(),
            scopes: repository.clone(),
            structure: repository.clone(),
            roles: repository.clone(),
            clouds: repository.clone(),
            instances: repository.clone(),
            ssh_keys: repository.clone(),
            backups: repository.clone(),
            states: repository.clone(),
            tasks: repository.clone(),
            audit: repository.clone(),
            stats: repository,
        },
        Arc::new(Argon2PasswordHasher::new()),
        StateSettings {
            frontend_url: "http://localhost:3000".to_owned(),
            worker_shared_secret: "worker-shared-secret".to_owned(),
            worker_max_claim_limit: 25,
            worker_default_lease_seconds: 120,
            default_security_groups: Vec::new(),
        },
    )
}
