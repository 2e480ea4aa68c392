use nodeconductor_application::{
    BackupService, CloudService, InstanceService, SshKeyService, StatsService, StructureService,
    TaskQueueService, UserService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub structure_service: StructureService,
    pub cloud_service: CloudService,
    pub instance_service: InstanceService,
    pub ssh_key_service: SshKeyService,
    pub backup_service: BackupService,
    pub stats_service: StatsService,
    pub task_queue_service: TaskQueueService,
    pub frontend_url: String,
    pub worker_shared_secret: String,
    pub worker_max_claim_limit: usize,
    pub worker_default_lease_seconds: u32,
}
