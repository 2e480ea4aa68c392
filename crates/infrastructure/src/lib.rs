//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod argon2_password_hasher;
mod http_cloud_backend;
mod in_memory_repository;
mod postgres_audit_repository;
mod postgres_backup_repository;
mod postgres_cloud_repository;
mod postgres_errors;
mod postgres_instance_repository;
mod postgres_scope_repository;
mod postgres_ssh_key_repository;
mod postgres_state_repository;
mod postgres_stats_repository;
mod postgres_structure_repository;
mod postgres_task_queue_repository;
#[cfg(test)]
mod postgres_test_support;
mod postgres_user_repository;
mod simulated_cloud_backend;

pub use argon2_password_hasher::Argon2PasswordHasher;
pub use http_cloud_backend::HttpCloudBackend;
pub use in_memory_repository::InMemoryRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_backup_repository::PostgresBackupRepository;
pub use postgres_cloud_repository::PostgresCloudRepository;
pub use postgres_instance_repository::PostgresInstanceRepository;
pub use postgres_scope_repository::PostgresScopeRepository;
pub use postgres_ssh_key_repository::PostgresSshKeyRepository;
pub use postgres_state_repository::PostgresStateRepository;
pub use postgres_stats_repository::PostgresStatsRepository;
pub use postgres_structure_repository::PostgresStructureRepository;
pub use postgres_task_queue_repository::PostgresTaskQueueRepository;
pub use postgres_user_repository::PostgresUserRepository;
pub use simulated_cloud_backend::SimulatedCloudBackend;
