use chrono::Utc;
use nodeconductor_application::{
    CloudRepository, InstanceRepository, NewTask, RoleScopeRepository, StateWrite,
    StatefulRepository, StructureRepository, TaskQueueRepository,
};
use nodeconductor_core::{AppError, NonEmptyString, UserId};
use nodeconductor_domain::{
    Cloud, CloudProjectMembership, Customer, EntityKind, Instance, InstanceState, Project,
    RoleAssignment, RoleScope, ScopeLevel, Role, StatefulKind, SynchronizationState, TaskName,
    TransitionEffect,
};
use uuid::Uuid;

use super::InMemoryRepository;

fn name(value: &str) -> NonEmptyString {
    NonEmptyString::new(value).unwrap_or_else(|_| panic!("fixture names are not empty"))
}

async fn seed_instance(repository: &InMemoryRepository, state: InstanceState) -> (Uuid, Uuid) {
    let customer_id = Uuid::new_v4();
    let project_id = Uuid::new_v4();
    let cloud_id = Uuid::new_v4();
    let membership_id = Uuid::new_v4();
    let instance_id = Uuid::new_v4();

    let seeded = async {
        repository
            .save_customer(Customer {
                id: customer_id,
                name: name("Acme"),
                native_name: None,
                abbreviation: None,
                contact_details: None,
                created_at: Utc::now(),
            })
            .await?;
        repository
            .create_project(Project {
                id: project_id,
                customer_id,
                name: name("Web"),
                description: None,
                project_group_ids: Vec::new(),
                created_at: Utc::now(),
            })
            .await?;
        repository
            .create_cloud(
                Cloud {
                    id: cloud_id,
                    customer_id,
                    name: name("Main"),
                    auth_url: "https://keystone.example.com/v2.0".to_owned(),
                    created_at: Utc::now(),
                },
                NewTask::new(TaskName::SyncCloudAccount, cloud_id),
            )
            .await?;
        repository
            .create_membership(
                CloudProjectMembership {
                    id: membership_id,
                    cloud_id,
                    project_id,
                    tenant_id: None,
                    state: SynchronizationState::InSync,
                    created_at: Utc::now(),
                },
                Vec::new(),
                NewTask::new(TaskName::SyncCloudMembership, membership_id),
            )
            .await?;
        repository
            .create_instance(
                Instance {
                    id: instance_id,
                    hostname: name("web-1"),
                    description: None,
                    membership_id,
                    project_id,
                    cloud_id,
                    flavor_id: Uuid::new_v4(),
                    template_name: None,
                    cores: 1,
                    ram: 1024,
                    system_volume_size: 10240,
                    data_volume_size: 20480,
                    agreed_sla: None,
                    security_group_ids: Vec::new(),
                    state,
                    start_time: None,
                    created_at: Utc::now(),
                },
                NewTask::new(TaskName::ProvisionInstance, instance_id),
            )
            .await
    };
    assert!(seeded.await.is_ok());

    (project_id, instance_id)
}

#[tokio::test]
async fn project_role_reaches_instances_of_its_memberships() {
    let repository = InMemoryRepository::new();
    let (project_id, instance_id) = seed_instance(&repository, InstanceState::Online).await;

    let scope = RoleScope::from_assignments(&[RoleAssignment {
        id: Uuid::new_v4(),
        user_id: UserId::new(),
        level: ScopeLevel::Project,
        scope_id: project_id,
        role: Role::Administrator,
    }]);

    let instances = repository
        .ids_within_scope(EntityKind::Instance, &scope)
        .await
        .unwrap_or_default();
    assert!(instances.contains(&instance_id));

    let unrelated = repository
        .ids_within_scope(EntityKind::Instance, &RoleScope::default())
        .await
        .unwrap_or_default();
    assert!(unrelated.is_empty());
}

#[tokio::test]
async fn compare_and_write_rejects_stale_snapshot() {
    let repository = InMemoryRepository::new();
    let (_, instance_id) = seed_instance(&repository, InstanceState::Offline).await;

    let write = StateWrite {
        kind: StatefulKind::Instance,
        id: instance_id,
        expected_state: "offline".to_owned(),
        expected_version: 1,
        target_state: "starting",
        effect: TransitionEffect::None,
        follow_up: Some(NewTask::new(TaskName::StartInstance, instance_id)),
    };

    assert!(repository.compare_and_write(write.clone()).await.unwrap_or(false));
    assert!(!repository.compare_and_write(write).await.unwrap_or(true));

    let starts = repository
        .pending_tasks()
        .await
        .into_iter()
        .filter(|task| task.task == TaskName::StartInstance)
        .count();
    assert_eq!(starts, 1);
}

#[tokio::test]
async fn leased_task_completes_only_with_its_token() {
    let repository = InMemoryRepository::new();
    let enqueued = repository
        .enqueue(NewTask::new(TaskName::PushSshPublicKeys, Uuid::new_v4()))
        .await;
    assert!(enqueued.is_ok());

    let claimed = repository
        .claim_tasks("worker-1", 10, 60)
        .await
        .unwrap_or_default();
    assert_eq!(claimed.len(), 1);
    assert!(
        repository
            .claim_tasks("worker-2", 10, 60)
            .await
            .unwrap_or_default()
            .is_empty()
    );

    let task = &claimed[0];
    let wrong = repository.complete_task(task.job_id, "worker-1", "forged").await;
    assert!(matches!(wrong, Err(AppError::Conflict(_))));
    assert!(
        repository
            .complete_task(task.job_id, "worker-1", task.lease_token.as_str())
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn deletion_requires_the_expected_state() {
    let repository = InMemoryRepository::new();
    let (_, instance_id) = seed_instance(&repository, InstanceState::Online).await;

    assert!(
        !repository
            .delete_instance_in_state(instance_id, InstanceState::Deleting)
            .await
            .unwrap_or(true)
    );
    assert!(
        repository
            .find_instance(instance_id)
            .await
            .ok()
            .flatten()
            .is_some()
    );
}
