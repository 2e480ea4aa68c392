use std::sync::Arc;

use chrono::Utc;
use nodeconductor_application::{
    CloudRepository, InstanceRepository, NewTask, StructureRepository, UserRecord, UserRepository,
};
use nodeconductor_core::{AppResult, NonEmptyString, UserId, UserIdentity};
use nodeconductor_domain::{
    Cloud, CloudProjectMembership, Customer, Instance, InstanceState, Project,
    SynchronizationState, TaskName,
};
use nodeconductor_infrastructure::InMemoryRepository;
use uuid::Uuid;

use crate::api_services::in_memory_app_state;
use crate::state::AppState;

pub(crate) struct Fixture {
    pub(crate) repository: Arc<InMemoryRepository>,
    pub(crate) state: AppState,
    pub(crate) staff: UserIdentity,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        let repository = Arc::new(InMemoryRepository::new());
        let state = in_memory_app_state(repository.clone());
        Self {
            repository,
            state,
            staff: UserIdentity::new(UserId::new(), "root", "Root", true),
        }
    }

    pub(crate) async fn regular_user(&self, username: &str) -> UserIdentity {
        let record = UserRecord {
            id: UserId::new(),
            username: username.to_owned(),
            full_name: username.to_owned(),
            password_hash: "unused".to_owned(),
            is_staff: false,
        };
        let identity = record.identity();
        assert!(self.repository.create(record).await.is_ok());
        identity
    }

    pub(crate) async fn customer(&self) -> Uuid {
        let customer_id = Uuid::new_v4();
        let saved = self
            .repository
            .save_customer(Customer {
                id: customer_id,
                name: name("Acme"),
                native_name: None,
                abbreviation: None,
                contact_details: None,
                created_at: Utc::now(),
            })
            .await;
        assert!(saved.is_ok());
        customer_id
    }

    pub(crate) async fn project(&self, customer_id: Uuid) -> Uuid {
        let project_id = Uuid::new_v4();
        let created = self
            .repository
            .create_project(Project {
                id: project_id,
                customer_id,
                name: name("Web"),
                description: None,
                project_group_ids: Vec::new(),
                created_at: Utc::now(),
            })
            .await;
        assert!(created.is_ok());
        project_id
    }

    /// Seeds a customer, project, cloud, membership and one instance.
    ///
    /// Returns `(project_id, instance_id)`.
    pub(crate) async fn instance(&self, state: InstanceState) -> (Uuid, Uuid) {
        let customer_id = self.customer().await;
        let project_id = self.project(customer_id).await;
        let Ok(instance_id) = self.seed_instance(customer_id, project_id, state).await else {
            panic!("instance fixture should persist");
        };

        (project_id, instance_id)
    }

    async fn seed_instance(
        &self,
        customer_id: Uuid,
        project_id: Uuid,
        state: InstanceState,
    ) -> AppResult<Uuid> {
        let cloud_id = Uuid::new_v4();
        let membership_id = Uuid::new_v4();
        let instance_id = Uuid::new_v4();

        self.repository
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
        self.repository
            .create_membership(
                CloudProjectMembership {
                    id: membership_id,
                    cloud_id,
                    project_id,
                    tenant_id: Some("tenant".to_owned()),
                    state: SynchronizationState::InSync,
                    created_at: Utc::now(),
                },
                Vec::new(),
                NewTask::new(TaskName::SyncCloudMembership, membership_id),
            )
            .await?;
        self.repository
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
            .await?;

        Ok(instance_id)
    }
}

fn name(value: &str) -> NonEmptyString {
    NonEmptyString::new(value).unwrap_or_else(|_| panic!("fixture names are not empty"))
}
