use chrono::Utc;
use nodeconductor_application::{CloudRepository, NewTask, SecurityGroupListQuery};
use nodeconductor_core::AppError;
use nodeconductor_domain::{
    Cloud, CloudProjectMembership, Flavor, SynchronizationState, TaskName, VisibleIds,
    parse_default_security_groups,
};
use uuid::Uuid;

use super::PostgresCloudRepository;
use crate::postgres_test_support::{insert_customer, insert_project, test_pool};

fn flavor(cloud_id: Uuid, name: &str, cores: i32) -> Flavor {
    Flavor {
        id: Uuid::new_v4(),
        cloud_id,
        name: name.to_owned(),
        cores,
        ram: 2048,
        disk: 20480,
    }
}

#[tokio::test]
async fn flavor_sync_updates_existing_names() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresCloudRepository::new(pool.clone());
    let customer_id = insert_customer(&pool).await;
    let Ok(cloud) = Cloud::new(customer_id, "Main", "https://keystone.example.com:5000/v2.0")
    else {
        panic!("cloud must be valid");
    };
    let created = repository
        .create_cloud(cloud.clone(), NewTask::new(TaskName::SyncCloudAccount, cloud.id))
        .await;
    assert!(created.is_ok());

    let first = repository
        .upsert_flavors(cloud.id, vec![flavor(cloud.id, "m1.small", 1)])
        .await;
    let second = repository
        .upsert_flavors(cloud.id, vec![flavor(cloud.id, "m1.small", 2)])
        .await;
    assert!(first.is_ok() && second.is_ok());

    let flavors = repository
        .list_flavors(&VisibleIds::Unrestricted, Some(cloud.id))
        .await
        .unwrap_or_default();
    assert_eq!(flavors.len(), 1);
    assert_eq!(flavors[0].cores, 2);
}

#[tokio::test]
async fn membership_is_created_with_security_groups_and_unique_per_link() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresCloudRepository::new(pool.clone());
    let customer_id = insert_customer(&pool).await;
    let project_id = insert_project(&pool, customer_id).await;
    let Ok(cloud) = Cloud::new(customer_id, "Main", "https://keystone.example.com")
    else {
        panic!("cloud must be valid");
    };
    let created = repository
        .create_cloud(cloud.clone(), NewTask::new(TaskName::SyncCloudAccount, cloud.id))
        .await;
    assert!(created.is_ok());

    let (templates, _) = parse_default_security_groups(
        r#"[{"name": "http", "description": "Web", "rules": [
            {"protocol": "tcp", "cidr": "0.0.0.0/0", "from_port": 80, "to_port": 80}
        ]}]"#,
    )
    .unwrap_or_default();
    let membership = CloudProjectMembership {
        id: Uuid::new_v4(),
        cloud_id: cloud.id,
        project_id,
        tenant_id: None,
        state: SynchronizationState::New,
        created_at: Utc::now(),
    };
    let groups = templates
        .iter()
        .map(|template| template.instantiate(membership.id))
        .collect();

    let result = repository
        .create_membership(
            membership.clone(),
            groups,
            NewTask::new(TaskName::SyncCloudMembership, membership.id),
        )
        .await;
    assert!(result.is_ok());

    let stored = repository
        .list_security_groups(
            &VisibleIds::Unrestricted,
            &SecurityGroupListQuery {
                cloud_id: Some(cloud.id),
                project_id: Some(project_id),
            },
        )
        .await
        .unwrap_or_default();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].rules.len(), 1);

    let duplicate = CloudProjectMembership {
        id: Uuid::new_v4(),
        ..membership
    };
    let result = repository
        .create_membership(
            duplicate.clone(),
            Vec::new(),
            NewTask::new(TaskName::SyncCloudMembership, duplicate.id),
        )
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}
