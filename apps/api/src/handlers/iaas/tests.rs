use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use nodeconductor_domain::TaskName;

use super::clouds::CloudListParams;
use super::{
    create_cloud_handler, create_membership_handler, create_ssh_key_handler, get_ssh_key_handler,
    list_clouds_handler, list_ssh_keys_handler,
};
use crate::dto::{CreateCloudRequest, CreateMembershipRequest, CreateSshKeyRequest};
use crate::handlers::test_support::Fixture;

const PUBLIC_KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl dev@host";

#[tokio::test]
async fn staff_links_a_new_cloud_to_a_project() {
    let fixture = Fixture::new();
    let customer_id = fixture.customer().await;
    let project_id = fixture.project(customer_id).await;

    let created = create_cloud_handler(
        State(fixture.state.clone()),
        Extension(fixture.staff.clone()),
        Json(CreateCloudRequest {
            customer_id,
            name: "Main".to_owned(),
            auth_url: "https://keystone.example.com/v2.0".to_owned(),
        }),
    )
    .await;
    let Ok((status, Json(cloud))) = created else {
        panic!("staff may create clouds");
    };
    assert_eq!(status, StatusCode::CREATED);

    let linked = create_membership_handler(
        State(fixture.state.clone()),
        Extension(fixture.staff.clone()),
        Json(CreateMembershipRequest {
            cloud_id: cloud.id,
            project_id,
        }),
    )
    .await;
    let Ok((status, Json(membership))) = linked else {
        panic!("cloud and project share a customer");
    };
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(membership.project_id, project_id);

    let tasks = fixture.repository.pending_tasks().await;
    assert!(tasks.iter().any(|task| task.task == TaskName::SyncCloudAccount));
    assert!(
        tasks
            .iter()
            .any(|task| task.task == TaskName::SyncCloudMembership
                && task.entity_id == membership.id)
    );
}

#[tokio::test]
async fn clouds_are_hidden_from_users_without_roles() {
    let fixture = Fixture::new();
    fixture.instance(nodeconductor_domain::InstanceState::Online).await;
    let outsider = fixture.regular_user("outsider").await;

    let result = list_clouds_handler(
        State(fixture.state.clone()),
        Extension(outsider),
        Query(CloudListParams::default()),
    )
    .await;

    assert!(result.is_ok_and(|Json(clouds)| clouds.is_empty()));
}

#[tokio::test]
async fn ssh_keys_are_private_to_their_owner() {
    let fixture = Fixture::new();
    let owner = fixture.regular_user("owner").await;
    let other = fixture.regular_user("other").await;

    let created = create_ssh_key_handler(
        State(fixture.state.clone()),
        Extension(owner.clone()),
        Json(CreateSshKeyRequest {
            name: "laptop".to_owned(),
            public_key: PUBLIC_KEY.to_owned(),
        }),
    )
    .await;
    let Ok((status, Json(key))) = created else {
        panic!("a valid key is accepted");
    };
    assert_eq!(status, StatusCode::CREATED);

    let own_listing = list_ssh_keys_handler(State(fixture.state.clone()), Extension(owner)).await;
    assert!(own_listing.is_ok_and(|Json(keys)| keys.len() == 1));

    let other_listing =
        list_ssh_keys_handler(State(fixture.state.clone()), Extension(other.clone())).await;
    assert!(other_listing.is_ok_and(|Json(keys)| keys.is_empty()));

    let lookup =
        get_ssh_key_handler(State(fixture.state.clone()), Extension(other), Path(key.id)).await;
    assert!(lookup.is_err());
}
