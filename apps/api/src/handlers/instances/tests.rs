use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use nodeconductor_domain::{InstanceState, TaskName};

use super::{
    InstanceListParams, list_instances_handler, resize_instance_handler, start_instance_handler,
};
use crate::dto::ResizeInstanceRequest;
use crate::handlers::test_support::Fixture;

#[tokio::test]
async fn start_is_accepted_once_then_conflicts() {
    let fixture = Fixture::new();
    let (_, instance_id) = fixture.instance(InstanceState::Offline).await;

    let first = start_instance_handler(
        State(fixture.state.clone()),
        Extension(fixture.staff.clone()),
        Path(instance_id),
    )
    .await;
    let Ok((status, Json(body))) = first else {
        panic!("first start should be scheduled");
    };
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body.status, "start was scheduled");

    let second = start_instance_handler(
        State(fixture.state.clone()),
        Extension(fixture.staff.clone()),
        Path(instance_id),
    )
    .await;
    let Ok((status, Json(body))) = second else {
        panic!("rejected transitions answer with a status body");
    };
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body.status,
        "Performing start operation from instance state 'Starting' is not allowed"
    );

    let started = fixture
        .repository
        .pending_tasks()
        .await
        .into_iter()
        .filter(|task| task.task == TaskName::StartInstance && task.entity_id == instance_id)
        .count();
    assert_eq!(started, 1);
}

#[tokio::test]
async fn resize_of_running_instance_conflicts() {
    let fixture = Fixture::new();
    let (_, instance_id) = fixture.instance(InstanceState::Online).await;

    let result = resize_instance_handler(
        State(fixture.state.clone()),
        Extension(fixture.staff.clone()),
        Path(instance_id),
        Json(ResizeInstanceRequest {
            flavor: None,
            disk_size: Some(40960),
        }),
    )
    .await;

    let Ok((status, Json(body))) = result else {
        panic!("offline check answers with a status body");
    };
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.status, "Instance must be offline");
}

#[tokio::test]
async fn listing_rejects_unknown_ordering() {
    let fixture = Fixture::new();
    fixture.instance(InstanceState::Online).await;

    let result = list_instances_handler(
        State(fixture.state.clone()),
        Extension(fixture.staff.clone()),
        Query(InstanceListParams {
            o: Some("-uptime".to_owned()),
            ..InstanceListParams::default()
        }),
    )
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn regular_user_without_roles_sees_no_instances() {
    let fixture = Fixture::new();
    fixture.instance(InstanceState::Online).await;
    let outsider = fixture.regular_user("outsider").await;

    let result = list_instances_handler(
        State(fixture.state.clone()),
        Extension(outsider),
        Query(InstanceListParams::default()),
    )
    .await;

    assert!(result.is_ok_and(|Json(instances)| instances.is_empty()));
}
