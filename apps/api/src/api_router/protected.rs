use axum::Router;
use axum::middleware::from_fn;
use axum::routing::{delete, get, post};

use crate::handlers::{backups, iaas, instances, stats, structure};
use crate::state::AppState;
use crate::{auth, middleware};

pub(super) fn build_protected_routes() -> Router<AppState> {
    Router::new()
        .merge(structure_routes())
        .merge(iaas_routes())
        .merge(instance_routes())
        .route(
            "/api/backups",
            get(backups::list_backups_handler).post(backups::create_backup_handler),
        )
        .route(
            "/api/backups/{backup_id}",
            get(backups::get_backup_handler),
        )
        .route(
            "/api/backups/{backup_id}/restore",
            post(backups::restore_backup_handler),
        )
        .route(
            "/api/backups/{backup_id}/delete",
            post(backups::delete_backup_handler),
        )
        .route("/api/stats/customers", get(stats::customer_stats_handler))
        .route("/api/stats/quotas", get(stats::quota_stats_handler))
        .route(
            "/api/stats/creation-time",
            get(stats::creation_time_stats_handler),
        )
        .route("/auth/me", get(auth::me_handler))
        .route_layer(from_fn(middleware::require_auth))
}

fn structure_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/customers",
            get(structure::list_customers_handler).post(structure::create_customer_handler),
        )
        .route(
            "/api/customers/{customer_id}",
            get(structure::get_customer_handler)
                .patch(structure::update_customer_handler)
                .delete(structure::delete_customer_handler),
        )
        .route(
            "/api/project-groups",
            get(structure::list_project_groups_handler)
                .post(structure::create_project_group_handler),
        )
        .route(
            "/api/project-groups/{project_group_id}",
            get(structure::get_project_group_handler)
                .delete(structure::delete_project_group_handler),
        )
        .route(
            "/api/projects",
            get(structure::list_projects_handler).post(structure::create_project_handler),
        )
        .route(
            "/api/projects/{project_id}",
            get(structure::get_project_handler).delete(structure::delete_project_handler),
        )
        .route(
            "/api/projects/{project_id}/project-groups",
            post(structure::add_project_to_group_handler),
        )
        .route(
            "/api/projects/{project_id}/project-groups/{project_group_id}",
            delete(structure::remove_project_from_group_handler),
        )
        .route(
            "/api/customer-permissions",
            get(structure::list_customer_roles_handler)
                .post(structure::grant_customer_role_handler),
        )
        .route(
            "/api/project-group-permissions",
            get(structure::list_project_group_roles_handler)
                .post(structure::grant_project_group_role_handler),
        )
        .route(
            "/api/project-permissions",
            get(structure::list_project_roles_handler)
                .post(structure::grant_project_role_handler),
        )
        .route(
            "/api/role-assignments/{assignment_id}",
            delete(structure::revoke_role_handler),
        )
}

fn iaas_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/clouds",
            get(iaas::list_clouds_handler).post(iaas::create_cloud_handler),
        )
        .route("/api/clouds/{cloud_id}", get(iaas::get_cloud_handler))
        .route("/api/flavors", get(iaas::list_flavors_handler))
        .route(
            "/api/project-cloud-memberships",
            get(iaas::list_memberships_handler).post(iaas::create_membership_handler),
        )
        .route(
            "/api/project-cloud-memberships/{membership_id}",
            get(iaas::get_membership_handler),
        )
        .route(
            "/api/security-groups",
            get(iaas::list_security_groups_handler),
        )
        .route(
            "/api/keys",
            get(iaas::list_ssh_keys_handler).post(iaas::create_ssh_key_handler),
        )
        .route(
            "/api/keys/{key_id}",
            get(iaas::get_ssh_key_handler).delete(iaas::delete_ssh_key_handler),
        )
}

fn instance_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/instances",
            get(instances::list_instances_handler).post(instances::create_instance_handler),
        )
        .route(
            "/api/instances/{instance_id}",
            get(instances::get_instance_handler).patch(instances::update_instance_handler),
        )
        .route(
            "/api/instances/{instance_id}/start",
            post(instances::start_instance_handler),
        )
        .route(
            "/api/instances/{instance_id}/stop",
            post(instances::stop_instance_handler),
        )
        .route(
            "/api/instances/{instance_id}/destroy",
            post(instances::destroy_instance_handler),
        )
        .route(
            "/api/instances/{instance_id}/resize",
            post(instances::resize_instance_handler),
        )
}
