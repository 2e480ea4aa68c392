use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Connects to `DATABASE_URL` and applies migrations; `None` skips the test.
pub(crate) async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres tests: {error}");
    }

    Some(pool)
}

pub(crate) async fn insert_user(pool: &PgPool, is_staff: bool) -> Uuid {
    let user_id = Uuid::new_v4();
    let insert = sqlx::query(
        r#"
        INSERT INTO users (id, username, full_name, password_hash, is_staff)
        VALUES ($1, $2, 'Test User', 'hash', $3)
        "#,
    )
    .bind(user_id)
    .bind(format!("user-{user_id}"))
    .bind(is_staff)
    .execute(pool)
    .await;
    assert!(insert.is_ok());
    user_id
}

pub(crate) async fn insert_customer(pool: &PgPool) -> Uuid {
    let customer_id = Uuid::new_v4();
    let insert = sqlx::query("INSERT INTO customers (id, name) VALUES ($1, 'Customer')")
        .bind(customer_id)
        .execute(pool)
        .await;
    assert!(insert.is_ok());
    customer_id
}

pub(crate) async fn insert_project(pool: &PgPool, customer_id: Uuid) -> Uuid {
    let project_id = Uuid::new_v4();
    let insert =
        sqlx::query("INSERT INTO projects (id, customer_id, name) VALUES ($1, $2, 'Project')")
            .bind(project_id)
            .bind(customer_id)
            .execute(pool)
            .await;
    assert!(insert.is_ok());
    project_id
}

pub(crate) async fn insert_role(
    pool: &PgPool,
    user_id: Uuid,
    level: &str,
    scope_id: Uuid,
    role: &str,
) {
    let insert = sqlx::query(
        r#"
        INSERT INTO role_assignments (id, user_id, level, scope_id, role)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(level)
    .bind(scope_id)
    .bind(role)
    .execute(pool)
    .await;
    assert!(insert.is_ok());
}

/// Inserts a cloud, a membership linking it to the project and one instance.
///
/// Returns `(cloud_id, membership_id, instance_id)`.
pub(crate) async fn insert_instance(
    pool: &PgPool,
    customer_id: Uuid,
    project_id: Uuid,
    state: &str,
) -> (Uuid, Uuid, Uuid) {
    let cloud_id = Uuid::new_v4();
    let membership_id = Uuid::new_v4();
    let instance_id = Uuid::new_v4();

    let cloud = sqlx::query(
        "INSERT INTO clouds (id, customer_id, name, auth_url) VALUES ($1, $2, 'Cloud', 'https://keystone.example.com')",
    )
    .bind(cloud_id)
    .bind(customer_id)
    .execute(pool)
    .await;
    assert!(cloud.is_ok());

    let membership = sqlx::query(
        "INSERT INTO cloud_project_memberships (id, cloud_id, project_id, state) VALUES ($1, $2, $3, 'in_sync')",
    )
    .bind(membership_id)
    .bind(cloud_id)
    .bind(project_id)
    .execute(pool)
    .await;
    assert!(membership.is_ok());

    let instance = sqlx::query(
        r#"
        INSERT INTO instances (
            id, hostname, membership_id, flavor_id, cores, ram,
            system_volume_size, data_volume_size, state
        )
        VALUES ($1, 'vm-1', $2, $3, 1, 1024, 10240, 20480, $4)
        "#,
    )
    .bind(instance_id)
    .bind(membership_id)
    .bind(Uuid::new_v4())
    .bind(state)
    .execute(pool)
    .await;
    assert!(instance.is_ok());

    (cloud_id, membership_id, instance_id)
}
