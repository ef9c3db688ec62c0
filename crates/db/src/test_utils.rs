//! Helpers for database-backed tests.
//!
//! Tests that need Postgres read `DATABASE_URL` (or `SERVER_DATABASE_URL`)
//! and call [`skip_without_db!`](crate::skip_without_db) first so the suite
//! still passes on machines without a database. Fixtures insert rows with
//! unique names so tests can share one database and clean up after
//! themselves with [`cleanup_organization`] and [`cleanup_user`].

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    member::{Member, MemberScope},
    role::MemberRole,
    workflow::Workflow,
};

pub fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("SERVER_DATABASE_URL"))
        .ok()
}

/// Returns early from the calling test when no database is configured.
#[macro_export]
macro_rules! skip_without_db {
    () => {
        if $crate::test_utils::database_url().is_none() {
            eprintln!("Skipping test: DATABASE_URL or SERVER_DATABASE_URL not set");
            return;
        }
    };
}

/// Connects to the test database and applies migrations.
pub async fn create_pool() -> PgPool {
    let url = database_url().expect("DATABASE_URL must be set");
    let pool = PgPool::connect(&url)
        .await
        .expect("Failed to connect to database");
    crate::migrate(&pool).await.expect("Failed to run migrations");
    pool
}

pub async fn create_test_user(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO users (id, email, username, first_name, last_name, password_hash)
        VALUES ($1, $2, $3, 'Test', 'User', 'not-a-real-hash')
        "#,
    )
    .bind(id)
    .bind(format!("user-{id}@example.com"))
    .bind(format!("user-{id}"))
    .execute(pool)
    .await
    .expect("Failed to create test user");
    id
}

pub async fn create_super_admin(pool: &PgPool) -> Uuid {
    let id = create_test_user(pool).await;
    sqlx::query("UPDATE users SET role = 'super_admin' WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .expect("Failed to promote test user");
    id
}

/// Organization with its default workflow and `owner_id` as OWNER.
pub async fn create_test_organization(pool: &PgPool, owner_id: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO organizations (id, name, slug, owner_id)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(id)
    .bind(format!("Test Org {id}"))
    .bind(format!("test-org-{id}"))
    .bind(owner_id)
    .execute(pool)
    .await
    .expect("Failed to create test organization");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Workflow::create_default(&mut conn, id)
        .await
        .expect("Failed to create default workflow");
    Member::add(&mut *conn, MemberScope::Organization(id), owner_id, MemberRole::Owner)
        .await
        .expect("Failed to add organization owner");
    id
}

pub async fn create_test_workspace(pool: &PgPool, organization_id: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO workspaces (id, organization_id, name, slug)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(id)
    .bind(organization_id)
    .bind(format!("Test Workspace {id}"))
    .bind(format!("ws-{id}"))
    .execute(pool)
    .await
    .expect("Failed to create test workspace");
    id
}

/// Project bound to the organization's default workflow, with a default sprint.
pub async fn create_test_project(pool: &PgPool, workspace_id: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO projects (id, workspace_id, workflow_id, name, slug)
        SELECT $1, w.id, wf.id, $2, $3
        FROM workspaces w
        JOIN workflows wf ON wf.organization_id = w.organization_id AND wf.is_default
        WHERE w.id = $4
        "#,
    )
    .bind(id)
    .bind(format!("Test Project {id}"))
    .bind(format!("proj-{}", &id.simple().to_string()[..8]))
    .bind(workspace_id)
    .execute(pool)
    .await
    .expect("Failed to create test project");

    sqlx::query("INSERT INTO sprints (project_id, name, is_default) VALUES ($1, 'Backlog', TRUE)")
        .bind(id)
        .execute(pool)
        .await
        .expect("Failed to create default sprint");
    id
}

pub async fn add_member(pool: &PgPool, scope: MemberScope, user_id: Uuid, role: MemberRole) {
    Member::add(pool, scope, user_id, role)
        .await
        .expect("Failed to add member");
}

/// Deletes an organization; workspaces, projects and tasks cascade.
pub async fn cleanup_organization(pool: &PgPool, organization_id: Uuid) {
    sqlx::query("DELETE FROM organizations WHERE id = $1")
        .bind(organization_id)
        .execute(pool)
        .await
        .ok();
}

pub async fn cleanup_user(pool: &PgPool, user_id: Uuid) {
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .ok();
}
