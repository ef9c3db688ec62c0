//! Repository tests against PostgreSQL.
//!
//! ```bash
//! DATABASE_URL=postgres://... cargo test -p db --test repositories
//! ```
//!
//! Tests are skipped if DATABASE_URL is not set.

use db::{
    is_unique_violation,
    models::{
        access::{AccessScope, MembershipChain},
        member::{Member, MemberScope},
        project::Project,
        role::MemberRole,
        sprint::Sprint,
        task::{NewTask, Task, TaskFilter, TaskSort, task_slug},
        workflow::{StatusCategory, TaskStatus, Workflow},
    },
    skip_without_db,
    test_utils::*,
};
use uuid::Uuid;

async fn insert_task(pool: &sqlx::PgPool, project_id: Uuid, title: &str, category: StatusCategory) -> Task {
    let mut tx = pool.begin().await.unwrap();
    let (number, project_slug) = Project::next_task_number(&mut tx, project_id)
        .await
        .unwrap()
        .expect("project exists");
    let project = Project::find_by_id(&mut *tx, project_id).await.unwrap().unwrap();
    let status = TaskStatus::list_for_workflow(&mut *tx, project.workflow_id)
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.category == category)
        .unwrap();
    let sprint = Sprint::find_default(&mut *tx, project_id).await.unwrap().unwrap();
    let task = Task::create(
        &mut *tx,
        &NewTask {
            project_id,
            title: title.to_string(),
            description: None,
            task_type: Default::default(),
            priority: Default::default(),
            task_number: number,
            slug: task_slug(&project_slug, number),
            status_id: status.id,
            sprint_id: Some(sprint.id),
            parent_task_id: None,
            reporter_id: None,
            start_date: None,
            due_date: None,
            completed_at: None,
            story_points: None,
            original_estimate: None,
            remaining_estimate: None,
            custom_fields: serde_json::json!({}),
            created_by: None,
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    task
}

#[tokio::test]
async fn default_workflow_has_four_ordered_statuses() {
    skip_without_db!();
    let pool = create_pool().await;
    let owner = create_test_user(&pool).await;
    let org = create_test_organization(&pool, owner).await;

    let workflow = Workflow::find_default_for_organization(&pool, org)
        .await
        .unwrap()
        .expect("default workflow");
    let statuses = TaskStatus::list_for_workflow(&pool, workflow.id).await.unwrap();
    let names: Vec<_> = statuses.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["To Do", "In Progress", "In Review", "Done"]);
    assert!(statuses[0].is_default);

    cleanup_organization(&pool, org).await;
    cleanup_user(&pool, owner).await;
}

#[tokio::test]
async fn task_numbers_increase_per_project() {
    skip_without_db!();
    let pool = create_pool().await;
    let owner = create_test_user(&pool).await;
    let org = create_test_organization(&pool, owner).await;
    let ws = create_test_workspace(&pool, org).await;
    let project = create_test_project(&pool, ws).await;

    let first = insert_task(&pool, project, "first", StatusCategory::Todo).await;
    let second = insert_task(&pool, project, "second", StatusCategory::Todo).await;
    assert_eq!(first.task_number, 1);
    assert_eq!(second.task_number, 2);
    assert!(second.slug.ends_with("-2"));

    cleanup_organization(&pool, org).await;
    cleanup_user(&pool, owner).await;
}

#[tokio::test]
async fn duplicate_membership_is_a_unique_violation() {
    skip_without_db!();
    let pool = create_pool().await;
    let owner = create_test_user(&pool).await;
    let org = create_test_organization(&pool, owner).await;

    let err = Member::add(&pool, MemberScope::Organization(org), owner, MemberRole::Member)
        .await
        .unwrap_err();
    assert!(is_unique_violation(&err));
    assert!(
        !Member::add_if_absent(&pool, MemberScope::Organization(org), owner, MemberRole::Member)
            .await
            .unwrap()
    );

    cleanup_organization(&pool, org).await;
    cleanup_user(&pool, owner).await;
}

#[tokio::test]
async fn removing_org_member_cascades_to_workspaces_and_projects() {
    skip_without_db!();
    let pool = create_pool().await;
    let owner = create_test_user(&pool).await;
    let user = create_test_user(&pool).await;
    let org = create_test_organization(&pool, owner).await;
    let ws = create_test_workspace(&pool, org).await;
    let project = create_test_project(&pool, ws).await;
    add_member(&pool, MemberScope::Organization(org), user, MemberRole::Member).await;
    add_member(&pool, MemberScope::Workspace(ws), user, MemberRole::Member).await;
    add_member(&pool, MemberScope::Project(project), user, MemberRole::Member).await;

    let mut conn = pool.acquire().await.unwrap();
    let removed = Member::remove(&mut conn, MemberScope::Organization(org), user)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(Member::find(&pool, MemberScope::Workspace(ws), user).await.unwrap().is_none());
    assert!(
        Member::find(&pool, MemberScope::Project(project), user)
            .await
            .unwrap()
            .is_none()
    );

    cleanup_organization(&pool, org).await;
    cleanup_user(&pool, owner).await;
    cleanup_user(&pool, user).await;
}

#[tokio::test]
async fn membership_chain_resolves_inherited_roles() {
    skip_without_db!();
    let pool = create_pool().await;
    let owner = create_test_user(&pool).await;
    let member = create_test_user(&pool).await;
    let org = create_test_organization(&pool, owner).await;
    let ws = create_test_workspace(&pool, org).await;
    let project = create_test_project(&pool, ws).await;
    add_member(&pool, MemberScope::Organization(org), member, MemberRole::Member).await;

    let owner_chain = MembershipChain::load(&pool, AccessScope::Project(project), owner)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(owner_chain.effective_role(false), Some(MemberRole::Owner));

    let member_chain = MembershipChain::load(&pool, AccessScope::Project(project), member)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(member_chain.effective_role(false), None);

    let missing = MembershipChain::load(&pool, AccessScope::Project(Uuid::new_v4()), owner)
        .await
        .unwrap();
    assert!(missing.is_none());

    cleanup_organization(&pool, org).await;
    cleanup_user(&pool, owner).await;
    cleanup_user(&pool, member).await;
}

#[tokio::test]
async fn task_listing_respects_visibility_and_filters() {
    skip_without_db!();
    let pool = create_pool().await;
    let owner = create_test_user(&pool).await;
    let outsider = create_test_user(&pool).await;
    let org = create_test_organization(&pool, owner).await;
    let ws = create_test_workspace(&pool, org).await;
    let project = create_test_project(&pool, ws).await;
    insert_task(&pool, project, "Fix login bug", StatusCategory::Todo).await;
    insert_task(&pool, project, "Write docs", StatusCategory::Done).await;

    let filter = TaskFilter {
        project_id: Some(project),
        visible_to: Some(owner),
        ..Default::default()
    };
    assert_eq!(Task::count(&pool, &filter).await.unwrap(), 2);

    let search = TaskFilter {
        search: Some("LOGIN".into()),
        ..filter.clone()
    };
    let rows = Task::list(&pool, &search, TaskSort::default(), 10, 0).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].task.title, "Fix login bug");

    let hidden = TaskFilter {
        visible_to: Some(outsider),
        ..filter
    };
    assert_eq!(Task::count(&pool, &hidden).await.unwrap(), 0);

    cleanup_organization(&pool, org).await;
    cleanup_user(&pool, owner).await;
    cleanup_user(&pool, outsider).await;
}

#[tokio::test]
async fn completing_sprint_moves_only_unfinished_tasks() {
    skip_without_db!();
    let pool = create_pool().await;
    let owner = create_test_user(&pool).await;
    let org = create_test_organization(&pool, owner).await;
    let ws = create_test_workspace(&pool, org).await;
    let project = create_test_project(&pool, ws).await;
    let backlog = Sprint::find_default(&pool, project).await.unwrap().unwrap();

    let sprint = Sprint::create(
        &pool,
        &db::models::sprint::NewSprint {
            project_id: project,
            name: "Sprint 1".into(),
            goal: None,
            start_date: None,
            end_date: None,
            is_default: false,
            created_by: Some(owner),
        },
    )
    .await
    .unwrap();
    let open = insert_task(&pool, project, "open", StatusCategory::Todo).await;
    let done = insert_task(&pool, project, "done", StatusCategory::Done).await;
    sqlx::query("UPDATE tasks SET sprint_id = $1 WHERE id = ANY($2)")
        .bind(sprint.id)
        .bind(vec![open.id, done.id])
        .execute(&pool)
        .await
        .unwrap();

    let moved = Sprint::move_tasks(&pool, sprint.id, backlog.id, true).await.unwrap();
    assert_eq!(moved, 1);
    let open = Task::find_by_id(&pool, open.id).await.unwrap().unwrap();
    let done = Task::find_by_id(&pool, done.id).await.unwrap().unwrap();
    assert_eq!(open.sprint_id, Some(backlog.id));
    assert_eq!(done.sprint_id, Some(sprint.id));

    cleanup_organization(&pool, org).await;
    cleanup_user(&pool, owner).await;
}
