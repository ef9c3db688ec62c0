//! Service flows against PostgreSQL.
//!
//! ```bash
//! DATABASE_URL=postgres://... cargo test -p services --test flows
//! ```
//!
//! Tests are skipped if DATABASE_URL is not set.

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use chrono::Duration;
use db::{
    models::{
        charts::ChartScope,
        inbox::{InboxMessageStatus, NewInboxMessage, RuleActions, RuleConditions},
        invitation::{Invitation, InvitationStatus, InvitationTarget},
        member::{Member, MemberScope},
        role::MemberRole,
        sprint::SprintStatus,
        task::{TaskPriority, TaskType},
        workflow::StatusCategory,
        workspace::{NewWorkspace, Workspace},
    },
    skip_without_db,
    test_utils::*,
};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use services::services::{
    access::Actor,
    auth::{AuthConfig, AuthService, RegisterRequest},
    charts::{self, ChartQuery},
    error::ServiceError,
    inbox::{self, CreateInboxRule, UpsertInbox},
    invitations::{CreateInvitation, InvitationService},
    mailer::LoggingMailer,
    members,
    projects::{self, CreateProject},
    slugs,
    sprints::{self, CreateSprint, StartSprint},
    tasks::{self, CreateTask, UpdateTask},
    workflows,
    workspaces::{self, CreateWorkspace},
};
use sqlx::PgPool;
use uuid::Uuid;

fn actor(id: Uuid) -> Actor {
    Actor {
        id,
        email: format!("user-{id}@example.com"),
        is_super_admin: false,
    }
}

fn new_workspace(name: &str) -> CreateWorkspace {
    CreateWorkspace {
        name: name.to_string(),
        slug: None,
        description: None,
        color: None,
        avatar: None,
        settings: serde_json::json!({}),
    }
}

fn new_project(name: &str) -> CreateProject {
    CreateProject {
        name: name.to_string(),
        slug: None,
        description: None,
        color: None,
        status: Default::default(),
        priority: Default::default(),
        visibility: Default::default(),
        start_date: None,
        end_date: None,
        settings: serde_json::json!({}),
    }
}

fn new_task(title: &str) -> CreateTask {
    CreateTask {
        title: title.to_string(),
        description: None,
        task_type: TaskType::Task,
        priority: TaskPriority::Medium,
        status_id: None,
        sprint_id: None,
        parent_task_id: None,
        assignee_ids: vec![],
        start_date: None,
        due_date: None,
        story_points: None,
        original_estimate: None,
        remaining_estimate: None,
        custom_fields: serde_json::json!({}),
    }
}

/// Owner, organization and a project created through the services.
async fn setup(pool: &PgPool) -> (Actor, Uuid, Uuid) {
    let owner = actor(create_test_user(pool).await);
    let org = create_test_organization(pool, owner.id).await;
    let workspace = workspaces::create(pool, &owner, org, new_workspace("Platform"))
        .await
        .unwrap();
    let project = projects::create(pool, &owner, workspace.id, new_project("Api"))
        .await
        .unwrap();
    (owner, org, project.id)
}

async fn teardown(pool: &PgPool, org: Uuid, users: &[Uuid]) {
    cleanup_organization(pool, org).await;
    for user in users {
        cleanup_user(pool, *user).await;
    }
}

#[tokio::test]
async fn workspace_creation_seeds_creator_and_organization_managers() {
    skip_without_db!();
    let pool = create_pool().await;
    let owner = actor(create_test_user(&pool).await);
    let manager = create_test_user(&pool).await;
    let viewer = create_test_user(&pool).await;
    let org = create_test_organization(&pool, owner.id).await;
    add_member(&pool, MemberScope::Organization(org), manager, MemberRole::Manager).await;
    add_member(&pool, MemberScope::Organization(org), viewer, MemberRole::Viewer).await;

    let first = workspaces::create(&pool, &owner, org, new_workspace("Design Team"))
        .await
        .unwrap();
    let second = workspaces::create(&pool, &owner, org, new_workspace("Design Team"))
        .await
        .unwrap();
    assert_eq!(first.slug, "design-team");
    assert_eq!(second.slug, "design-team-1");

    let scope = MemberScope::Workspace(first.id);
    let owner_row = Member::find(&pool, scope, owner.id).await.unwrap().unwrap();
    let manager_row = Member::find(&pool, scope, manager).await.unwrap().unwrap();
    assert_eq!(owner_row.role, MemberRole::Owner);
    assert_eq!(manager_row.role, MemberRole::Manager);
    assert!(Member::find(&pool, scope, viewer).await.unwrap().is_none());

    let denied = workspaces::create(&pool, &actor(viewer), org, new_workspace("Nope")).await;
    assert!(matches!(denied, Err(ServiceError::Forbidden(_))));

    teardown(&pool, org, &[owner.id, manager, viewer]).await;
}

#[tokio::test]
async fn tasks_are_numbered_per_project() {
    skip_without_db!();
    let pool = create_pool().await;
    let (owner, org, project_id) = setup(&pool).await;
    let project = projects::get(&pool, &owner, project_id).await.unwrap();

    let mut numbers = Vec::new();
    for title in ["First", "Second", "Third"] {
        let task = tasks::create(&pool, &owner, project_id, new_task(title))
            .await
            .unwrap();
        assert_eq!(task.task.slug, format!("{}-{}", project.slug, task.task.task_number));
        assert_eq!(task.task.reporter_id, Some(owner.id));
        numbers.push(task.task.task_number);
    }
    assert_eq!(numbers, vec![1, 2, 3]);

    teardown(&pool, org, &[owner.id]).await;
}

#[tokio::test]
async fn accepting_an_invitation_grants_memberships() {
    skip_without_db!();
    let pool = create_pool().await;
    let (owner, org, project_id) = setup(&pool).await;
    let invitee = actor(create_test_user(&pool).await);
    let stranger = actor(create_test_user(&pool).await);
    let service = InvitationService::new(
        Arc::new(LoggingMailer),
        "http://localhost:3000",
        Duration::days(7),
    );

    let invitation = service
        .create(
            &pool,
            &owner,
            CreateInvitation {
                email: invitee.email.clone(),
                target: InvitationTarget::Project(project_id),
                role: MemberRole::Member,
            },
        )
        .await
        .unwrap();
    assert_eq!(invitation.status, InvitationStatus::Pending);

    let duplicate = service
        .create(
            &pool,
            &owner,
            CreateInvitation {
                email: invitee.email.clone(),
                target: InvitationTarget::Project(project_id),
                role: MemberRole::Member,
            },
        )
        .await;
    assert!(matches!(duplicate, Err(ServiceError::Conflict(_))));

    let wrong_user = service.accept(&pool, &stranger, &invitation.token).await;
    assert!(matches!(wrong_user, Err(ServiceError::Forbidden(_))));

    let accepted = service.accept(&pool, &invitee, &invitation.token).await.unwrap();
    assert_eq!(accepted.status, InvitationStatus::Accepted);

    let project_member = Member::find(&pool, MemberScope::Project(project_id), invitee.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(project_member.role, MemberRole::Member);
    let org_member = Member::find(&pool, MemberScope::Organization(org), invitee.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(org_member.role, MemberRole::Member);

    let again = service.accept(&pool, &invitee, &invitation.token).await;
    assert!(matches!(again, Err(ServiceError::BadRequest(_))));

    teardown(&pool, org, &[owner.id, invitee.id, stranger.id]).await;
}

#[tokio::test]
async fn completing_a_sprint_moves_unfinished_tasks_to_the_backlog() {
    skip_without_db!();
    let pool = create_pool().await;
    let (owner, org, project_id) = setup(&pool).await;
    let statuses = workflows::list_project_statuses(&pool, &owner, project_id)
        .await
        .unwrap();
    let done = statuses
        .iter()
        .find(|s| s.category == StatusCategory::Done)
        .unwrap();

    let sprint = sprints::create(
        &pool,
        &owner,
        project_id,
        CreateSprint {
            name: "Sprint 1".into(),
            goal: None,
            start_date: None,
            end_date: None,
        },
    )
    .await
    .unwrap();
    let started = sprints::start(&pool, &owner, sprint.id, StartSprint::default())
        .await
        .unwrap();
    assert_eq!(started.status, SprintStatus::Active);

    let mut open = new_task("Open work");
    open.sprint_id = Some(sprint.id);
    let open = tasks::create(&pool, &owner, project_id, open).await.unwrap();
    let mut finished = new_task("Finished work");
    finished.sprint_id = Some(sprint.id);
    finished.status_id = Some(done.id);
    let finished = tasks::create(&pool, &owner, project_id, finished).await.unwrap();
    assert!(finished.task.completed_at.is_some());

    let completion = sprints::complete(&pool, &owner, sprint.id).await.unwrap();
    assert_eq!(completion.sprint.status, SprintStatus::Completed);
    assert_eq!(completion.moved_tasks, 1);

    let open = tasks::get(&pool, &owner, open.task.id).await.unwrap();
    let finished = tasks::get(&pool, &owner, finished.task.id).await.unwrap();
    assert_ne!(open.task.sprint_id, Some(sprint.id));
    assert_eq!(finished.task.sprint_id, Some(sprint.id));

    let restart = sprints::start(&pool, &owner, sprint.id, StartSprint::default()).await;
    assert!(matches!(restart, Err(ServiceError::BadRequest(_))));

    teardown(&pool, org, &[owner.id]).await;
}

#[tokio::test]
async fn members_only_see_their_own_tasks_in_charts() {
    skip_without_db!();
    let pool = create_pool().await;
    let (owner, org, project_id) = setup(&pool).await;
    let member = actor(create_test_user(&pool).await);
    add_member(&pool, MemberScope::Organization(org), member.id, MemberRole::Member).await;
    add_member(&pool, MemberScope::Project(project_id), member.id, MemberRole::Member).await;

    tasks::create(&pool, &owner, project_id, new_task("Owner task"))
        .await
        .unwrap();
    tasks::create(&pool, &member, project_id, new_task("Member task"))
        .await
        .unwrap();

    let query = ChartQuery {
        types: Some("kpi_metrics".into()),
        year: None,
    };
    let scope = ChartScope::Organization(org);
    let elevated = charts::get(&pool, &owner, scope, &query).await.unwrap();
    let scoped = charts::get(&pool, &member, scope, &query).await.unwrap();
    assert_eq!(elevated["kpi_metrics"]["total_tasks"], 2);
    assert_eq!(scoped["kpi_metrics"]["total_tasks"], 1);
    assert_eq!(scoped["kpi_metrics"]["total_projects"], 1);

    let outsider = actor(create_test_user(&pool).await);
    let denied = charts::get(&pool, &outsider, scope, &query).await;
    assert!(matches!(denied, Err(ServiceError::Forbidden(_))));

    teardown(&pool, org, &[owner.id, member.id, outsider.id]).await;
}

fn message(message_id: &str, subject: &str) -> NewInboxMessage {
    NewInboxMessage {
        message_id: message_id.to_string(),
        thread_id: None,
        subject: Some(subject.to_string()),
        from_email: "customer@example.com".into(),
        from_name: Some("Customer".into()),
        to_emails: vec!["support@example.com".into()],
        cc_emails: vec![],
        text_content: Some("Something is broken".into()),
        html_content: None,
        received_at: None,
    }
}

#[tokio::test]
async fn ingested_messages_are_routed_by_rules() {
    skip_without_db!();
    let pool = create_pool().await;
    let (owner, org, project_id) = setup(&pool).await;

    inbox::upsert_settings(
        &pool,
        &owner,
        project_id,
        UpsertInbox {
            name: "Support".into(),
            description: None,
            email_address: Some("support@example.com".into()),
            email_signature: None,
            auto_reply_enabled: false,
            auto_reply_template: None,
            auto_create_task: true,
            default_task_type: TaskType::Task,
            default_priority: TaskPriority::Medium,
            default_status_id: None,
            default_assignee_id: None,
            sync_interval: 5,
        },
    )
    .await
    .unwrap();
    inbox::create_rule(
        &pool,
        &owner,
        project_id,
        CreateInboxRule {
            name: "Drop newsletters".into(),
            description: None,
            priority: 1,
            enabled: true,
            conditions: RuleConditions {
                subject_contains: Some("newsletter".into()),
                ..Default::default()
            },
            actions: RuleActions {
                ignore: true,
                ..Default::default()
            },
            stop_on_match: true,
        },
    )
    .await
    .unwrap();
    inbox::create_rule(
        &pool,
        &owner,
        project_id,
        CreateInboxRule {
            name: "Bugs".into(),
            description: None,
            priority: 2,
            enabled: true,
            conditions: RuleConditions {
                subject_contains: Some("bug".into()),
                ..Default::default()
            },
            actions: RuleActions {
                set_type: Some(TaskType::Bug),
                set_priority: Some(TaskPriority::High),
                ..Default::default()
            },
            stop_on_match: false,
        },
    )
    .await
    .unwrap();

    let ignored = inbox::ingest_message(&pool, &owner, project_id, message("<1@x>", "Monthly Newsletter"))
        .await
        .unwrap();
    assert_eq!(ignored.message.status, InboxMessageStatus::Ignored);
    assert!(ignored.task.is_none());

    let converted = inbox::ingest_message(&pool, &owner, project_id, message("<2@x>", "Bug: login fails"))
        .await
        .unwrap();
    assert_eq!(converted.message.status, InboxMessageStatus::Converted);
    let task = converted.task.unwrap();
    assert_eq!(task.task.title, "Bug: login fails");
    assert_eq!(task.task.task_type, TaskType::Bug);
    assert_eq!(task.task.priority, TaskPriority::High);
    assert_eq!(converted.message.task_id, Some(task.task.id));

    let duplicate = inbox::ingest_message(&pool, &owner, project_id, message("<2@x>", "Bug: login fails")).await;
    assert!(matches!(duplicate, Err(ServiceError::Conflict(_))));

    teardown(&pool, org, &[owner.id]).await;
}

fn new_sprint(name: &str) -> CreateSprint {
    CreateSprint {
        name: name.into(),
        goal: None,
        start_date: None,
        end_date: None,
    }
}

#[tokio::test]
async fn a_rotated_refresh_token_cannot_be_reused() {
    skip_without_db!();
    let pool = create_pool().await;
    let auth = AuthService::new(&AuthConfig {
        jwt_secret: SecretString::from("flow-test-secret-0123456789abcdef".to_string()),
        access_ttl: Duration::minutes(15),
        refresh_ttl: Duration::days(7),
    });

    let suffix = Uuid::new_v4().simple().to_string();
    let registered = auth
        .register(
            &pool,
            RegisterRequest {
                email: format!("refresh-{suffix}@example.com"),
                username: format!("refresh-{}", &suffix[..12]),
                password: "correct horse battery".into(),
                first_name: "Refresh".into(),
                last_name: "Test".into(),
            },
        )
        .await
        .unwrap();
    let first = registered.tokens.refresh_token;

    let rotated = auth.refresh(&pool, &first).await.unwrap();
    assert_ne!(rotated.tokens.refresh_token, first);

    let reused = auth.refresh(&pool, &first).await;
    assert!(matches!(reused, Err(ServiceError::Unauthorized(_))));

    auth.refresh(&pool, &rotated.tokens.refresh_token)
        .await
        .unwrap();

    cleanup_user(&pool, registered.user.id).await;
}

#[tokio::test]
async fn only_one_sprint_can_be_active() {
    skip_without_db!();
    let pool = create_pool().await;
    let (owner, org, project_id) = setup(&pool).await;

    let first = sprints::create(&pool, &owner, project_id, new_sprint("Sprint 1"))
        .await
        .unwrap();
    let second = sprints::create(&pool, &owner, project_id, new_sprint("Sprint 2"))
        .await
        .unwrap();
    sprints::start(&pool, &owner, first.id, StartSprint::default())
        .await
        .unwrap();

    let overlap = sprints::start(&pool, &owner, second.id, StartSprint::default()).await;
    assert!(matches!(overlap, Err(ServiceError::Conflict(_))));

    sprints::complete(&pool, &owner, first.id).await.unwrap();
    let started = sprints::start(&pool, &owner, second.id, StartSprint::default())
        .await
        .unwrap();
    assert_eq!(started.status, SprintStatus::Active);

    teardown(&pool, org, &[owner.id]).await;
}

#[tokio::test]
async fn accepting_an_expired_invitation_marks_it_expired() {
    skip_without_db!();
    let pool = create_pool().await;
    let (owner, org, project_id) = setup(&pool).await;
    let invitee = actor(create_test_user(&pool).await);
    let service = InvitationService::new(
        Arc::new(LoggingMailer),
        "http://localhost:3000",
        Duration::seconds(-1),
    );

    let invitation = service
        .create(
            &pool,
            &owner,
            CreateInvitation {
                email: invitee.email.clone(),
                target: InvitationTarget::Project(project_id),
                role: MemberRole::Member,
            },
        )
        .await
        .unwrap();

    let expired = service.accept(&pool, &invitee, &invitation.token).await;
    assert!(matches!(expired, Err(ServiceError::BadRequest(_))));

    let stored = Invitation::find_by_id(&pool, invitation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, InvitationStatus::Expired);
    assert!(
        Member::find(&pool, MemberScope::Project(project_id), invitee.id)
            .await
            .unwrap()
            .is_none()
    );

    teardown(&pool, org, &[owner.id, invitee.id]).await;
}

#[tokio::test]
async fn default_and_used_statuses_cannot_be_deleted() {
    skip_without_db!();
    let pool = create_pool().await;
    let (owner, org, project_id) = setup(&pool).await;
    let statuses = workflows::list_project_statuses(&pool, &owner, project_id)
        .await
        .unwrap();
    let default = statuses.iter().find(|s| s.is_default).unwrap();
    let done = statuses
        .iter()
        .find(|s| s.category == StatusCategory::Done && !s.is_default)
        .unwrap();
    let review = statuses
        .iter()
        .find(|s| s.name == "In Review" && !s.is_default)
        .unwrap();

    let mut finished = new_task("Shipped");
    finished.status_id = Some(done.id);
    tasks::create(&pool, &owner, project_id, finished).await.unwrap();

    let removed_default = workflows::delete_status(&pool, &owner, default.id).await;
    assert!(matches!(removed_default, Err(ServiceError::BadRequest(_))));

    let removed_used = workflows::delete_status(&pool, &owner, done.id).await;
    assert!(matches!(removed_used, Err(ServiceError::Conflict(_))));

    workflows::delete_status(&pool, &owner, review.id).await.unwrap();
    let remaining = workflows::list_project_statuses(&pool, &owner, project_id)
        .await
        .unwrap();
    assert_eq!(remaining.len(), statuses.len() - 1);

    teardown(&pool, org, &[owner.id]).await;
}

#[tokio::test]
async fn slug_inserts_retry_after_a_unique_violation() {
    skip_without_db!();
    let pool = create_pool().await;
    let owner = actor(create_test_user(&pool).await);
    let org = create_test_organization(&pool, owner.id).await;
    workspaces::create(&pool, &owner, org, new_workspace("Ops"))
        .await
        .unwrap();

    let reads = AtomicU32::new(0);
    let inserts = AtomicU32::new(0);
    let new_row = |slug: String| NewWorkspace {
        organization_id: org,
        name: "Ops".into(),
        slug,
        description: None,
        color: None,
        avatar: None,
        settings: serde_json::json!({}),
        created_by: owner.id,
    };

    // The first read misses the existing row, as if it was inserted concurrently.
    let workspace = slugs::insert_with_unique_slug(
        "ops",
        || {
            let stale = reads.fetch_add(1, Ordering::SeqCst) == 0;
            let pool = &pool;
            async move {
                if stale {
                    Ok(Vec::new())
                } else {
                    Workspace::slugs_like(pool, org, "ops").await
                }
            }
        },
        |slug| {
            inserts.fetch_add(1, Ordering::SeqCst);
            let new = new_row(slug);
            let pool = &pool;
            async move { Workspace::create(pool, &new).await }
        },
    )
    .await
    .unwrap();
    assert_eq!(workspace.slug, "ops-1");
    assert_eq!(inserts.load(Ordering::SeqCst), 2);

    inserts.store(0, Ordering::SeqCst);
    let exhausted = slugs::insert_with_unique_slug(
        "ops",
        || async { Ok(Vec::new()) },
        |slug| {
            inserts.fetch_add(1, Ordering::SeqCst);
            let new = new_row(slug);
            let pool = &pool;
            async move { Workspace::create(pool, &new).await }
        },
    )
    .await;
    assert!(matches!(exhausted, Err(ServiceError::Conflict(_))));
    assert_eq!(inserts.load(Ordering::SeqCst), slugs::MAX_SLUG_ATTEMPTS);

    teardown(&pool, org, &[owner.id]).await;
}

#[tokio::test]
async fn a_task_cannot_move_under_its_own_subtask() {
    skip_without_db!();
    let pool = create_pool().await;
    let (owner, org, project_id) = setup(&pool).await;

    let epic = tasks::create(&pool, &owner, project_id, new_task("Epic"))
        .await
        .unwrap();
    let mut story = new_task("Story");
    story.parent_task_id = Some(epic.task.id);
    let story = tasks::create(&pool, &owner, project_id, story).await.unwrap();
    let mut subtask = new_task("Subtask");
    subtask.parent_task_id = Some(story.task.id);
    let subtask = tasks::create(&pool, &owner, project_id, subtask).await.unwrap();

    let cycle = tasks::update(
        &pool,
        &owner,
        epic.task.id,
        UpdateTask {
            parent_task_id: Some(subtask.task.id),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(cycle, Err(ServiceError::BadRequest(_))));

    let moved = tasks::update(
        &pool,
        &owner,
        subtask.task.id,
        UpdateTask {
            parent_task_id: Some(epic.task.id),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(moved.task.parent_task_id, Some(epic.task.id));

    teardown(&pool, org, &[owner.id]).await;
}

#[tokio::test]
async fn the_last_owner_cannot_be_demoted() {
    skip_without_db!();
    let pool = create_pool().await;
    let owner = actor(create_test_user(&pool).await);
    let org = create_test_organization(&pool, owner.id).await;
    let scope = MemberScope::Organization(org);

    let demoted = members::update_role(&pool, &owner, scope, owner.id, MemberRole::Manager).await;
    assert!(matches!(demoted, Err(ServiceError::BadRequest(_))));

    let co_owner = actor(create_test_user(&pool).await);
    add_member(&pool, scope, co_owner.id, MemberRole::Owner).await;

    // Two owners demoting themselves at once: the second waits on the row
    // lock and then sees a single owner left.
    let (a, b) = tokio::join!(
        members::update_role(&pool, &owner, scope, owner.id, MemberRole::Manager),
        members::update_role(&pool, &co_owner, scope, co_owner.id, MemberRole::Manager),
    );
    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);

    let owners: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM organization_members WHERE organization_id = $1 AND role = 'owner'",
    )
    .bind(org)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(owners, 1);

    teardown(&pool, org, &[owner.id, co_owner.id]).await;
}

#[tokio::test]
async fn removing_a_member_keeps_an_owner_on_every_child() {
    skip_without_db!();
    let pool = create_pool().await;
    let (owner, org, project_id) = setup(&pool).await;
    let project = projects::get(&pool, &owner, project_id).await.unwrap();
    let co_owner = actor(create_test_user(&pool).await);
    add_member(&pool, MemberScope::Organization(org), co_owner.id, MemberRole::Owner).await;

    let orphaning = members::remove(&pool, &co_owner, MemberScope::Organization(org), owner.id).await;
    assert!(matches!(orphaning, Err(ServiceError::BadRequest(_))));
    assert!(
        Member::find(&pool, MemberScope::Workspace(project.workspace_id), owner.id)
            .await
            .unwrap()
            .is_some()
    );

    add_member(&pool, MemberScope::Workspace(project.workspace_id), co_owner.id, MemberRole::Owner).await;
    add_member(&pool, MemberScope::Project(project_id), co_owner.id, MemberRole::Owner).await;
    members::remove(&pool, &co_owner, MemberScope::Organization(org), owner.id)
        .await
        .unwrap();

    for scope in [
        MemberScope::Organization(org),
        MemberScope::Workspace(project.workspace_id),
        MemberScope::Project(project_id),
    ] {
        assert!(Member::find(&pool, scope, owner.id).await.unwrap().is_none());
    }

    teardown(&pool, org, &[owner.id, co_owner.id]).await;
}
