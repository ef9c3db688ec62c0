//! Task creation, listing and the project board.
//!
//! Task numbers are allocated per project inside the inserting transaction:
//! the project row is locked, its counter bumped, and the task slug built
//! from the project slug and the new number.

use std::{collections::HashMap, str::FromStr};

use chrono::{DateTime, Utc};
use db::{
    RetryConfig,
    models::{
        access::AccessScope,
        project::Project,
        role::MemberRole,
        sprint::Sprint,
        task::{
            NewTask, Task, TaskChanges, TaskFilter, TaskPriority, TaskRow, TaskSort,
            TaskSortField, TaskType, TaskWithDetails, task_slug,
        },
        workflow::{StatusCategory, TaskStatus},
    },
    validation,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use ts_rs::TS;
use utils::api::{
    SortOrder,
    pagination::{Paginated, PaginationParams},
};
use uuid::Uuid;

use super::{
    access::{Actor, require, require_task},
    error::ServiceError,
};

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub priority: TaskPriority,
    pub status_id: Option<Uuid>,
    pub sprint_id: Option<Uuid>,
    pub parent_task_id: Option<Uuid>,
    #[serde(default)]
    pub assignee_ids: Vec<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub story_points: Option<i32>,
    pub original_estimate: Option<i32>,
    pub remaining_estimate: Option<i32>,
    #[serde(default)]
    #[ts(type = "Record<string, unknown> | null")]
    pub custom_fields: Value,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub task_type: Option<TaskType>,
    pub priority: Option<TaskPriority>,
    pub status_id: Option<Uuid>,
    pub sprint_id: Option<Uuid>,
    pub parent_task_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub story_points: Option<i32>,
    pub original_estimate: Option<i32>,
    pub remaining_estimate: Option<i32>,
    #[ts(type = "Record<string, unknown> | null")]
    pub custom_fields: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct SetAssignees {
    pub assignee_ids: Vec<Uuid>,
}

/// Query string of `GET /tasks`. List-valued filters are comma separated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskQuery {
    pub organization_id: Option<Uuid>,
    pub workspace_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub status_ids: Option<String>,
    pub priorities: Option<String>,
    pub types: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub reporter_id: Option<Uuid>,
    pub sprint_id: Option<Uuid>,
    pub parent_task_id: Option<Uuid>,
    #[serde(default)]
    pub top_level: bool,
    pub search: Option<String>,
    pub due_from: Option<DateTime<Utc>>,
    pub due_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub overdue: bool,
    pub sort_by: Option<TaskSortField>,
    pub sort_order: Option<SortOrder>,
}

/// One column of the project board.
#[derive(Debug, Clone, Serialize, TS)]
pub struct BoardColumn {
    pub status: TaskStatus,
    pub tasks: Vec<TaskWithDetails>,
}

fn parse_list<T: FromStr>(field: &str, raw: Option<&str>) -> Result<Vec<T>, ServiceError> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<T>()
                .map_err(|_| ServiceError::bad_request(format!("invalid {field} value '{item}'")))
        })
        .collect()
}

impl TaskQuery {
    /// Filter and ordering for the listing. `visible_to` is left unset.
    pub fn to_filter(&self) -> Result<(TaskFilter, TaskSort), ServiceError> {
        validation::date_range(
            "due_from",
            self.due_from.as_ref(),
            "due_to",
            self.due_to.as_ref(),
        )?;
        let filter = TaskFilter {
            organization_id: self.organization_id,
            workspace_id: self.workspace_id,
            project_id: self.project_id,
            status_ids: parse_list("status_ids", self.status_ids.as_deref())?,
            priorities: parse_list("priorities", self.priorities.as_deref())?,
            types: parse_list("types", self.types.as_deref())?,
            assignee_id: self.assignee_id,
            reporter_id: self.reporter_id,
            sprint_id: self.sprint_id,
            parent_task_id: self.parent_task_id,
            top_level: self.top_level,
            search: self.search.clone(),
            due_from: self.due_from,
            due_to: self.due_to,
            overdue: self.overdue,
            visible_to: None,
        };
        let sort = TaskSort {
            field: self.sort_by.unwrap_or_default(),
            order: self.sort_order.unwrap_or_default(),
        };
        Ok((filter, sort))
    }
}

/// New `completed_at` after a status change: set when the task enters a
/// DONE status, cleared when it leaves one, kept otherwise.
pub fn completed_at_after(
    from: StatusCategory,
    to: StatusCategory,
    current: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match (from == StatusCategory::Done, to == StatusCategory::Done) {
        (false, true) => Some(now),
        (true, false) => None,
        _ => current,
    }
}

fn check_estimates(values: &[(&'static str, Option<i32>)]) -> Result<(), ServiceError> {
    for (field, value) in values {
        if value.is_some_and(|v| v < 0) {
            return Err(ServiceError::bad_request(format!("{field} must not be negative")));
        }
    }
    Ok(())
}

/// The given status if it belongs to the project's workflow, else the
/// workflow's default status.
pub(crate) async fn resolve_status(
    pool: &PgPool,
    project: &Project,
    status_id: Option<Uuid>,
) -> Result<TaskStatus, ServiceError> {
    match status_id {
        Some(id) => TaskStatus::find_by_id(pool, id)
            .await?
            .filter(|s| s.workflow_id == project.workflow_id)
            .ok_or_else(|| ServiceError::bad_request("status does not belong to the project's workflow")),
        None => TaskStatus::find_default(pool, project.workflow_id)
            .await?
            .ok_or_else(|| ServiceError::bad_request("project workflow has no statuses")),
    }
}

async fn check_sprint(pool: &PgPool, project_id: Uuid, sprint_id: Uuid) -> Result<(), ServiceError> {
    match Sprint::find_by_id(pool, sprint_id).await? {
        Some(sprint) if sprint.project_id == project_id => Ok(()),
        _ => Err(ServiceError::bad_request("sprint does not belong to the project")),
    }
}

async fn check_parent(
    pool: &PgPool,
    project_id: Uuid,
    parent_id: Uuid,
    task_id: Option<Uuid>,
) -> Result<(), ServiceError> {
    if Some(parent_id) == task_id {
        return Err(ServiceError::bad_request("a task cannot be its own parent"));
    }
    match Task::find_by_id(pool, parent_id).await? {
        Some(parent) if parent.project_id == project_id => {}
        _ => return Err(ServiceError::bad_request("parent task does not belong to the project")),
    }
    if let Some(task_id) = task_id
        && Task::lineage(pool, parent_id).await?.contains(&task_id)
    {
        return Err(ServiceError::bad_request(
            "a task cannot be moved under one of its own subtasks",
        ));
    }
    Ok(())
}

/// Deduplicated assignees, all of which must be able to access the project.
pub(crate) async fn check_assignees(
    pool: &PgPool,
    project_id: Uuid,
    user_ids: &[Uuid],
) -> Result<Vec<Uuid>, ServiceError> {
    let mut ids = user_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(ids);
    }
    let allowed = Task::users_with_project_access(pool, project_id, &ids).await?;
    if allowed.len() != ids.len() {
        return Err(ServiceError::bad_request(
            "every assignee must have access to the project",
        ));
    }
    Ok(ids)
}

/// Column values of a validated task, minus the number and slug allocated on insert.
#[derive(Debug, Clone)]
pub(crate) struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub sprint_id: Option<Uuid>,
    pub parent_task_id: Option<Uuid>,
    pub reporter_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub story_points: Option<i32>,
    pub original_estimate: Option<i32>,
    pub remaining_estimate: Option<i32>,
    pub custom_fields: Value,
    pub assignee_ids: Vec<Uuid>,
    pub created_by: Option<Uuid>,
}

/// Inserts a task with the next number of its project. The transaction is
/// re-run on serialization failures and deadlocks.
pub(crate) async fn insert_task(
    pool: &PgPool,
    project_id: Uuid,
    draft: &TaskDraft,
) -> Result<Task, ServiceError> {
    let completed_at = (draft.status.category == StatusCategory::Done).then(Utc::now);

    db::with_retry(&RetryConfig::default(), "tasks.create", || async move {
        let mut tx = pool.begin().await?;
        let (task_number, project_slug) = Project::next_task_number(&mut tx, project_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("project"))?;
        let task = Task::create(
            &mut *tx,
            &NewTask {
                project_id,
                title: draft.title.clone(),
                description: draft.description.clone(),
                task_type: draft.task_type,
                priority: draft.priority,
                task_number,
                slug: task_slug(&project_slug, task_number),
                status_id: draft.status.id,
                sprint_id: draft.sprint_id,
                parent_task_id: draft.parent_task_id,
                reporter_id: draft.reporter_id,
                start_date: draft.start_date,
                due_date: draft.due_date,
                completed_at,
                story_points: draft.story_points,
                original_estimate: draft.original_estimate,
                remaining_estimate: draft.remaining_estimate,
                custom_fields: draft.custom_fields.clone(),
                created_by: draft.created_by,
            },
        )
        .await?;
        if !draft.assignee_ids.is_empty() {
            Task::set_assignees(&mut tx, task.id, &draft.assignee_ids).await?;
        }
        tx.commit().await?;
        Ok::<_, ServiceError>(task)
    })
    .await
}

async fn with_assignees(pool: &PgPool, rows: Vec<TaskRow>) -> Result<Vec<TaskWithDetails>, ServiceError> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.task.id).collect();
    let mut assignees = Task::assignees_for(pool, &ids).await?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let users = assignees.remove(&row.task.id).unwrap_or_default();
            TaskWithDetails::from_row(row, users)
        })
        .collect())
}

pub(crate) async fn details(pool: &PgPool, task_id: Uuid) -> Result<TaskWithDetails, ServiceError> {
    let row = Task::find_row(pool, task_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("task"))?;
    with_assignees(pool, vec![row])
        .await?
        .pop()
        .ok_or_else(|| ServiceError::not_found("task"))
}

#[tracing::instrument(name = "tasks.create", skip(pool, actor, data), fields(user_id = %actor.id))]
pub async fn create(
    pool: &PgPool,
    actor: &Actor,
    project_id: Uuid,
    data: CreateTask,
) -> Result<TaskWithDetails, ServiceError> {
    require(pool, actor, AccessScope::Project(project_id), MemberRole::Member).await?;
    let project = Project::find_by_id(pool, project_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("project"))?;

    let title = validation::required_text("title", &data.title, validation::MAX_TITLE_LEN)?;
    let description = validation::description(data.description)?;
    let custom_fields = validation::json_object("custom_fields", data.custom_fields)?;
    validation::date_range(
        "start_date",
        data.start_date.as_ref(),
        "due_date",
        data.due_date.as_ref(),
    )?;
    check_estimates(&[
        ("story_points", data.story_points),
        ("original_estimate", data.original_estimate),
        ("remaining_estimate", data.remaining_estimate),
    ])?;

    let status = resolve_status(pool, &project, data.status_id).await?;
    let sprint_id = match data.sprint_id {
        Some(id) => {
            check_sprint(pool, project_id, id).await?;
            Some(id)
        }
        None => Sprint::find_default(pool, project_id).await?.map(|s| s.id),
    };
    if let Some(parent_id) = data.parent_task_id {
        check_parent(pool, project_id, parent_id, None).await?;
    }
    let assignee_ids = check_assignees(pool, project_id, &data.assignee_ids).await?;

    let draft = TaskDraft {
        title,
        description,
        task_type: data.task_type,
        priority: data.priority,
        status,
        sprint_id,
        parent_task_id: data.parent_task_id,
        reporter_id: Some(actor.id),
        start_date: data.start_date,
        due_date: data.due_date,
        story_points: data.story_points,
        original_estimate: data.original_estimate,
        remaining_estimate: data.remaining_estimate,
        custom_fields,
        assignee_ids,
        created_by: Some(actor.id),
    };
    let task = insert_task(pool, project_id, &draft).await?;
    tracing::info!(task_id = %task.id, slug = %task.slug, "task created");
    details(pool, task.id).await
}

/// Tasks matching the query among the projects the caller can access.
/// Explicit organization, workspace or project filters are access-checked.
pub async fn list(
    pool: &PgPool,
    actor: &Actor,
    query: &TaskQuery,
    params: &PaginationParams,
) -> Result<Paginated<TaskWithDetails>, ServiceError> {
    let (mut filter, sort) = query.to_filter()?;
    if let Some(id) = filter.project_id {
        require(pool, actor, AccessScope::Project(id), MemberRole::Viewer).await?;
    } else if let Some(id) = filter.workspace_id {
        require(pool, actor, AccessScope::Workspace(id), MemberRole::Viewer).await?;
    } else if let Some(id) = filter.organization_id {
        require(pool, actor, AccessScope::Organization(id), MemberRole::Viewer).await?;
    }
    filter.visible_to = (!actor.is_super_admin).then_some(actor.id);

    let rows = Task::list(
        pool,
        &filter,
        sort,
        i64::from(params.limit()),
        params.offset(),
    )
    .await?;
    let total = Task::count(pool, &filter).await?;
    Ok(Paginated::new(with_assignees(pool, rows).await?, total, params))
}

pub async fn get(pool: &PgPool, actor: &Actor, id: Uuid) -> Result<TaskWithDetails, ServiceError> {
    require_task(pool, actor, id, MemberRole::Viewer).await?;
    details(pool, id).await
}

pub async fn get_by_slug(
    pool: &PgPool,
    actor: &Actor,
    project_id: Uuid,
    slug: &str,
) -> Result<TaskWithDetails, ServiceError> {
    require(pool, actor, AccessScope::Project(project_id), MemberRole::Viewer).await?;
    let row = Task::find_row_by_slug(pool, project_id, slug)
        .await?
        .ok_or_else(|| ServiceError::not_found("task"))?;
    with_assignees(pool, vec![row])
        .await?
        .pop()
        .ok_or_else(|| ServiceError::not_found("task"))
}

#[tracing::instrument(name = "tasks.update", skip(pool, actor, data), fields(user_id = %actor.id))]
pub async fn update(
    pool: &PgPool,
    actor: &Actor,
    id: Uuid,
    data: UpdateTask,
) -> Result<TaskWithDetails, ServiceError> {
    require_task(pool, actor, id, MemberRole::Member).await?;
    let current = Task::find_row(pool, id)
        .await?
        .ok_or_else(|| ServiceError::not_found("task"))?;
    let project = Project::find_by_id(pool, current.task.project_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("project"))?;

    validation::date_range(
        "start_date",
        data.start_date.as_ref().or(current.task.start_date.as_ref()),
        "due_date",
        data.due_date.as_ref().or(current.task.due_date.as_ref()),
    )?;
    check_estimates(&[
        ("story_points", data.story_points),
        ("original_estimate", data.original_estimate),
        ("remaining_estimate", data.remaining_estimate),
    ])?;

    let completed_at = match data.status_id {
        Some(status_id) if status_id != current.task.status_id => {
            let status = resolve_status(pool, &project, Some(status_id)).await?;
            completed_at_after(
                current.status_category,
                status.category,
                current.task.completed_at,
                Utc::now(),
            )
        }
        _ => current.task.completed_at,
    };
    if let Some(sprint_id) = data.sprint_id {
        check_sprint(pool, project.id, sprint_id).await?;
    }
    if let Some(parent_id) = data.parent_task_id {
        check_parent(pool, project.id, parent_id, Some(id)).await?;
    }

    let changes = TaskChanges {
        title: data
            .title
            .as_deref()
            .map(|t| validation::required_text("title", t, validation::MAX_TITLE_LEN))
            .transpose()?,
        description: validation::description(data.description)?,
        task_type: data.task_type,
        priority: data.priority,
        status_id: data.status_id,
        sprint_id: data.sprint_id,
        parent_task_id: data.parent_task_id,
        start_date: data.start_date,
        due_date: data.due_date,
        story_points: data.story_points,
        original_estimate: data.original_estimate,
        remaining_estimate: data.remaining_estimate,
        custom_fields: data
            .custom_fields
            .map(|v| validation::json_object("custom_fields", v))
            .transpose()?,
        completed_at,
    };
    Task::update(pool, id, &changes)
        .await?
        .ok_or_else(|| ServiceError::not_found("task"))?;
    details(pool, id).await
}

/// Managers may delete any task; members only the tasks they reported.
#[tracing::instrument(name = "tasks.delete", skip(pool, actor), fields(user_id = %actor.id))]
pub async fn delete(pool: &PgPool, actor: &Actor, id: Uuid) -> Result<(), ServiceError> {
    let (task, access) = require_task(pool, actor, id, MemberRole::Viewer).await?;
    let is_reporter = task.reporter_id == Some(actor.id) && access.role.can_write();
    if !access.is_elevated() && !is_reporter {
        return Err(ServiceError::forbidden(
            "only managers or the reporter can delete a task",
        ));
    }
    Task::delete(pool, id).await?;
    tracing::info!(task_id = %id, "task deleted");
    Ok(())
}

pub async fn set_assignees(
    pool: &PgPool,
    actor: &Actor,
    id: Uuid,
    data: SetAssignees,
) -> Result<TaskWithDetails, ServiceError> {
    let (task, _) = require_task(pool, actor, id, MemberRole::Member).await?;
    let ids = check_assignees(pool, task.project_id, &data.assignee_ids).await?;

    let mut tx = pool.begin().await?;
    Task::set_assignees(&mut tx, id, &ids).await?;
    tx.commit().await?;
    details(pool, id).await
}

pub async fn subtasks(
    pool: &PgPool,
    actor: &Actor,
    id: Uuid,
) -> Result<Vec<TaskWithDetails>, ServiceError> {
    require_task(pool, actor, id, MemberRole::Viewer).await?;
    let rows = Task::subtasks(pool, id).await?;
    with_assignees(pool, rows).await
}

/// Tasks of a project grouped by status column, columns in board order.
pub async fn board(
    pool: &PgPool,
    actor: &Actor,
    project_id: Uuid,
    sprint_id: Option<Uuid>,
) -> Result<Vec<BoardColumn>, ServiceError> {
    require(pool, actor, AccessScope::Project(project_id), MemberRole::Viewer).await?;
    let project = Project::find_by_id(pool, project_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("project"))?;
    if let Some(sprint_id) = sprint_id {
        check_sprint(pool, project_id, sprint_id).await?;
    }

    let statuses = TaskStatus::list_for_workflow(pool, project.workflow_id).await?;
    let rows = Task::list_for_board(pool, project_id, sprint_id).await?;
    let mut by_status: HashMap<Uuid, Vec<TaskWithDetails>> = HashMap::new();
    for task in with_assignees(pool, rows).await? {
        by_status.entry(task.task.status_id).or_default().push(task);
    }

    Ok(statuses
        .into_iter()
        .map(|status| BoardColumn {
            tasks: by_status.remove(&status.id).unwrap_or_default(),
            status,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn entering_done_sets_completion_time() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(
            completed_at_after(StatusCategory::InProgress, StatusCategory::Done, None, now),
            Some(now)
        );
    }

    #[test]
    fn leaving_done_clears_completion_time() {
        let now = Utc::now();
        let earlier = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            completed_at_after(StatusCategory::Done, StatusCategory::Todo, Some(earlier), now),
            None
        );
        assert_eq!(
            completed_at_after(StatusCategory::Done, StatusCategory::Done, Some(earlier), now),
            Some(earlier)
        );
        assert_eq!(
            completed_at_after(StatusCategory::Todo, StatusCategory::InProgress, None, now),
            None
        );
    }

    #[test]
    fn query_lists_are_comma_separated() {
        let status = Uuid::new_v4();
        let query = TaskQuery {
            status_ids: Some(format!("{status}, ")),
            priorities: Some("high,HIGHEST".into()),
            types: Some("bug".into()),
            sort_by: Some(TaskSortField::DueDate),
            ..Default::default()
        };
        let (filter, sort) = query.to_filter().unwrap();
        assert_eq!(filter.status_ids, vec![status]);
        assert_eq!(filter.priorities, vec![TaskPriority::High, TaskPriority::Highest]);
        assert_eq!(filter.types, vec![TaskType::Bug]);
        assert_eq!(sort.field, TaskSortField::DueDate);
        assert_eq!(sort.order, SortOrder::Desc);
        assert!(filter.visible_to.is_none());
    }

    #[test]
    fn invalid_list_values_are_bad_requests() {
        let query = TaskQuery {
            priorities: Some("urgent".into()),
            ..Default::default()
        };
        assert!(matches!(query.to_filter(), Err(ServiceError::BadRequest(m)) if m.contains("urgent")));
    }

    #[test]
    fn inverted_due_range_is_rejected() {
        let query = TaskQuery {
            due_from: Some(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()),
            due_to: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        assert!(query.to_filter().is_err());
    }

    #[test]
    fn negative_estimates_are_rejected() {
        assert!(check_estimates(&[("story_points", Some(-1))]).is_err());
        assert!(check_estimates(&[("story_points", Some(3)), ("original_estimate", None)]).is_ok());
    }
}
