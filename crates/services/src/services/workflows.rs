use db::{
    models::{
        access::AccessScope,
        project::Project,
        role::MemberRole,
        workflow::{
            NewTaskStatus, StatusCategory, TaskStatus, TaskStatusChanges, Workflow,
            WorkflowWithStatuses,
        },
    },
    validation,
};
use serde::Deserialize;
use sqlx::PgPool;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    access::{Actor, require},
    error::ServiceError,
};

const MAX_STATUS_NAME_LEN: usize = 50;

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateTaskStatus {
    pub name: String,
    pub color: String,
    pub category: StatusCategory,
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateTaskStatus {
    pub name: Option<String>,
    pub color: Option<String>,
    pub category: Option<StatusCategory>,
    pub position: Option<i32>,
}

async fn default_workflow(pool: &PgPool, organization_id: Uuid) -> Result<Workflow, ServiceError> {
    Workflow::find_default_for_organization(pool, organization_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("workflow"))
}

pub async fn get_for_organization(
    pool: &PgPool,
    actor: &Actor,
    organization_id: Uuid,
) -> Result<WorkflowWithStatuses, ServiceError> {
    require(
        pool,
        actor,
        AccessScope::Organization(organization_id),
        MemberRole::Viewer,
    )
    .await?;
    let workflow = default_workflow(pool, organization_id).await?;
    let statuses = TaskStatus::list_for_workflow(pool, workflow.id).await?;
    Ok(WorkflowWithStatuses { workflow, statuses })
}

/// Board columns of a project, in position order.
pub async fn list_project_statuses(
    pool: &PgPool,
    actor: &Actor,
    project_id: Uuid,
) -> Result<Vec<TaskStatus>, ServiceError> {
    require(pool, actor, AccessScope::Project(project_id), MemberRole::Viewer).await?;
    let project = Project::find_by_id(pool, project_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("project"))?;
    Ok(TaskStatus::list_for_workflow(pool, project.workflow_id).await?)
}

#[tracing::instrument(name = "workflows.create_status", skip(pool, actor, data), fields(user_id = %actor.id))]
pub async fn create_status(
    pool: &PgPool,
    actor: &Actor,
    organization_id: Uuid,
    data: CreateTaskStatus,
) -> Result<TaskStatus, ServiceError> {
    require(
        pool,
        actor,
        AccessScope::Organization(organization_id),
        MemberRole::Manager,
    )
    .await?;
    if data.position.is_some_and(|p| p < 0) {
        return Err(ServiceError::bad_request("position must not be negative"));
    }
    let workflow = default_workflow(pool, organization_id).await?;
    let status = TaskStatus::create(
        pool,
        workflow.id,
        &NewTaskStatus {
            name: validation::required_text("name", &data.name, MAX_STATUS_NAME_LEN)?,
            color: validation::color(&data.color)?,
            category: data.category,
            position: data.position,
        },
    )
    .await?;
    tracing::info!(status_id = %status.id, "task status created");
    Ok(status)
}

/// Loads a status and checks the caller manages its organization.
async fn require_status(
    pool: &PgPool,
    actor: &Actor,
    status_id: Uuid,
) -> Result<TaskStatus, ServiceError> {
    let status = TaskStatus::find_by_id(pool, status_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("task status"))?;
    let organization_id = TaskStatus::organization_id(pool, status_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("task status"))?;
    require(
        pool,
        actor,
        AccessScope::Organization(organization_id),
        MemberRole::Manager,
    )
    .await?;
    Ok(status)
}

#[tracing::instrument(name = "workflows.update_status", skip(pool, actor, data), fields(user_id = %actor.id))]
pub async fn update_status(
    pool: &PgPool,
    actor: &Actor,
    status_id: Uuid,
    data: UpdateTaskStatus,
) -> Result<TaskStatus, ServiceError> {
    require_status(pool, actor, status_id).await?;
    if data.position.is_some_and(|p| p < 0) {
        return Err(ServiceError::bad_request("position must not be negative"));
    }
    let changes = TaskStatusChanges {
        name: data
            .name
            .as_deref()
            .map(|n| validation::required_text("name", n, MAX_STATUS_NAME_LEN))
            .transpose()?,
        color: validation::optional_color(data.color)?,
        category: data.category,
        position: data.position,
    };
    TaskStatus::update(pool, status_id, &changes)
        .await?
        .ok_or_else(|| ServiceError::not_found("task status"))
}

/// The default status and statuses still used by tasks cannot be deleted.
#[tracing::instrument(name = "workflows.delete_status", skip(pool, actor), fields(user_id = %actor.id))]
pub async fn delete_status(pool: &PgPool, actor: &Actor, status_id: Uuid) -> Result<(), ServiceError> {
    let status = require_status(pool, actor, status_id).await?;
    if status.is_default {
        return Err(ServiceError::bad_request("the default status cannot be deleted"));
    }
    let in_use = TaskStatus::task_count(pool, status_id).await?;
    if in_use > 0 {
        return Err(ServiceError::conflict(format!(
            "status is used by {in_use} task(s)"
        )));
    }
    TaskStatus::delete(pool, status_id).await?;
    tracing::info!(%status_id, "task status deleted");
    Ok(())
}
