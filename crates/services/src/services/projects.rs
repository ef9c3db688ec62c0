use chrono::{DateTime, Utc};
use db::{
    models::{
        access::AccessScope,
        member::{Member, MemberScope},
        project::{
            NewProject, Project, ProjectChanges, ProjectFilter, ProjectStatus, ProjectVisibility,
        },
        role::MemberRole,
        sprint::{DEFAULT_SPRINT_NAME, NewSprint, Sprint},
        task::TaskPriority,
        workflow::Workflow,
    },
    validation,
};
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;
use ts_rs::TS;
use utils::api::pagination::{Paginated, PaginationParams};
use uuid::Uuid;

use super::{
    access::{Actor, require},
    error::ServiceError,
    slugs,
};

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateProject {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub visibility: ProjectVisibility,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    #[ts(type = "Record<string, unknown> | null")]
    pub settings: Value,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<TaskPriority>,
    pub visibility: Option<ProjectVisibility>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[ts(type = "Record<string, unknown> | null")]
    pub settings: Option<Value>,
}

/// `?status=&priority=&search=&archived=` filters of the project listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectQuery {
    pub status: Option<ProjectStatus>,
    pub priority: Option<TaskPriority>,
    pub search: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

/// Creates a project under a free slug. The project is bound to the
/// organization's default workflow and gets a default sprint and its creator
/// as OWNER in the same transaction.
#[tracing::instrument(name = "projects.create", skip(pool, actor, data), fields(user_id = %actor.id))]
pub async fn create(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    data: CreateProject,
) -> Result<Project, ServiceError> {
    let access = require(pool, actor, AccessScope::Workspace(workspace_id), MemberRole::Manager).await?;

    let name = validation::name("name", &data.name)?;
    let description = validation::description(data.description)?;
    let color = validation::optional_color(data.color)?;
    let settings = validation::json_object("settings", data.settings)?;
    validation::date_range(
        "start_date",
        data.start_date.as_ref(),
        "end_date",
        data.end_date.as_ref(),
    )?;
    let workflow = Workflow::find_default_for_organization(pool, access.organization_id())
        .await?
        .ok_or_else(|| ServiceError::bad_request("organization has no default workflow"))?;
    let base = slugs::base_slug(&name, data.slug.as_deref(), "project")?;
    let creator = actor.id;

    let project = slugs::insert_with_unique_slug(
        &base,
        || Project::slugs_like(pool, workspace_id, &base),
        |slug| {
            let new = NewProject {
                workspace_id,
                workflow_id: workflow.id,
                name: name.clone(),
                slug,
                description: description.clone(),
                color: color.clone(),
                status: data.status,
                priority: data.priority,
                visibility: data.visibility,
                start_date: data.start_date,
                end_date: data.end_date,
                settings: settings.clone(),
                created_by: creator,
            };
            async move {
                let mut tx = pool.begin().await?;
                let project = Project::create(&mut *tx, &new).await?;
                Sprint::create(
                    &mut *tx,
                    &NewSprint {
                        project_id: project.id,
                        name: DEFAULT_SPRINT_NAME.to_string(),
                        goal: None,
                        start_date: None,
                        end_date: None,
                        is_default: true,
                        created_by: Some(creator),
                    },
                )
                .await?;
                Member::add(&mut *tx, MemberScope::Project(project.id), creator, MemberRole::Owner)
                    .await?;
                tx.commit().await?;
                Ok(project)
            }
        },
    )
    .await?;

    tracing::info!(project_id = %project.id, slug = %project.slug, "project created");
    Ok(project)
}

/// Elevated workspace members see every project; others only those they
/// belong to.
pub async fn list(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    query: ProjectQuery,
    params: &PaginationParams,
) -> Result<Paginated<Project>, ServiceError> {
    let access = require(pool, actor, AccessScope::Workspace(workspace_id), MemberRole::Viewer).await?;
    let filter = ProjectFilter {
        status: query.status,
        priority: query.priority,
        search: query.search,
        include_archived: query.archived,
        member_of: (!access.is_elevated()).then_some(actor.id),
    };
    let projects = Project::list(
        pool,
        workspace_id,
        &filter,
        i64::from(params.limit()),
        params.offset(),
    )
    .await?;
    let total = Project::count(pool, workspace_id, &filter).await?;
    Ok(Paginated::new(projects, total, params))
}

pub async fn get(pool: &PgPool, actor: &Actor, id: Uuid) -> Result<Project, ServiceError> {
    require(pool, actor, AccessScope::Project(id), MemberRole::Viewer).await?;
    Project::find_by_id(pool, id)
        .await?
        .ok_or_else(|| ServiceError::not_found("project"))
}

pub async fn get_by_slug(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    slug: &str,
) -> Result<Project, ServiceError> {
    let project = Project::find_by_slug(pool, workspace_id, slug)
        .await?
        .ok_or_else(|| ServiceError::not_found("project"))?;
    require(pool, actor, AccessScope::Project(project.id), MemberRole::Viewer).await?;
    Ok(project)
}

#[tracing::instrument(name = "projects.update", skip(pool, actor, data), fields(user_id = %actor.id))]
pub async fn update(
    pool: &PgPool,
    actor: &Actor,
    id: Uuid,
    data: UpdateProject,
) -> Result<Project, ServiceError> {
    require(pool, actor, AccessScope::Project(id), MemberRole::Manager).await?;
    let current = Project::find_by_id(pool, id)
        .await?
        .ok_or_else(|| ServiceError::not_found("project"))?;
    validation::date_range(
        "start_date",
        data.start_date.as_ref().or(current.start_date.as_ref()),
        "end_date",
        data.end_date.as_ref().or(current.end_date.as_ref()),
    )?;

    let changes = ProjectChanges {
        name: data
            .name
            .as_deref()
            .map(|n| validation::name("name", n))
            .transpose()?,
        slug: data.slug.as_deref().map(validation::slug).transpose()?,
        description: validation::description(data.description)?,
        color: validation::optional_color(data.color)?,
        status: data.status,
        priority: data.priority,
        visibility: data.visibility,
        start_date: data.start_date,
        end_date: data.end_date,
        settings: data
            .settings
            .map(|s| validation::json_object("settings", s))
            .transpose()?,
    };
    Project::update(pool, id, &changes)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                ServiceError::conflict("project slug is already in use in this workspace")
            } else {
                e.into()
            }
        })?
        .ok_or_else(|| ServiceError::not_found("project"))
}

pub async fn archive(
    pool: &PgPool,
    actor: &Actor,
    id: Uuid,
    archived: bool,
) -> Result<Project, ServiceError> {
    require(pool, actor, AccessScope::Project(id), MemberRole::Manager).await?;
    Project::set_archived(pool, id, archived)
        .await?
        .ok_or_else(|| ServiceError::not_found("project"))
}

#[tracing::instrument(name = "projects.delete", skip(pool, actor), fields(user_id = %actor.id))]
pub async fn delete(pool: &PgPool, actor: &Actor, id: Uuid) -> Result<(), ServiceError> {
    require(pool, actor, AccessScope::Project(id), MemberRole::Owner).await?;
    if Project::delete(pool, id).await? == 0 {
        return Err(ServiceError::not_found("project"));
    }
    tracing::info!(project_id = %id, "project deleted");
    Ok(())
}
