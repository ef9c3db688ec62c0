use db::{
    models::{
        access::AccessScope,
        member::{Member, MemberScope},
        role::MemberRole,
        workspace::{NewWorkspace, Workspace, WorkspaceChanges},
    },
    validation,
};
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    access::{Actor, require},
    error::ServiceError,
    slugs,
};

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateWorkspace {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub avatar: Option<String>,
    #[serde(default)]
    #[ts(type = "Record<string, unknown> | null")]
    pub settings: Value,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateWorkspace {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub avatar: Option<String>,
    #[ts(type = "Record<string, unknown> | null")]
    pub settings: Option<Value>,
}

/// Creates a workspace under a free slug and seeds its members in the same
/// transaction: the creator as OWNER and every organization owner and
/// manager with their organization role.
#[tracing::instrument(name = "workspaces.create", skip(pool, actor, data), fields(user_id = %actor.id))]
pub async fn create(
    pool: &PgPool,
    actor: &Actor,
    organization_id: Uuid,
    data: CreateWorkspace,
) -> Result<Workspace, ServiceError> {
    require(
        pool,
        actor,
        AccessScope::Organization(organization_id),
        MemberRole::Manager,
    )
    .await?;

    let name = validation::name("name", &data.name)?;
    let description = validation::description(data.description)?;
    let color = validation::optional_color(data.color)?;
    let settings = validation::json_object("settings", data.settings)?;
    let base = slugs::base_slug(&name, data.slug.as_deref(), "workspace")?;
    let creator = actor.id;

    let workspace = slugs::insert_with_unique_slug(
        &base,
        || Workspace::slugs_like(pool, organization_id, &base),
        |slug| {
            let new = NewWorkspace {
                organization_id,
                name: name.clone(),
                slug,
                description: description.clone(),
                color: color.clone(),
                avatar: data.avatar.clone(),
                settings: settings.clone(),
                created_by: creator,
            };
            async move {
                let mut tx = pool.begin().await?;
                let workspace = Workspace::create(&mut *tx, &new).await?;
                let scope = MemberScope::Workspace(workspace.id);
                Member::add(&mut *tx, scope, creator, MemberRole::Owner).await?;
                let elevated =
                    Member::elevated(&mut *tx, MemberScope::Organization(organization_id)).await?;
                for (user_id, role) in elevated {
                    if user_id != creator {
                        Member::add_if_absent(&mut *tx, scope, user_id, role).await?;
                    }
                }
                tx.commit().await?;
                Ok(workspace)
            }
        },
    )
    .await?;

    tracing::info!(workspace_id = %workspace.id, slug = %workspace.slug, "workspace created");
    Ok(workspace)
}

/// Elevated organization members see every workspace; others only their own.
pub async fn list(
    pool: &PgPool,
    actor: &Actor,
    organization_id: Uuid,
    include_archived: bool,
) -> Result<Vec<Workspace>, ServiceError> {
    let access = require(
        pool,
        actor,
        AccessScope::Organization(organization_id),
        MemberRole::Viewer,
    )
    .await?;
    let member_of = (!access.is_elevated()).then_some(actor.id);
    Ok(Workspace::list_for_organization(pool, organization_id, member_of, include_archived).await?)
}

pub async fn get(pool: &PgPool, actor: &Actor, id: Uuid) -> Result<Workspace, ServiceError> {
    require(pool, actor, AccessScope::Workspace(id), MemberRole::Viewer).await?;
    Workspace::find_by_id(pool, id)
        .await?
        .ok_or_else(|| ServiceError::not_found("workspace"))
}

pub async fn get_by_slug(
    pool: &PgPool,
    actor: &Actor,
    organization_id: Uuid,
    slug: &str,
) -> Result<Workspace, ServiceError> {
    let workspace = Workspace::find_by_slug(pool, organization_id, slug)
        .await?
        .ok_or_else(|| ServiceError::not_found("workspace"))?;
    require(pool, actor, AccessScope::Workspace(workspace.id), MemberRole::Viewer).await?;
    Ok(workspace)
}

#[tracing::instrument(name = "workspaces.update", skip(pool, actor, data), fields(user_id = %actor.id))]
pub async fn update(
    pool: &PgPool,
    actor: &Actor,
    id: Uuid,
    data: UpdateWorkspace,
) -> Result<Workspace, ServiceError> {
    require(pool, actor, AccessScope::Workspace(id), MemberRole::Manager).await?;

    let changes = WorkspaceChanges {
        name: data
            .name
            .as_deref()
            .map(|n| validation::name("name", n))
            .transpose()?,
        slug: data.slug.as_deref().map(validation::slug).transpose()?,
        description: validation::description(data.description)?,
        color: validation::optional_color(data.color)?,
        avatar: data.avatar,
        settings: data
            .settings
            .map(|s| validation::json_object("settings", s))
            .transpose()?,
    };
    Workspace::update(pool, id, &changes)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                ServiceError::conflict("workspace slug is already in use in this organization")
            } else {
                e.into()
            }
        })?
        .ok_or_else(|| ServiceError::not_found("workspace"))
}

pub async fn archive(
    pool: &PgPool,
    actor: &Actor,
    id: Uuid,
    archived: bool,
) -> Result<Workspace, ServiceError> {
    require(pool, actor, AccessScope::Workspace(id), MemberRole::Manager).await?;
    Workspace::set_archived(pool, id, archived)
        .await?
        .ok_or_else(|| ServiceError::not_found("workspace"))
}

#[tracing::instrument(name = "workspaces.delete", skip(pool, actor), fields(user_id = %actor.id))]
pub async fn delete(pool: &PgPool, actor: &Actor, id: Uuid) -> Result<(), ServiceError> {
    require(pool, actor, AccessScope::Workspace(id), MemberRole::Owner).await?;
    if Workspace::delete(pool, id).await? == 0 {
        return Err(ServiceError::not_found("workspace"));
    }
    tracing::info!(workspace_id = %id, "workspace deleted");
    Ok(())
}
