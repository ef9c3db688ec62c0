use db::{
    models::{
        access::AccessScope,
        member::{Member, MemberScope},
        organization::{
            NewOrganization, Organization, OrganizationChanges, OrganizationStats,
            OrganizationWithRole,
        },
        role::MemberRole,
        workflow::Workflow,
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
pub struct CreateOrganization {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub avatar: Option<String>,
    pub website: Option<String>,
    #[serde(default)]
    #[ts(type = "Record<string, unknown> | null")]
    pub settings: Value,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateOrganization {
    pub name: Option<String>,
    pub description: Option<String>,
    pub avatar: Option<String>,
    pub website: Option<String>,
    #[ts(type = "Record<string, unknown> | null")]
    pub settings: Option<Value>,
}

/// Creates the organization, its owner membership and its default workflow
/// in one transaction. The new organization becomes the creator's default
/// if they have none yet.
#[tracing::instrument(name = "organizations.create", skip(pool, actor, data), fields(user_id = %actor.id))]
pub async fn create(
    pool: &PgPool,
    actor: &Actor,
    data: CreateOrganization,
) -> Result<Organization, ServiceError> {
    let name = validation::name("name", &data.name)?;
    let description = validation::description(data.description)?;
    let settings = validation::json_object("settings", data.settings)?;
    let base = slugs::base_slug(&name, data.slug.as_deref(), "organization")?;
    let owner_id = actor.id;

    let organization = slugs::insert_with_unique_slug(
        &base,
        || Organization::slugs_like(pool, &base),
        |slug| {
            let new = NewOrganization {
                name: name.clone(),
                slug,
                description: description.clone(),
                avatar: data.avatar.clone(),
                website: data.website.clone(),
                settings: settings.clone(),
                owner_id,
            };
            async move {
                let mut tx = pool.begin().await?;
                let organization = Organization::create(&mut *tx, &new).await?;
                let scope = MemberScope::Organization(organization.id);
                let first = !Member::has_default_organization(&mut *tx, owner_id).await?;
                Member::add(&mut *tx, scope, owner_id, MemberRole::Owner).await?;
                if first {
                    Member::set_default_organization(&mut tx, organization.id, owner_id).await?;
                }
                Workflow::create_default(&mut tx, organization.id).await?;
                tx.commit().await?;
                Ok(organization)
            }
        },
    )
    .await?;

    tracing::info!(organization_id = %organization.id, slug = %organization.slug, "organization created");
    Ok(organization)
}

pub async fn list_mine(
    pool: &PgPool,
    actor: &Actor,
    include_archived: bool,
) -> Result<Vec<OrganizationWithRole>, ServiceError> {
    Ok(Organization::list_for_user(pool, actor.id, include_archived).await?)
}

pub async fn get(pool: &PgPool, actor: &Actor, id: Uuid) -> Result<Organization, ServiceError> {
    require(pool, actor, AccessScope::Organization(id), MemberRole::Viewer).await?;
    Organization::find_by_id(pool, id)
        .await?
        .ok_or_else(|| ServiceError::not_found("organization"))
}

pub async fn get_by_slug(
    pool: &PgPool,
    actor: &Actor,
    slug: &str,
) -> Result<Organization, ServiceError> {
    let organization = Organization::find_by_slug(pool, slug)
        .await?
        .ok_or_else(|| ServiceError::not_found("organization"))?;
    require(
        pool,
        actor,
        AccessScope::Organization(organization.id),
        MemberRole::Viewer,
    )
    .await?;
    Ok(organization)
}

#[tracing::instrument(name = "organizations.update", skip(pool, actor, data), fields(user_id = %actor.id))]
pub async fn update(
    pool: &PgPool,
    actor: &Actor,
    id: Uuid,
    data: UpdateOrganization,
) -> Result<Organization, ServiceError> {
    require(pool, actor, AccessScope::Organization(id), MemberRole::Manager).await?;

    let changes = OrganizationChanges {
        name: data
            .name
            .as_deref()
            .map(|n| validation::name("name", n))
            .transpose()?,
        description: validation::description(data.description)?,
        avatar: data.avatar,
        website: data.website,
        settings: data
            .settings
            .map(|s| validation::json_object("settings", s))
            .transpose()?,
    };
    Organization::update(pool, id, &changes)
        .await?
        .ok_or_else(|| ServiceError::not_found("organization"))
}

#[tracing::instrument(name = "organizations.archive", skip(pool, actor), fields(user_id = %actor.id))]
pub async fn archive(
    pool: &PgPool,
    actor: &Actor,
    id: Uuid,
    archived: bool,
) -> Result<Organization, ServiceError> {
    require(pool, actor, AccessScope::Organization(id), MemberRole::Owner).await?;
    Organization::set_archived(pool, id, archived)
        .await?
        .ok_or_else(|| ServiceError::not_found("organization"))
}

#[tracing::instrument(name = "organizations.delete", skip(pool, actor), fields(user_id = %actor.id))]
pub async fn delete(pool: &PgPool, actor: &Actor, id: Uuid) -> Result<(), ServiceError> {
    require(pool, actor, AccessScope::Organization(id), MemberRole::Owner).await?;
    if Organization::delete(pool, id).await? == 0 {
        return Err(ServiceError::not_found("organization"));
    }
    tracing::info!(organization_id = %id, "organization deleted");
    Ok(())
}

pub async fn stats(
    pool: &PgPool,
    actor: &Actor,
    id: Uuid,
) -> Result<OrganizationStats, ServiceError> {
    require(pool, actor, AccessScope::Organization(id), MemberRole::Viewer).await?;
    Ok(Organization::stats(pool, id).await?)
}
