use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use db::models::organization::{Organization, OrganizationStats, OrganizationWithRole};
use services::services::organizations::{self, CreateOrganization, UpdateOrganization};
use tracing::instrument;
use uuid::Uuid;

use super::{ArchiveRequest, ArchivedQuery};
use crate::{AppState, error::ErrorResponse, middleware::RequestContext};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/organizations",
            get(list_organizations).post(create_organization),
        )
        .route("/organizations/slug/{slug}", get(get_organization_by_slug))
        .route(
            "/organizations/{id}",
            get(get_organization)
                .patch(update_organization)
                .delete(delete_organization),
        )
        .route("/organizations/{id}/archive", post(archive_organization))
        .route("/organizations/{id}/stats", get(organization_stats))
}

#[instrument(name = "organizations.create", skip(state, ctx, payload), fields(user_id = %ctx.user.id))]
async fn create_organization(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<CreateOrganization>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let organization = organizations::create(state.pool(), &ctx.actor, payload).await?;
    Ok((StatusCode::CREATED, Json(organization)))
}

async fn list_organizations(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<ArchivedQuery>,
) -> Result<Json<Vec<OrganizationWithRole>>, ErrorResponse> {
    let organizations = organizations::list_mine(state.pool(), &ctx.actor, query.archived).await?;
    Ok(Json(organizations))
}

async fn get_organization(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Organization>, ErrorResponse> {
    Ok(Json(organizations::get(state.pool(), &ctx.actor, id).await?))
}

async fn get_organization_by_slug(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(slug): Path<String>,
) -> Result<Json<Organization>, ErrorResponse> {
    Ok(Json(
        organizations::get_by_slug(state.pool(), &ctx.actor, &slug).await?,
    ))
}

async fn update_organization(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrganization>,
) -> Result<Json<Organization>, ErrorResponse> {
    Ok(Json(
        organizations::update(state.pool(), &ctx.actor, id, payload).await?,
    ))
}

async fn archive_organization(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ArchiveRequest>,
) -> Result<Json<Organization>, ErrorResponse> {
    Ok(Json(
        organizations::archive(state.pool(), &ctx.actor, id, payload.archived).await?,
    ))
}

#[instrument(name = "organizations.delete", skip(state, ctx), fields(user_id = %ctx.user.id, org_id = %id))]
async fn delete_organization(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ErrorResponse> {
    organizations::delete(state.pool(), &ctx.actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn organization_stats(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrganizationStats>, ErrorResponse> {
    Ok(Json(organizations::stats(state.pool(), &ctx.actor, id).await?))
}
