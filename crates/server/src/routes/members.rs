//! Membership endpoints of organizations, workspaces and projects.
//!
//! Organization members join through invitations only, so organizations have
//! no add endpoint.

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use db::models::member::{Member, MemberScope};
use serde::Deserialize;
use services::services::members::{self, AddMember, UpdateMemberRole};
use utils::api::pagination::{Paginated, PaginationParams};
use uuid::Uuid;

use crate::{AppState, error::ErrorResponse, middleware::RequestContext};

#[derive(Debug, Default, Deserialize)]
struct MemberQuery {
    search: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/organizations/{id}/members", get(list_organization_members))
        .route(
            "/organizations/{id}/members/{user_id}",
            patch(update_organization_member).delete(remove_organization_member),
        )
        .route(
            "/organizations/{id}/members/{user_id}/default",
            post(set_default_organization),
        )
        .route(
            "/workspaces/{id}/members",
            get(list_workspace_members).post(add_workspace_member),
        )
        .route(
            "/workspaces/{id}/members/{user_id}",
            patch(update_workspace_member).delete(remove_workspace_member),
        )
        .route(
            "/projects/{id}/members",
            get(list_project_members).post(add_project_member),
        )
        .route(
            "/projects/{id}/members/{user_id}",
            patch(update_project_member).delete(remove_project_member),
        )
}

async fn list(
    state: &AppState,
    ctx: &RequestContext,
    scope: MemberScope,
    query: MemberQuery,
    params: PaginationParams,
) -> Result<Json<Paginated<Member>>, ErrorResponse> {
    let page = members::list(
        state.pool(),
        &ctx.actor,
        scope,
        query.search.as_deref(),
        &params,
    )
    .await?;
    Ok(Json(page))
}

async fn add(
    state: &AppState,
    ctx: &RequestContext,
    scope: MemberScope,
    payload: AddMember,
) -> Result<(StatusCode, Json<Member>), ErrorResponse> {
    let member = members::add(state.pool(), &ctx.actor, scope, payload).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn update(
    state: &AppState,
    ctx: &RequestContext,
    scope: MemberScope,
    user_id: Uuid,
    payload: UpdateMemberRole,
) -> Result<Json<Member>, ErrorResponse> {
    let member =
        members::update_role(state.pool(), &ctx.actor, scope, user_id, payload.role).await?;
    Ok(Json(member))
}

async fn remove(
    state: &AppState,
    ctx: &RequestContext,
    scope: MemberScope,
    user_id: Uuid,
) -> Result<StatusCode, ErrorResponse> {
    members::remove(state.pool(), &ctx.actor, scope, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_organization_members(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<MemberQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<Member>>, ErrorResponse> {
    list(&state, &ctx, MemberScope::Organization(id), query, params).await
}

async fn update_organization_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateMemberRole>,
) -> Result<Json<Member>, ErrorResponse> {
    update(&state, &ctx, MemberScope::Organization(id), user_id, payload).await
}

async fn remove_organization_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ErrorResponse> {
    remove(&state, &ctx, MemberScope::Organization(id), user_id).await
}

async fn set_default_organization(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ErrorResponse> {
    members::set_default_organization(state.pool(), &ctx.actor, id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_workspace_members(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<MemberQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<Member>>, ErrorResponse> {
    list(&state, &ctx, MemberScope::Workspace(id), query, params).await
}

async fn add_workspace_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddMember>,
) -> Result<impl IntoResponse, ErrorResponse> {
    add(&state, &ctx, MemberScope::Workspace(id), payload).await
}

async fn update_workspace_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateMemberRole>,
) -> Result<Json<Member>, ErrorResponse> {
    update(&state, &ctx, MemberScope::Workspace(id), user_id, payload).await
}

async fn remove_workspace_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ErrorResponse> {
    remove(&state, &ctx, MemberScope::Workspace(id), user_id).await
}

async fn list_project_members(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<MemberQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<Member>>, ErrorResponse> {
    list(&state, &ctx, MemberScope::Project(id), query, params).await
}

async fn add_project_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddMember>,
) -> Result<impl IntoResponse, ErrorResponse> {
    add(&state, &ctx, MemberScope::Project(id), payload).await
}

async fn update_project_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateMemberRole>,
) -> Result<Json<Member>, ErrorResponse> {
    update(&state, &ctx, MemberScope::Project(id), user_id, payload).await
}

async fn remove_project_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ErrorResponse> {
    remove(&state, &ctx, MemberScope::Project(id), user_id).await
}
