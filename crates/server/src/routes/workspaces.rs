use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use db::models::workspace::Workspace;
use services::services::workspaces::{self, CreateWorkspace, UpdateWorkspace};
use tracing::instrument;
use uuid::Uuid;

use super::{ArchiveRequest, ArchivedQuery};
use crate::{AppState, error::ErrorResponse, middleware::RequestContext};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/organizations/{id}/workspaces",
            get(list_workspaces).post(create_workspace),
        )
        .route(
            "/organizations/{id}/workspaces/slug/{slug}",
            get(get_workspace_by_slug),
        )
        .route(
            "/workspaces/{id}",
            get(get_workspace)
                .patch(update_workspace)
                .delete(delete_workspace),
        )
        .route("/workspaces/{id}/archive", post(archive_workspace))
}

#[instrument(
    name = "workspaces.create",
    skip(state, ctx, payload),
    fields(user_id = %ctx.user.id, org_id = %organization_id)
)]
async fn create_workspace(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(organization_id): Path<Uuid>,
    Json(payload): Json<CreateWorkspace>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let workspace = workspaces::create(state.pool(), &ctx.actor, organization_id, payload).await?;
    Ok((StatusCode::CREATED, Json(workspace)))
}

async fn list_workspaces(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(organization_id): Path<Uuid>,
    Query(query): Query<ArchivedQuery>,
) -> Result<Json<Vec<Workspace>>, ErrorResponse> {
    let workspaces =
        workspaces::list(state.pool(), &ctx.actor, organization_id, query.archived).await?;
    Ok(Json(workspaces))
}

async fn get_workspace_by_slug(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((organization_id, slug)): Path<(Uuid, String)>,
) -> Result<Json<Workspace>, ErrorResponse> {
    Ok(Json(
        workspaces::get_by_slug(state.pool(), &ctx.actor, organization_id, &slug).await?,
    ))
}

async fn get_workspace(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Workspace>, ErrorResponse> {
    Ok(Json(workspaces::get(state.pool(), &ctx.actor, id).await?))
}

async fn update_workspace(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWorkspace>,
) -> Result<Json<Workspace>, ErrorResponse> {
    Ok(Json(
        workspaces::update(state.pool(), &ctx.actor, id, payload).await?,
    ))
}

async fn archive_workspace(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ArchiveRequest>,
) -> Result<Json<Workspace>, ErrorResponse> {
    Ok(Json(
        workspaces::archive(state.pool(), &ctx.actor, id, payload.archived).await?,
    ))
}

async fn delete_workspace(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ErrorResponse> {
    workspaces::delete(state.pool(), &ctx.actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
