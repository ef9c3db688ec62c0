use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use db::models::project::Project;
use services::services::projects::{self, CreateProject, ProjectQuery, UpdateProject};
use tracing::instrument;
use utils::api::pagination::{Paginated, PaginationParams};
use uuid::Uuid;

use super::ArchiveRequest;
use crate::{AppState, error::ErrorResponse, middleware::RequestContext};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/workspaces/{id}/projects",
            get(list_projects).post(create_project),
        )
        .route(
            "/workspaces/{id}/projects/slug/{slug}",
            get(get_project_by_slug),
        )
        .route(
            "/projects/{id}",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/projects/{id}/archive", post(archive_project))
}

#[instrument(
    name = "projects.create",
    skip(state, ctx, payload),
    fields(user_id = %ctx.user.id, workspace_id = %workspace_id)
)]
async fn create_project(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(workspace_id): Path<Uuid>,
    Json(payload): Json<CreateProject>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let project = projects::create(state.pool(), &ctx.actor, workspace_id, payload).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn list_projects(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(workspace_id): Path<Uuid>,
    Query(query): Query<ProjectQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<Project>>, ErrorResponse> {
    let page = projects::list(state.pool(), &ctx.actor, workspace_id, query, &params).await?;
    Ok(Json(page))
}

async fn get_project_by_slug(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((workspace_id, slug)): Path<(Uuid, String)>,
) -> Result<Json<Project>, ErrorResponse> {
    Ok(Json(
        projects::get_by_slug(state.pool(), &ctx.actor, workspace_id, &slug).await?,
    ))
}

async fn get_project(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, ErrorResponse> {
    Ok(Json(projects::get(state.pool(), &ctx.actor, id).await?))
}

async fn update_project(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProject>,
) -> Result<Json<Project>, ErrorResponse> {
    Ok(Json(
        projects::update(state.pool(), &ctx.actor, id, payload).await?,
    ))
}

async fn archive_project(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ArchiveRequest>,
) -> Result<Json<Project>, ErrorResponse> {
    Ok(Json(
        projects::archive(state.pool(), &ctx.actor, id, payload.archived).await?,
    ))
}

async fn delete_project(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ErrorResponse> {
    projects::delete(state.pool(), &ctx.actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
