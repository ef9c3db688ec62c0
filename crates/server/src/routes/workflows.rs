use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use db::models::workflow::{TaskStatus, WorkflowWithStatuses};
use services::services::workflows::{self, CreateTaskStatus, UpdateTaskStatus};
use uuid::Uuid;

use crate::{AppState, error::ErrorResponse, middleware::RequestContext};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/organizations/{id}/workflow", get(get_workflow))
        .route("/organizations/{id}/workflow/statuses", post(create_status))
        .route(
            "/task-statuses/{id}",
            patch(update_status).delete(delete_status),
        )
        .route("/projects/{id}/statuses", get(list_project_statuses))
}

async fn get_workflow(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowWithStatuses>, ErrorResponse> {
    Ok(Json(
        workflows::get_for_organization(state.pool(), &ctx.actor, id).await?,
    ))
}

async fn list_project_statuses(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TaskStatus>>, ErrorResponse> {
    Ok(Json(
        workflows::list_project_statuses(state.pool(), &ctx.actor, id).await?,
    ))
}

async fn create_status(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateTaskStatus>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let status = workflows::create_status(state.pool(), &ctx.actor, id, payload).await?;
    Ok((StatusCode::CREATED, Json(status)))
}

async fn update_status(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTaskStatus>,
) -> Result<Json<TaskStatus>, ErrorResponse> {
    Ok(Json(
        workflows::update_status(state.pool(), &ctx.actor, id, payload).await?,
    ))
}

async fn delete_status(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ErrorResponse> {
    workflows::delete_status(state.pool(), &ctx.actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
