use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    routing::get,
};
use services::services::charts::{self, ChartQuery, ChartSet};
use uuid::Uuid;

use crate::{AppState, error::ErrorResponse, middleware::RequestContext};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/organizations/{id}/charts", get(organization_charts))
        .route("/workspaces/{id}/charts", get(workspace_charts))
        .route("/projects/{id}/charts", get(project_charts))
}

async fn organization_charts(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<ChartSet>, ErrorResponse> {
    Ok(Json(
        charts::for_organization(state.pool(), &ctx.actor, id, &query).await?,
    ))
}

async fn workspace_charts(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<ChartSet>, ErrorResponse> {
    Ok(Json(
        charts::for_workspace(state.pool(), &ctx.actor, id, &query).await?,
    ))
}

async fn project_charts(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<ChartSet>, ErrorResponse> {
    Ok(Json(
        charts::for_project(state.pool(), &ctx.actor, id, &query).await?,
    ))
}
