use axum::{
    Json, Router,
    extract::{Extension, State},
    routing::get,
};
use db::models::user::{UpdateUser, User};

use crate::{AppState, error::ErrorResponse, middleware::RequestContext};

pub fn router() -> Router<AppState> {
    Router::new().route("/users/me", get(me).patch(update_me))
}

async fn me(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<User>, ErrorResponse> {
    Ok(Json(services::services::users::me(state.pool(), &ctx.actor).await?))
}

async fn update_me(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<UpdateUser>,
) -> Result<Json<User>, ErrorResponse> {
    let user = services::services::users::update_me(state.pool(), &ctx.actor, payload).await?;
    Ok(Json(user))
}
