use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use db::models::user::User;
use services::services::{access::Actor, error::ServiceError};
use tracing::warn;

use crate::{AppState, error::ErrorResponse};

/// The authenticated caller, inserted into request extensions by
/// [`require_session`].
#[derive(Clone)]
pub struct RequestContext {
    pub user: User,
    pub actor: Actor,
}

pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let bearer = match req.headers().typed_get::<Authorization<Bearer>>() {
        Some(Authorization(token)) => token.token().to_owned(),
        None => return ErrorResponse::unauthorized().into_response(),
    };

    let user = match state.auth.authenticate(state.pool(), &bearer).await {
        Ok(user) => user,
        Err(ServiceError::Unauthorized(reason)) => {
            warn!(%reason, "rejected access token");
            return ErrorResponse::unauthorized().into_response();
        }
        Err(error) => return ErrorResponse::from(error).into_response(),
    };

    let actor = Actor::from(&user);
    req.extensions_mut().insert(RequestContext { user, actor });

    next.run(req).await
}
