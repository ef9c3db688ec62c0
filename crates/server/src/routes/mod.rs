use axum::{
    Router,
    http::{HeaderValue, Request, header::HeaderName},
    middleware,
};
use serde::Deserialize;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, field};

use crate::{AppState, config::CorsOrigins, middleware::require_session};

mod auth;
mod charts;
pub mod health;
mod inbox;
mod invitations;
mod members;
mod organizations;
mod projects;
mod sprints;
mod tasks;
mod users;
mod workflows;
mod workspaces;

/// Body of the `/archive` endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct ArchiveRequest {
    pub archived: bool,
}

/// `?archived=true` includes archived rows in listings.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ArchivedQuery {
    #[serde(default)]
    pub archived: bool,
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    match origins {
        CorsOrigins::Any => CorsLayer::permissive(),
        CorsOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(%origin, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(values))
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

pub fn router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            let request_id = request
                .extensions()
                .get::<RequestId>()
                .and_then(|id| id.header_value().to_str().ok());
            let span = tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = field::Empty
            );
            if let Some(request_id) = request_id {
                span.record("request_id", field::display(request_id));
            }
            span
        })
        .on_response(DefaultOnResponse::new().level(Level::INFO))
        .on_failure(DefaultOnFailure::new().level(Level::ERROR));

    let public = Router::<AppState>::new()
        .merge(health::router())
        .merge(auth::public_router())
        .merge(invitations::public_router());

    let protected = Router::<AppState>::new()
        .merge(auth::protected_router())
        .merge(users::router())
        .merge(organizations::router())
        .merge(members::router())
        .merge(workflows::router())
        .merge(workspaces::router())
        .merge(projects::router())
        .merge(sprints::router())
        .merge(tasks::router())
        .merge(invitations::protected_router())
        .merge(inbox::router())
        .merge(charts::router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    let cors = cors_layer(&state.config.cors_origins);

    Router::<AppState>::new()
        .nest("/api", public.merge(protected))
        .layer(cors)
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            "x-request-id",
        )))
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static("x-request-id"),
            MakeRequestUuid {},
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_origins_are_skipped() {
        // Builds without panicking even when an origin is not a valid header value.
        let _ = cors_layer(&CorsOrigins::List(vec![
            "https://app.test".to_string(),
            "bad\norigin".to_string(),
        ]));
    }
}
