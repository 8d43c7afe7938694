use std::time::Duration;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{Json, Response};
use axum::routing::get;
use axum::{Extension, Router};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;
use uuid::Uuid;

use svckit::{Handlers as _, NewUser, ServiceHub, User, UserPatch};

use crate::error::ApiError;
use crate::request_id;

const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Assemble the gateway router over a bound hub.
///
/// Layers run last-added first: the id is stamped outermost, so it is
/// already on the request when the propagate layer captures it for the
/// reply and when the trace span opens.
pub fn router(hub: ServiceHub) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/users", get(list_users).post(create_user))
        .route(
            "/v1/users/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .layer(Extension(hub))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_id::make_span)
                .on_response(|response: &Response, latency: Duration, span: &Span| {
                    span.record("status", response.status().as_u16());
                    span.record("latency_ms", latency.as_millis() as u64);
                }),
        )
        .layer(PropagateRequestIdLayer::new(request_id::header()))
        .layer(SetRequestIdLayer::new(
            request_id::header(),
            request_id::MakeReqId,
        ))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn create_user(
    Extension(hub): Extension<ServiceHub>,
    Json(draft): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = hub.handlers().create_user(draft).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(
    Extension(hub): Extension<ServiceHub>,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = hub.handlers().list_users().await?;
    Ok(Json(users))
}

async fn get_user(
    Extension(hub): Extension<ServiceHub>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    let user = hub.handlers().get_user(id).await?;
    Ok(Json(user))
}

async fn update_user(
    Extension(hub): Extension<ServiceHub>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>, ApiError> {
    let user = hub.handlers().update_user(id, patch).await?;
    Ok(Json(user))
}

async fn delete_user(
    Extension(hub): Extension<ServiceHub>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    hub.handlers().delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
