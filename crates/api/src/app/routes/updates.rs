//! Version notifications and dismissal.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use crate::app::dto::{CheckResponse, DismissRequest};
use crate::app::errors;
use crate::app::services::{AppServices, subscription_sse};

pub fn router() -> Router {
    Router::new()
        .route("/updates", get(stream_updates))
        .route("/updates/state", get(state))
        .route("/updates/dismiss", post(dismiss))
        .route("/updates/check", post(check))
}

/// GET /updates
///
/// Shared stream: every open connection sees the same `update` events.
pub async fn stream_updates(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    subscription_sse(services.updates().subscribe(), "update").into_response()
}

/// GET /updates/state
pub async fn state(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(services.tracker().state())
}

/// POST /updates/dismiss {"version": "..."}
///
/// A settings file that cannot be written is logged; the dismissal still holds
/// for this process.
pub async fn dismiss(
    Extension(services): Extension<Arc<AppServices>>,
    Json(req): Json<DismissRequest>,
) -> axum::response::Response {
    let version = req.version.trim();
    if version.is_empty() {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_query",
            "version must not be empty",
        );
    }

    services.tracker().dismiss(version);
    info!(%version, "version dismissed");
    StatusCode::NO_CONTENT.into_response()
}

/// POST /updates/check
///
/// One comparison outside the timer; `{"version": null}` when nothing is due
/// or nothing newer exists.
pub async fn check(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.updates().check_once().await {
        Ok(version) => Json(CheckResponse { version }).into_response(),
        Err(err) => errors::query_error_to_response(err),
    }
}
