//! Job queries as SSE streams.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Extension, Query};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tracing::debug;

use clusterview_jobs::{JobQuery, JobsQuery};

use crate::app::dto;
use crate::app::errors;
use crate::app::services::{AppServices, subscription_sse};

pub fn router() -> Router {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/job", get(get_job))
        .route("/job/detail", get(get_job_detail))
}

/// GET /jobs?namespace=&filter=&sortBy=&sortDirection=
///
/// One `jobs` event per poll. An `error` event ends the stream.
pub async fn list_jobs(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<JobsQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return dto::query_rejection(rejection),
    };
    debug!(?query, "jobs stream opened");

    let subscription = services.resolver().resolve_collection(query);
    subscription_sse(subscription, "jobs").into_response()
}

/// GET /job?id=
///
/// One `job` event per poll; the payload is `null` while the job does not exist.
pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<JobQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return dto::query_rejection(rejection),
    };

    match services.resolver().resolve_entity(query) {
        Ok(subscription) => subscription_sse(subscription, "job").into_response(),
        Err(err) => errors::query_error_to_response(err),
    }
}

/// GET /job/detail?id=
///
/// Like `/job`, with run history and the raw upstream document.
pub async fn get_job_detail(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<JobQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return dto::query_rejection(rejection),
    };

    match services.resolver().resolve_entity_detail(query) {
        Ok(subscription) => subscription_sse(subscription, "job").into_response(),
        Err(err) => errors::query_error_to_response(err),
    }
}
