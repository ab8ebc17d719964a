use axum::http::{StatusCode, header};
use axum::response::IntoResponse;

use clusterview_jobs::TYPE_DEFS;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// SDL of the job queries.
pub async fn schema() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], TYPE_DEFS)
}
