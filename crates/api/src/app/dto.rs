use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct DismissRequest {
    pub version: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    /// The newer version, or `null` when there is nothing to report.
    pub version: Option<String>,
}

/// Malformed query strings get the same body as other invalid queries.
pub fn query_rejection(rejection: QueryRejection) -> axum::response::Response {
    errors::json_error(
        StatusCode::BAD_REQUEST,
        "invalid_query",
        rejection.body_text(),
    )
}
