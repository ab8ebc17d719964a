use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use clusterview_core::QueryError;

pub fn query_error_code(err: &QueryError) -> &'static str {
    match err {
        QueryError::InvalidQuery(_) => "invalid_query",
        QueryError::NotFound(_) => "not_found",
        QueryError::Transport(_) => "upstream_error",
    }
}

/// JSON body used both for error responses and SSE `error` frames.
pub fn query_error_body(err: &QueryError) -> serde_json::Value {
    json!({
        "error": query_error_code(err),
        "message": err.to_string(),
    })
}

pub fn query_error_to_response(err: QueryError) -> axum::response::Response {
    let status = match err {
        QueryError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
        QueryError::NotFound(_) => StatusCode::NOT_FOUND,
        QueryError::Transport(_) => StatusCode::BAD_GATEWAY,
    };
    json_error(status, query_error_code(&err), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
