use axum::Router;

pub mod jobs;
pub mod system;
pub mod updates;

/// Router for the query endpoints.
pub fn router() -> Router {
    Router::new().merge(jobs::router()).merge(updates::router())
}
