//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: long-lived resolver / update stream and the SSE adapter
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .route("/schema", get(routes::system::schema))
        .merge(routes::router())
        .layer(Extension(services))
}
