//! Upstream clients against a fake cluster served on an ephemeral port.

use axum::extract::{Path, RawQuery};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use clusterview_core::{FetchError, JobId};
use clusterview_infra::{CosmosVersionsClient, MetronomeClient};
use clusterview_jobs::JobsClient;
use clusterview_updates::VersionsClient;

struct FakeCluster {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeCluster {
    async fn spawn(app: Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            handle,
        }
    }
}

impl Drop for FakeCluster {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn list_jobs(RawQuery(query): RawQuery) -> impl IntoResponse {
    let query = query.unwrap_or_default();
    if !(query.contains("embed=activeRuns")
        && query.contains("embed=schedules")
        && query.contains("embed=history"))
    {
        return (StatusCode::BAD_REQUEST, Json(json!({ "message": query })));
    }

    (
        StatusCode::OK,
        Json(json!([
            { "id": "ops.backup", "history": { "successCount": 2 } },
            { "id": "report", "schedules": [{ "id": "s", "cron": "@daily" }] }
        ])),
    )
}

async fn job_detail(Path(id): Path<String>) -> impl IntoResponse {
    if id == "ops.backup" {
        (
            StatusCode::OK,
            Json(json!({ "id": "ops.backup", "disabledAt": "2020-01-01T00:00:00Z" })),
        )
    } else {
        (StatusCode::NOT_FOUND, Json(json!({ "message": "no such job" })))
    }
}

async fn list_versions(headers: HeaderMap, body: String) -> impl IntoResponse {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let body: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();

    if content_type
        != "application/vnd.dcos.package.list-versions-request+json;charset=utf-8;version=v1"
        || body["packageName"] != "dcos-ui"
        || body["includePackageVersions"] != true
    {
        return (StatusCode::BAD_REQUEST, Json(json!({})));
    }

    (
        StatusCode::OK,
        Json(json!({ "results": { "2.25.0": "7", "2.24.2": "6" } })),
    )
}

fn cluster() -> Router {
    Router::new()
        .route("/service/metronome/v1/jobs", get(list_jobs))
        .route("/service/metronome/v1/jobs/:id", get(job_detail))
        .route("/package/list-versions", post(list_versions))
}

#[tokio::test]
async fn lists_jobs_with_slash_ids() {
    let server = FakeCluster::spawn(cluster()).await;
    let client = MetronomeClient::new(&server.base_url);

    let jobs = client.fetch_jobs().await.unwrap();
    let ids: Vec<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec!["/ops/backup", "/report"]);
}

#[tokio::test]
async fn detail_maps_ids_and_not_found() {
    let server = FakeCluster::spawn(cluster()).await;
    let client = MetronomeClient::new(&server.base_url);

    let job = client
        .fetch_job_detail(&JobId::new("/ops/backup").unwrap())
        .await
        .unwrap();
    assert_eq!(job.id.as_str(), "/ops/backup");
    // The upstream document is kept as served, unknown fields included.
    assert_eq!(
        job.document,
        Some(json!({ "id": "ops.backup", "disabledAt": "2020-01-01T00:00:00Z" }))
    );

    let missing = client
        .fetch_job_detail(&JobId::new("/ops/missing").unwrap())
        .await;
    assert!(matches!(missing, Err(FetchError::NotFound(_))));
}

#[tokio::test]
async fn server_errors_are_retryable_statuses() {
    let broken = Router::new().fallback(|| async { StatusCode::SERVICE_UNAVAILABLE });
    let server = FakeCluster::spawn(broken).await;

    let err = MetronomeClient::new(&server.base_url)
        .fetch_jobs()
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 503, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn unreachable_upstream_is_a_transport_error() {
    let client = MetronomeClient::new("http://127.0.0.1:9");
    assert!(matches!(
        client.fetch_jobs().await,
        Err(FetchError::Transport(_))
    ));
}

#[tokio::test]
async fn fetches_latest_package_version() {
    let server = FakeCluster::spawn(cluster()).await;
    let client = CosmosVersionsClient::new(&server.base_url, "dcos-ui");

    assert_eq!(client.fetch_latest_version().await.unwrap(), "2.25.0");
}

#[tokio::test]
async fn undecodable_versions_are_decode_errors() {
    let garbage = Router::new().route("/package/list-versions", post(|| async { "<html>" }));
    let server = FakeCluster::spawn(garbage).await;

    let err = CosmosVersionsClient::new(&server.base_url, "dcos-ui")
        .fetch_latest_version()
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Decode(_)));
    assert!(!err.is_retryable());
}
