//! Package version lookup against the Cosmos package service.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use clusterview_core::FetchError;
use clusterview_updates::VersionsClient;

const LIST_VERSIONS_PATH: &str = "/package/list-versions";

/// Versioned vendor media type, e.g.
/// `application/vnd.dcos.package.list-versions-request+json;charset=utf-8;version=v1`.
pub fn media_type(entity: &str, action: &str, action_type: &str, version: &str) -> String {
    format!("application/vnd.dcos.{entity}.{action}-{action_type}+json;charset=utf-8;version={version}")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListVersionsRequest<'a> {
    include_package_versions: bool,
    package_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ListVersionsResponse {
    /// Version → release map, newest first.
    results: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct CosmosVersionsClient {
    http: reqwest::Client,
    base_url: String,
    package_name: String,
}

impl CosmosVersionsClient {
    pub fn new(base_url: impl Into<String>, package_name: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, package_name)
    }

    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        package_name: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            package_name: package_name.into(),
        }
    }

    pub fn url(&self) -> String {
        format!("{}{LIST_VERSIONS_PATH}", self.base_url)
    }
}

/// The first listed version is the latest one.
fn latest_version(body: &[u8]) -> Result<String, FetchError> {
    let response: ListVersionsResponse =
        serde_json::from_slice(body).map_err(|e| FetchError::decode(e.to_string()))?;
    response
        .results
        .keys()
        .next()
        .cloned()
        .ok_or_else(|| FetchError::decode("package lists no versions"))
}

#[async_trait::async_trait]
impl VersionsClient for CosmosVersionsClient {
    #[instrument(skip_all)]
    async fn fetch_latest_version(&self) -> Result<String, FetchError> {
        let body = serde_json::to_vec(&ListVersionsRequest {
            include_package_versions: true,
            package_name: &self.package_name,
        })
        .map_err(|e| FetchError::decode(e.to_string()))?;

        let resp = self
            .http
            .post(self.url())
            .header(CONTENT_TYPE, media_type("package", "list-versions", "request", "v1"))
            .header(ACCEPT, media_type("package", "list-versions", "response", "v1"))
            .body(body)
            .send()
            .await
            .map_err(|e| FetchError::transport(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::not_found(self.package_name.clone()));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(FetchError::status(status.as_u16(), text));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchError::transport(e.to_string()))?;
        let version = latest_version(&bytes)?;
        debug!(package = %self.package_name, %version, "latest published version");
        Ok(version)
    }
}
