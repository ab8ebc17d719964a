//! HTTP client for the Metronome jobs API.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use clusterview_core::{FetchError, JobId};
use clusterview_jobs::{JobDetailResponse, JobResponse, JobsClient};

const JOBS_PATH: &str = "/service/metronome/v1/jobs";
const EMBED: [(&str, &str); 3] = [
    ("embed", "activeRuns"),
    ("embed", "schedules"),
    ("embed", "history"),
];

/// Metronome addresses jobs as `a.b`; everything above this client uses `/a/b`.
pub fn to_metronome_id(id: &JobId) -> String {
    id.path().join(".")
}

pub fn from_metronome_id(raw: &str) -> String {
    if raw.starts_with('/') {
        return raw.to_string();
    }
    format!("/{}", raw.replace('.', "/"))
}

#[derive(Debug, Clone)]
pub struct MetronomeClient {
    http: reqwest::Client,
    base_url: String,
}

impl MetronomeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn jobs_url(&self) -> String {
        format!("{}{JOBS_PATH}", self.base_url)
    }

    pub fn job_url(&self, id: &JobId) -> String {
        format!("{}{JOBS_PATH}/{}", self.base_url, to_metronome_id(id))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T, FetchError> {
        let resp = self
            .http
            .get(url)
            .query(&EMBED)
            .send()
            .await
            .map_err(|e| FetchError::transport(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::not_found(what));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::status(status.as_u16(), body));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchError::transport(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::decode(e.to_string()))
    }
}

fn normalize(mut job: JobResponse) -> Result<JobResponse, FetchError> {
    job.id = JobId::new(from_metronome_id(job.id.as_str()))
        .map_err(|e| FetchError::decode(e.to_string()))?;
    Ok(job)
}

#[async_trait::async_trait]
impl JobsClient for MetronomeClient {
    #[instrument(skip_all)]
    async fn fetch_jobs(&self) -> Result<Vec<JobResponse>, FetchError> {
        let jobs: Vec<JobResponse> = self.get_json(&self.jobs_url(), "jobs").await?;
        debug!(count = jobs.len(), "fetched jobs");
        jobs.into_iter().map(normalize).collect()
    }

    #[instrument(skip_all, fields(job_id = %id))]
    async fn fetch_job_detail(&self, id: &JobId) -> Result<JobDetailResponse, FetchError> {
        let document: serde_json::Value = self.get_json(&self.job_url(id), id.as_str()).await?;
        let job = JobDetailResponse::from_document(document)
            .map_err(|e| FetchError::decode(e.to_string()))?;
        normalize(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_ids_both_ways() {
        let id = JobId::new("/ops/nightly/backup").unwrap();
        assert_eq!(to_metronome_id(&id), "ops.nightly.backup");
        assert_eq!(from_metronome_id("ops.nightly.backup"), "/ops/nightly/backup");
        assert_eq!(from_metronome_id("/already/slashed"), "/already/slashed");
    }

    #[test]
    fn builds_urls() {
        let client = MetronomeClient::new("http://master.mesos/");
        assert_eq!(
            client.jobs_url(),
            "http://master.mesos/service/metronome/v1/jobs"
        );
        assert_eq!(
            client.job_url(&JobId::new("/a/b").unwrap()),
            "http://master.mesos/service/metronome/v1/jobs/a.b"
        );
    }
}
