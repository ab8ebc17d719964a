//! Metronome wire types and the fetcher contract.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clusterview_core::{Entity, FetchError, JobId};

/// A job as listed by the upstream API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub id: JobId,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Run specification (command, resources, ...). Passed through untouched.
    #[serde(default)]
    pub run: serde_json::Value,
    #[serde(default)]
    pub schedules: Vec<ScheduleResponse>,
    #[serde(default)]
    pub active_runs: Vec<ActiveRunResponse>,
    #[serde(default)]
    pub history: Option<HistoryResponse>,
    /// The upstream document this record was decoded from, when the client
    /// kept it. Never serialized.
    #[serde(skip)]
    pub document: Option<serde_json::Value>,
}

impl JobResponse {
    /// Decode `document` and keep it verbatim alongside the typed fields.
    pub fn from_document(document: serde_json::Value) -> Result<Self, serde_json::Error> {
        let mut job: JobResponse = serde_json::from_value(document.clone())?;
        job.document = Some(document);
        Ok(job)
    }
}

/// The detail endpoint returns the same document with the finished run lists
/// populated in `history`.
pub type JobDetailResponse = JobResponse;

impl Entity for JobResponse {
    type Id = JobId;

    fn id(&self) -> &JobId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub id: String,
    pub cron: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub concurrency_policy: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub next_run_at: Option<DateTime<Utc>>,
}

fn enabled_by_default() -> bool {
    true
}

/// Lifecycle state of a run that has not finished yet.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActiveRunState {
    Initial,
    Starting,
    Active,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRunResponse {
    pub id: String,
    pub status: ActiveRunState,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishedRunResponse {
    pub id: String,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub failure_count: u64,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub last_success_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub last_failure_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub successful_finished_runs: Vec<FinishedRunResponse>,
    #[serde(default)]
    pub failed_finished_runs: Vec<FinishedRunResponse>,
}

/// Upstream timestamps come both as RFC 3339 and with a colon-less offset
/// (`2017-10-02T15:33:08.921+0000`).
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, de::Error};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}"))),
        }
    }
}

/// Upstream fetcher for jobs.
///
/// Each call is one logical request with a single result. Retrying is the
/// caller's business.
#[async_trait::async_trait]
pub trait JobsClient: Send + Sync {
    /// List every job.
    async fn fetch_jobs(&self) -> Result<Vec<JobResponse>, FetchError>;

    /// Fetch one job with its run history.
    async fn fetch_job_detail(&self, id: &JobId) -> Result<JobDetailResponse, FetchError>;
}

/// In-memory jobs client for tests/dev.
///
/// - Serves whatever was last set with [`set_jobs`](Self::set_jobs)
/// - Optional artificial latency and scripted failures
/// - Counts requests
#[derive(Debug, Default)]
pub struct InMemoryJobsClient {
    jobs: RwLock<Vec<JobResponse>>,
    latency: RwLock<Option<Duration>>,
    failures: Mutex<Vec<FetchError>>,
    list_calls: AtomicUsize,
    detail_calls: AtomicUsize,
}

impl InMemoryJobsClient {
    pub fn new(jobs: Vec<JobResponse>) -> Self {
        Self {
            jobs: RwLock::new(jobs),
            ..Self::default()
        }
    }

    pub fn set_jobs(&self, jobs: Vec<JobResponse>) {
        if let Ok(mut guard) = self.jobs.write() {
            *guard = jobs;
        }
    }

    /// Every request waits this long before answering.
    pub fn set_latency(&self, latency: Duration) {
        if let Ok(mut guard) = self.latency.write() {
            *guard = Some(latency);
        }
    }

    /// Queue errors returned (in order) by the next requests.
    pub fn fail_next(&self, errors: impl IntoIterator<Item = FetchError>) {
        if let Ok(mut guard) = self.failures.lock() {
            guard.extend(errors);
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    async fn respond(&self) -> Result<Vec<JobResponse>, FetchError> {
        let latency = self.latency.read().ok().and_then(|l| *l);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let scripted = self
            .failures
            .lock()
            .ok()
            .and_then(|mut f| if f.is_empty() { None } else { Some(f.remove(0)) });
        if let Some(err) = scripted {
            return Err(err);
        }

        self.jobs
            .read()
            .map(|jobs| jobs.clone())
            .map_err(|_| FetchError::transport("in-memory jobs lock poisoned"))
    }
}

#[async_trait::async_trait]
impl JobsClient for InMemoryJobsClient {
    async fn fetch_jobs(&self) -> Result<Vec<JobResponse>, FetchError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.respond().await
    }

    async fn fetch_job_detail(&self, id: &JobId) -> Result<JobDetailResponse, FetchError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.respond()
            .await?
            .into_iter()
            .find(|job| &job.id == id)
            .ok_or_else(|| FetchError::not_found(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_metronome_job() {
        let raw = serde_json::json!({
            "id": "/a/job1",
            "description": "nightly backup",
            "run": { "cmd": "backup.sh", "cpus": 0.1 },
            "schedules": [
                { "id": "nightly", "cron": "0 2 * * *", "nextRunAt": "2017-10-03T02:00:00.000+0000" }
            ],
            "activeRuns": [
                { "id": "20171002153308", "status": "STARTING", "createdAt": "2017-10-02T15:33:08.921+0000" }
            ],
            "history": {
                "successCount": 3,
                "failureCount": 1,
                "lastSuccessAt": "2017-10-01T02:00:11.000+0000",
                "lastFailureAt": "2017-09-30T02:00:09Z"
            }
        });

        let job: JobResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(job.id.as_str(), "/a/job1");
        assert!(job.schedules[0].enabled);
        assert!(job.schedules[0].next_run_at.is_some());
        assert_eq!(job.active_runs[0].status, ActiveRunState::Starting);
        let history = job.history.unwrap();
        assert_eq!(history.success_count, 3);
        assert!(history.last_success_at > history.last_failure_at);
    }

    #[test]
    fn unknown_run_states_are_tolerated() {
        let raw = serde_json::json!({ "id": "r1", "status": "PAUSED" });
        let run: ActiveRunResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(run.status, ActiveRunState::Unknown);
    }

    #[test]
    fn rejects_garbage_timestamps() {
        let raw = serde_json::json!({ "id": "r1", "status": "ACTIVE", "createdAt": "yesterday" });
        assert!(serde_json::from_value::<ActiveRunResponse>(raw).is_err());
    }

    #[tokio::test]
    async fn in_memory_detail_reports_not_found() {
        let client = InMemoryJobsClient::default();
        let id = JobId::new("/missing").unwrap();

        assert!(matches!(
            client.fetch_job_detail(&id).await,
            Err(FetchError::NotFound(_))
        ));
        assert_eq!(client.detail_calls(), 1);
    }
}
