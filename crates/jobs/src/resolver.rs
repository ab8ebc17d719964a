//! Query resolution over polled upstream data.
//!
//! Each call returns an independent [`Subscription`] with its own poll loop.
//! Collection queries use exhaust polling, entity queries use keyed switch
//! polling. Dropping the subscription stops the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use clusterview_core::{FetchError, JobId, QueryError};
use clusterview_stream::{PollOutcome, Poller, RetryPolicy, Subscription, retry};

use crate::engine;
use crate::model::{Job, JobDetail};
use crate::query::{JobConnection, JobQuery, JobsQuery};
use crate::upstream::{JobDetailResponse, JobResponse, JobsClient};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry: RetryPolicy::default(),
        }
    }
}

pub type CollectionSubscription = Subscription<Result<JobConnection, QueryError>>;
pub type EntitySubscription<T> = Subscription<Result<Option<T>, QueryError>>;

#[derive(Clone)]
pub struct JobResolver {
    client: Arc<dyn JobsClient>,
    config: ResolverConfig,
}

impl JobResolver {
    pub fn new(client: Arc<dyn JobsClient>, config: ResolverConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Continuous stream of filtered, projected and sorted job lists.
    ///
    /// A fetch that still fails after the retry budget is emitted once as
    /// `Err` and ends this subscription only.
    pub fn resolve_collection(&self, query: JobsQuery) -> CollectionSubscription {
        let client = Arc::clone(&self.client);
        let policy = self.config.retry;
        let query = Arc::new(query);

        debug!(?query, "resolving job collection");

        Poller::exhaust(self.config.poll_interval).spawn(move || {
            let client = Arc::clone(&client);
            let query = Arc::clone(&query);
            async move {
                match retry(&policy, || client.fetch_jobs(), FetchError::is_retryable).await {
                    Ok(raw) => PollOutcome::Emit(Ok(engine::apply(&query, &raw))),
                    Err(err) => {
                        warn!(error = %err, "job list poll failed; ending subscription");
                        PollOutcome::Terminate(Err(err.into()))
                    }
                }
            }
        })
    }

    /// Continuous stream of one job. `Ok(None)` while the job does not exist.
    ///
    /// Fails synchronously with `InvalidQuery` when the id is missing; no
    /// fetch is made in that case.
    pub fn resolve_entity(&self, query: JobQuery) -> Result<EntitySubscription<Job>, QueryError> {
        let id = query.job_id()?;
        Ok(self.watch_with(fixed_key(id), engine::project))
    }

    /// Like [`resolve_entity`](Self::resolve_entity), with run history and the
    /// raw upstream document.
    pub fn resolve_entity_detail(
        &self,
        query: JobQuery,
    ) -> Result<EntitySubscription<JobDetail>, QueryError> {
        let id = query.job_id()?;
        Ok(self.watch_with(fixed_key(id), engine::project_detail))
    }

    /// Entity stream whose id may change over time. A change fetches at once
    /// and results for the previous id are discarded.
    pub fn watch_entity(&self, ids: watch::Receiver<JobId>) -> EntitySubscription<Job> {
        self.watch_with(ids, engine::project)
    }

    fn watch_with<T>(
        &self,
        ids: watch::Receiver<JobId>,
        project: fn(&JobResponse) -> T,
    ) -> EntitySubscription<T>
    where
        T: Send + 'static,
    {
        let client = Arc::clone(&self.client);
        let policy = self.config.retry;

        Poller::switch(self.config.poll_interval).spawn_keyed(ids, move |id: JobId| {
            let client = Arc::clone(&client);
            async move {
                match fetch_detail(client.as_ref(), &policy, &id).await {
                    Ok(raw) => PollOutcome::Emit(Ok(Some(project(&raw)))),
                    Err(FetchError::NotFound(_)) => {
                        debug!(job_id = %id, "job not found");
                        PollOutcome::Emit(Ok(None))
                    }
                    Err(err) => {
                        warn!(job_id = %id, error = %err, "job poll failed; ending subscription");
                        PollOutcome::Terminate(Err(err.into()))
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for JobResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn fixed_key(id: JobId) -> watch::Receiver<JobId> {
    let (_, ids) = watch::channel(id);
    ids
}

async fn fetch_detail(
    client: &dyn JobsClient,
    policy: &RetryPolicy,
    id: &JobId,
) -> Result<JobDetailResponse, FetchError> {
    retry(policy, || client.fetch_job_detail(id), FetchError::is_retryable).await
}
