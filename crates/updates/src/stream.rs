//! Shared "newer version available" stream.
//!
//! One switch-poller serves every subscriber. It starts with the first
//! subscriber, stops when the last one leaves, and late joiners get the most
//! recent notification replayed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use clusterview_core::{Clock, FetchError, QueryError};
use clusterview_stream::{MulticastBus, PollOutcome, Poller, RetryPolicy, Subscription, retry};

use crate::state::VersionTracker;
use crate::version::is_newer;

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(2000);
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

pub type UpdateResult = Result<String, QueryError>;

/// Source of the latest published version.
#[async_trait::async_trait]
pub trait VersionsClient: Send + Sync {
    async fn fetch_latest_version(&self) -> Result<String, FetchError>;
}

/// Scripted versions client for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryVersionsClient {
    version: RwLock<String>,
    failures: Mutex<VecDeque<FetchError>>,
    calls: AtomicUsize,
}

impl InMemoryVersionsClient {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: RwLock::new(version.into()),
            ..Self::default()
        }
    }

    pub fn set_version(&self, version: impl Into<String>) {
        if let Ok(mut guard) = self.version.write() {
            *guard = version.into();
        }
    }

    pub fn fail_next(&self, errors: impl IntoIterator<Item = FetchError>) {
        if let Ok(mut guard) = self.failures.lock() {
            guard.extend(errors);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl VersionsClient for InMemoryVersionsClient {
    async fn fetch_latest_version(&self) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().ok().and_then(|mut f| f.pop_front()) {
            return Err(err);
        }
        self.version
            .read()
            .map(|v| v.clone())
            .map_err(|_| FetchError::transport("in-memory versions lock poisoned"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateConfig {
    /// Tick period of the shared poller.
    pub interval: Duration,
    /// Minimum time between two upstream checks.
    pub cooldown: Duration,
    pub retry: RetryPolicy,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_CHECK_INTERVAL,
            cooldown: DEFAULT_COOLDOWN,
            retry: RetryPolicy::default(),
        }
    }
}

struct Shared {
    client: Arc<dyn VersionsClient>,
    tracker: Arc<VersionTracker>,
    clock: Arc<dyn Clock>,
    config: UpdateConfig,
    bus: MulticastBus<UpdateResult>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

/// Emits a version string whenever upstream publishes one newer than the
/// dismissed version.
#[derive(Clone)]
pub struct UpdateStream {
    shared: Arc<Shared>,
}

impl UpdateStream {
    pub fn new(
        client: Arc<dyn VersionsClient>,
        tracker: Arc<VersionTracker>,
        clock: Arc<dyn Clock>,
        config: UpdateConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                tracker,
                clock,
                config,
                bus: MulticastBus::new(),
                driver: Mutex::new(None),
            }),
        }
    }

    pub fn tracker(&self) -> &Arc<VersionTracker> {
        &self.shared.tracker
    }

    /// Join the shared stream, starting the poller if nobody else is listening.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self) -> Subscription<UpdateResult> {
        let mut driver = self.shared.driver_slot();
        let subscription = self.shared.bus.subscribe();

        if driver.as_ref().is_none_or(JoinHandle::is_finished) {
            debug!("starting version-check cycle");
            *driver = Some(tokio::spawn(drive(Arc::clone(&self.shared))));
        }

        subscription
    }

    /// One comparison step outside the timer.
    ///
    /// `Ok(None)` when the cooldown has not passed or nothing newer exists.
    pub async fn check_once(&self) -> Result<Option<String>, QueryError> {
        self.shared.check_once().await
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.bus.subscriber_count()
    }
}

impl std::fmt::Debug for UpdateStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateStream")
            .field("config", &self.shared.config)
            .field("tracker", &self.shared.tracker)
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn driver_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.driver.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn check_once(&self) -> Result<Option<String>, QueryError> {
        let now = self.clock.now_millis();
        if !self.tracker.is_due(now, self.config.cooldown) {
            return Ok(None);
        }

        let client = self.client.as_ref();
        let fetched = retry(
            &self.config.retry,
            || client.fetch_latest_version(),
            FetchError::is_retryable,
        )
        .await?;

        self.tracker.record_check(self.clock.now_millis());

        let dismissed = self.tracker.dismissed_version();
        if is_newer(&fetched, &dismissed) {
            info!(version = %fetched, dismissed = %dismissed, "newer version available");
            Ok(Some(fetched))
        } else {
            debug!(version = %fetched, dismissed = %dismissed, "no newer version");
            Ok(None)
        }
    }

    async fn cycle(&self) -> PollOutcome<UpdateResult> {
        if self.bus.subscriber_count() == 0 {
            return PollOutcome::Stop;
        }
        match self.check_once().await {
            Ok(Some(version)) => PollOutcome::Emit(Ok(version)),
            Ok(None) => PollOutcome::Skip,
            Err(err) => PollOutcome::Terminate(Err(err)),
        }
    }
}

/// Run the shared poller until nobody listens or a check fails for good.
async fn drive(shared: Arc<Shared>) {
    loop {
        let poller = Poller::switch(shared.config.interval);
        let source = Arc::clone(&shared);
        let mut upstream = poller.spawn(move || {
            let source = Arc::clone(&source);
            async move { source.cycle().await }
        });

        let mut failed = false;
        while let Some(result) = upstream.next().await {
            match result {
                Ok(version) => {
                    if matches!(shared.bus.publish(Ok(version)), Ok(0)) {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "version check failed; stopping cycle");
                    let _ = shared.bus.broadcast(Err(err));
                    shared.bus.close();
                    failed = true;
                    break;
                }
            }
        }
        drop(upstream);

        // Subscribers left at this point joined while the cycle was winding down.
        let mut slot = shared.driver_slot();
        if shared.bus.subscriber_count() == 0 {
            debug!(failed, "version-check cycle stopped");
            *slot = None;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use clusterview_core::ManualClock;

    use super::*;
    use crate::state::InMemorySettingsStore;

    const NOW: i64 = 1_600_000_000_000;

    fn stream(client: Arc<InMemoryVersionsClient>, clock: Arc<ManualClock>) -> UpdateStream {
        let tracker = Arc::new(VersionTracker::load(Arc::new(InMemorySettingsStore::new())));
        UpdateStream::new(client, tracker, clock, UpdateConfig::default())
    }

    #[tokio::test]
    async fn check_once_records_time_and_compares() {
        let client = Arc::new(InMemoryVersionsClient::new("2.25.0"));
        let clock = Arc::new(ManualClock::new(NOW));
        let stream = stream(client.clone(), clock);

        assert_eq!(stream.check_once().await, Ok(Some("2.25.0".to_string())));
        assert_eq!(stream.tracker().state().last_time_check, NOW);

        // Inside the cooldown nothing is fetched.
        assert_eq!(stream.check_once().await, Ok(None));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn dismissed_version_is_not_reported() {
        let client = Arc::new(InMemoryVersionsClient::new("2.25.0"));
        let stream = stream(client, Arc::new(ManualClock::new(NOW)));
        stream.tracker().dismiss("2.25.0");

        assert_eq!(stream.check_once().await, Ok(None));
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let client = Arc::new(InMemoryVersionsClient::new("2.25.0"));
        client.fail_next([FetchError::not_found("package")]);
        let stream = stream(client.clone(), Arc::new(ManualClock::new(NOW)));

        assert!(matches!(stream.check_once().await, Err(QueryError::NotFound(_))));
        assert_eq!(client.calls(), 1);
        assert_eq!(stream.tracker().state().last_time_check, 0);
    }
}
