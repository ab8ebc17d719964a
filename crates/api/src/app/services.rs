use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use serde::Serialize;
use tokio_stream::StreamExt;

use clusterview_core::{QueryError, SystemClock};
use clusterview_infra::{AppConfig, CosmosVersionsClient, FileSettingsStore, MetronomeClient};
use clusterview_jobs::JobResolver;
use clusterview_stream::Subscription;
use clusterview_updates::{UpdateStream, VersionTracker};

use crate::app::errors;

/// Long-lived services shared by every request.
#[derive(Debug, Clone)]
pub struct AppServices {
    resolver: JobResolver,
    updates: UpdateStream,
}

impl AppServices {
    pub fn new(resolver: JobResolver, updates: UpdateStream) -> Self {
        Self { resolver, updates }
    }

    /// Wire the production clients and the settings file from `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        let jobs = Arc::new(MetronomeClient::new(&config.upstream_url));
        let versions = Arc::new(CosmosVersionsClient::new(
            &config.upstream_url,
            &config.package_name,
        ));
        let settings = Arc::new(FileSettingsStore::new(&config.settings_path));
        let tracker = Arc::new(VersionTracker::load(settings));

        Self {
            resolver: JobResolver::new(jobs, config.resolver_config()),
            updates: UpdateStream::new(
                versions,
                tracker,
                Arc::new(SystemClock),
                config.update_config(),
            ),
        }
    }

    pub fn resolver(&self) -> &JobResolver {
        &self.resolver
    }

    pub fn updates(&self) -> &UpdateStream {
        &self.updates
    }

    pub fn tracker(&self) -> &Arc<VersionTracker> {
        self.updates.tracker()
    }
}

/// Forward a subscription as SSE: each `Ok` becomes an `event` frame, an
/// `Err` becomes an `error` frame.
///
/// The subscription is dropped with the response body, which stops its poll
/// loop when the client disconnects.
pub fn subscription_sse<T>(
    subscription: Subscription<Result<T, QueryError>>,
    event: &'static str,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>>
where
    T: Serialize + Send + 'static,
{
    let stream = subscription.map(move |item| {
        let frame = match item {
            Ok(value) => SseEvent::default().event(event).json_data(&value),
            Err(err) => SseEvent::default()
                .event("error")
                .json_data(errors::query_error_body(&err)),
        };
        Ok(frame.unwrap_or_else(|e| SseEvent::default().event("error").data(e.to_string())))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
