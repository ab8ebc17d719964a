//! Consumer side of a poll loop.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use uuid::Uuid;

/// Identifier of a subscription (used for log correlation).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A live subscription to a stream of results.
///
/// Results arrive in the order their fetches completed. When the subscription is
/// dropped (or [`unsubscribe`](Self::unsubscribe) is called) the producing task is
/// aborted: its timer stops and an in-flight fetch is discarded without effects.
///
/// ```ignore
/// let mut sub = resolver.resolve_collection(query);
/// while let Some(result) = sub.next().await {
///     render(result?);
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<T> {
    id: SubscriptionId,
    receiver: mpsc::Receiver<T>,
    task: Option<JoinHandle<()>>,
}

impl<T> Subscription<T> {
    /// A subscription that owns the task feeding `receiver`.
    pub fn new(id: SubscriptionId, receiver: mpsc::Receiver<T>, task: JoinHandle<()>) -> Self {
        Self {
            id,
            receiver,
            task: Some(task),
        }
    }

    /// A subscription fed by a producer it does not own (e.g. a shared bus).
    pub fn detached(id: SubscriptionId, receiver: mpsc::Receiver<T>) -> Self {
        Self {
            id,
            receiver,
            task: None,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next result. `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Take a result if one is ready.
    pub fn try_next(&mut self) -> Result<T, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Stop the producer and discard anything not yet received.
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.receiver.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.receiver.poll_recv(cx)
    }
}
