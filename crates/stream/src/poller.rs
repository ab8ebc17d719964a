//! Timer-driven fetch loops.
//!
//! One background task per subscription owns the interval timer and a single
//! in-flight slot. The first fetch starts immediately; after that every tick
//! either starts a fetch or is folded into the one already running:
//!
//! - [`PollPolicy::Exhaust`]: a tick that arrives while a fetch is outstanding is
//!   dropped. At most one fetch per subscription is ever in flight.
//! - [`PollPolicy::Switch`]: a tick that arrives while a fetch is outstanding
//!   discards the outstanding fetch and starts a new one with the current key.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::subscription::{Subscription, SubscriptionId};

const DEFAULT_CAPACITY: usize = 16;

/// How overlapping ticks are folded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PollPolicy {
    /// Keep the outstanding fetch, drop the tick.
    Exhaust,
    /// Drop the outstanding fetch, start a new one.
    Switch,
}

/// What one fetch cycle produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// Deliver to the subscriber and keep polling.
    Emit(T),
    /// Nothing observable this cycle.
    Skip,
    /// Deliver to the subscriber, then end the stream.
    Terminate(T),
    /// End the stream without delivering anything.
    Stop,
}

/// Poll loop configuration.
#[derive(Debug, Copy, Clone)]
pub struct Poller {
    interval: Duration,
    policy: PollPolicy,
    capacity: usize,
}

impl Poller {
    pub fn new(interval: Duration, policy: PollPolicy) -> Self {
        Self {
            interval,
            policy,
            capacity: DEFAULT_CAPACITY,
        }
    }

    pub fn exhaust(interval: Duration) -> Self {
        Self::new(interval, PollPolicy::Exhaust)
    }

    pub fn switch(interval: Duration) -> Self {
        Self::new(interval, PollPolicy::Switch)
    }

    /// Number of undelivered results buffered before the loop waits on the consumer.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Spawn a poll loop around a zero-argument fetch.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T, F, Fut>(&self, mut fetch: F) -> Subscription<T>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = PollOutcome<T>> + Send + 'static,
    {
        // The sender is dropped right away, so the key never changes.
        let (_, keys) = watch::channel(());
        self.spawn_inner(self.policy, keys, move |()| fetch())
    }

    /// Spawn a poll loop whose fetch is parameterized by a key that may change.
    ///
    /// Always uses switch semantics: a key change starts a fetch immediately and
    /// whatever was in flight for the previous key is discarded.
    pub fn spawn_keyed<K, T, F, Fut>(&self, keys: watch::Receiver<K>, fetch: F) -> Subscription<T>
    where
        K: Clone + Send + Sync + 'static,
        T: Send + 'static,
        F: FnMut(K) -> Fut + Send + 'static,
        Fut: Future<Output = PollOutcome<T>> + Send + 'static,
    {
        self.spawn_inner(PollPolicy::Switch, keys, fetch)
    }

    fn spawn_inner<K, T, F, Fut>(
        &self,
        policy: PollPolicy,
        keys: watch::Receiver<K>,
        fetch: F,
    ) -> Subscription<T>
    where
        K: Clone + Send + Sync + 'static,
        T: Send + 'static,
        F: FnMut(K) -> Fut + Send + 'static,
        Fut: Future<Output = PollOutcome<T>> + Send + 'static,
    {
        let id = SubscriptionId::new();
        let (tx, rx) = mpsc::channel(self.capacity);
        let task = tokio::spawn(poll_loop(id, self.interval, policy, keys, tx, fetch));
        Subscription::new(id, rx, task)
    }
}

async fn poll_loop<K, T, F, Fut>(
    id: SubscriptionId,
    interval: Duration,
    policy: PollPolicy,
    mut keys: watch::Receiver<K>,
    tx: mpsc::Sender<T>,
    mut fetch: F,
) where
    K: Clone + Send + Sync + 'static,
    T: Send + 'static,
    F: FnMut(K) -> Fut + Send + 'static,
    Fut: Future<Output = PollOutcome<T>> + Send + 'static,
{
    debug!(subscription = %id, ?policy, ?interval, "poll loop started");

    let mut ticks = tokio::time::interval(interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut in_flight: Option<Pin<Box<Fut>>> = None;
    let mut keys_open = true;

    loop {
        tokio::select! {
            biased;

            _ = tx.closed() => {
                debug!(subscription = %id, "subscriber gone");
                break;
            }

            outcome = next_outcome(&mut in_flight) => {
                in_flight = None;
                match outcome {
                    PollOutcome::Emit(item) => {
                        if tx.send(item).await.is_err() {
                            break;
                        }
                    }
                    PollOutcome::Skip => {}
                    PollOutcome::Terminate(item) => {
                        let _ = tx.send(item).await;
                        break;
                    }
                    PollOutcome::Stop => break,
                }
            }

            changed = keys.changed(), if keys_open => {
                match changed {
                    Ok(()) => {
                        let key = keys.borrow_and_update().clone();
                        if in_flight.is_some() {
                            debug!(subscription = %id, "key changed; superseding in-flight fetch");
                        }
                        in_flight = Some(Box::pin(fetch(key)));
                    }
                    Err(_) => keys_open = false,
                }
            }

            _ = ticks.tick() => {
                match (policy, in_flight.is_some()) {
                    (PollPolicy::Exhaust, true) => {
                        trace!(subscription = %id, "fetch outstanding; dropping tick");
                    }
                    (PollPolicy::Switch, true) => {
                        trace!(subscription = %id, "superseding in-flight fetch");
                        let key = keys.borrow_and_update().clone();
                        in_flight = Some(Box::pin(fetch(key)));
                    }
                    (_, false) => {
                        let key = keys.borrow_and_update().clone();
                        in_flight = Some(Box::pin(fetch(key)));
                    }
                }
            }
        }
    }

    debug!(subscription = %id, "poll loop stopped");
}

/// Resolves with the in-flight fetch's outcome; never resolves when the slot is empty.
async fn next_outcome<Fut>(slot: &mut Option<Pin<Box<Fut>>>) -> Fut::Output
where
    Fut: Future,
{
    match slot {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}
