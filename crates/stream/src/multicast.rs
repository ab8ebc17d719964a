//! In-process multicast: one producer, many subscribers.
//!
//! The producer runs once per cycle no matter how many subscribers are listening;
//! each subscriber gets its own copy of every message published after it joined,
//! plus the most recent replayable message at the moment it joined.

use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::trace;

use crate::subscription::{Subscription, SubscriptionId};

const DEFAULT_CAPACITY: usize = 16;

#[derive(Debug)]
pub enum MulticastError {
    /// Publish failed due to internal lock poisoning.
    Poisoned,
}

#[derive(Debug)]
struct BusState<M> {
    subscribers: Vec<mpsc::Sender<M>>,
    latest: Option<M>,
}

/// Fan-out bus with replay of the latest message.
///
/// - Best-effort delivery: a subscriber whose buffer is full misses the message
/// - Dead subscribers are dropped while publishing
#[derive(Debug)]
pub struct MulticastBus<M> {
    state: Mutex<BusState<M>>,
    capacity: usize,
}

impl<M> MulticastBus<M> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(BusState {
                subscribers: Vec::new(),
                latest: None,
            }),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BusState<M>>, MulticastError> {
        self.state.lock().map_err(|_| MulticastError::Poisoned)
    }

    /// Number of subscribers still listening.
    pub fn subscriber_count(&self) -> usize {
        match self.lock() {
            Ok(mut state) => {
                state.subscribers.retain(|tx| !tx.is_closed());
                state.subscribers.len()
            }
            Err(_) => 0,
        }
    }

    /// Detach every subscriber; their streams end once drained.
    ///
    /// The replayable message is kept for whoever subscribes next.
    pub fn close(&self) -> usize {
        match self.lock() {
            Ok(mut state) => std::mem::take(&mut state.subscribers).len(),
            Err(_) => 0,
        }
    }
}

impl<M> Default for MulticastBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> MulticastBus<M>
where
    M: Clone + Send + 'static,
{
    /// Publish and remember `message` for late subscribers.
    ///
    /// Returns how many subscribers are still listening.
    pub fn publish(&self, message: M) -> Result<usize, MulticastError> {
        let mut state = self.lock()?;
        state.latest = Some(message.clone());
        Ok(fan_out(&mut state, message))
    }

    /// Publish without replacing the replayable message.
    pub fn broadcast(&self, message: M) -> Result<usize, MulticastError> {
        let mut state = self.lock()?;
        Ok(fan_out(&mut state, message))
    }

    pub fn latest(&self) -> Option<M> {
        self.lock().ok().and_then(|state| state.latest.clone())
    }

    /// Join the bus. The latest published message, if any, is delivered first.
    pub fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel(self.capacity);

        // If the lock is poisoned, we still return a subscription;
        // it just never receives anything.
        if let Ok(mut state) = self.lock() {
            if let Some(latest) = state.latest.clone() {
                let _ = tx.try_send(latest);
            }
            state.subscribers.push(tx);
        }

        Subscription::detached(SubscriptionId::new(), rx)
    }
}

fn fan_out<M: Clone>(state: &mut BusState<M>, message: M) -> usize {
    state.subscribers.retain(|tx| match tx.try_send(message.clone()) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            trace!("subscriber buffer full; message dropped for it");
            true
        }
        Err(TrySendError::Closed(_)) => false,
    });
    state.subscribers.len()
}
