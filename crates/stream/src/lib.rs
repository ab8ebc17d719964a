//! Polling and fan-out mechanics.
//!
//! - [`Poller`]: timer-driven fetch loops with exhaust or switch overlap handling
//! - [`Subscription`]: the consumer's end of one poll loop
//! - [`RetryPolicy`] / [`retry`]: bounded retries for a single fetch
//! - [`MulticastBus`]: share one producer's output with many subscribers
//!
//! Nothing here knows what is being fetched.

pub mod multicast;
pub mod poller;
pub mod retry;
pub mod subscription;

pub use multicast::{MulticastBus, MulticastError};
pub use poller::{PollOutcome, PollPolicy, Poller};
pub use retry::{RetryPolicy, retry};
pub use subscription::{Subscription, SubscriptionId};
