//! `clusterview-core` — shared building blocks.
//!
//! This crate contains **pure** primitives (no I/O, no runtime): the error
//! taxonomy shared by fetchers and resolvers, the job identifier, and the
//! wall clock abstraction used by time-gated streams.

pub mod clock;
pub mod entity;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entity::Entity;
pub use error::{FetchError, QueryError, QueryResult};
pub use id::JobId;
