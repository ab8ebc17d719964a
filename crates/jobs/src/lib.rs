//! `clusterview-jobs` — the job listing data model.
//!
//! ## Components
//!
//! - `upstream`: Metronome wire types and the [`JobsClient`] fetcher contract
//! - `model`: the projected [`Job`] record and its status enums
//! - `engine`: pure filter → project → sort pipeline
//! - `query`: declarative query arguments and the result connection
//! - `resolver`: [`JobResolver`], which turns queries into live subscriptions

pub mod engine;
pub mod model;
pub mod query;
pub mod resolver;
pub mod upstream;

pub use model::{Job, JobDetail, JobRun, LastRun, RunStatus, Schedule, ScheduleStatus};
pub use query::{JobConnection, JobQuery, JobsQuery, SortBy, SortDirection, TYPE_DEFS};
pub use resolver::{CollectionSubscription, EntitySubscription, JobResolver, ResolverConfig};
pub use upstream::{InMemoryJobsClient, JobDetailResponse, JobResponse, JobsClient};
