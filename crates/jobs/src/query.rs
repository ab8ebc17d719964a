//! Declarative query arguments and results.

use serde::{Deserialize, Serialize};

use clusterview_core::{JobId, QueryError};

use crate::model::Job;

/// Schema of the two root queries, in SDL.
pub const TYPE_DEFS: &str = r#"
  enum ScheduleStatus {
    INITIAL
    STARTING
    ACTIVE
    FAILED
    SUCCESS
    SCHEDULED
    UNSCHEDULED
  }
  type LastRun {
    status: String!
    startedAt: String
    finishedAt: String
  }
  type Job {
    id: ID!
    name: String!
    path: [String!]!
    namespace: String!
    description: String!
    scheduleStatus: ScheduleStatus!
    lastRunStatus: LastRun
    successCount: Int!
    failureCount: Int!
  }
  type JobConnection {
    filteredCount: Int!
    totalCount: Int!
    nodes: [Job!]!
  }
  enum SortOption {
    ID
    STATUS
    LAST_RUN
  }
  enum SortDirection {
    ASC
    DESC
  }
  type Query {
    jobs(
      filter: String
      namespace: String
      sortBy: SortOption
      sortDirection: SortDirection
    ): JobConnection
    job(
      id: ID!
    ): Job
  }
"#;

/// Sort key of a collection query.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortBy {
    #[default]
    Id,
    Status,
    LastRun,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Arguments of the `jobs` query. Every field is optional; the defaults match
/// everything, sorted by id ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobsQuery {
    /// Exact, case-sensitive id prefix.
    pub namespace: Option<String>,
    /// Case-sensitive id substring.
    pub filter: Option<String>,
    pub sort_by: SortBy,
    pub sort_direction: SortDirection,
}

impl JobsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn sorted(mut self, sort_by: SortBy, direction: SortDirection) -> Self {
        self.sort_by = sort_by;
        self.sort_direction = direction;
        self
    }
}

/// Arguments of the `job` query.
///
/// The filter/sort fields are accepted for symmetry with [`JobsQuery`] and
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobQuery {
    pub id: Option<String>,
    pub filter: Option<String>,
    pub sort_by: Option<SortBy>,
    pub sort_direction: Option<SortDirection>,
}

impl JobQuery {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// The required identifier, or `InvalidQuery` when it is missing or blank.
    pub fn job_id(&self) -> Result<JobId, QueryError> {
        match self.id.as_deref() {
            Some(id) => JobId::new(id),
            None => Err(QueryError::invalid_query(
                "the job resolver expects an id as argument",
            )),
        }
    }
}

/// Result of a `jobs` query for one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConnection {
    /// Records left after the namespace and substring filters.
    pub filtered_count: usize,
    /// Records in the poll response before any filtering.
    pub total_count: usize,
    pub nodes: Vec<Job>,
}
