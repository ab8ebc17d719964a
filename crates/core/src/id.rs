//! Job identifiers.
//!
//! Identifiers are path-like (`/team/nightly/backup`): the segments before the
//! last one form the job's namespace.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::QueryError;

const SEPARATOR: char = '/';

/// Identifier of a job, unique within its namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Create an identifier; blank input is rejected.
    pub fn new(id: impl Into<String>) -> Result<Self, QueryError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(QueryError::invalid_query("job id must not be empty"));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Non-empty path segments of the identifier.
    pub fn path(&self) -> Vec<&str> {
        self.0.split(SEPARATOR).filter(|s| !s.is_empty()).collect()
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.0
            .rsplit(SEPARATOR)
            .find(|s| !s.is_empty())
            .unwrap_or(self.0.as_str())
    }

    /// Every segment but the last, re-joined with a leading separator.
    ///
    /// Empty for identifiers that consist of a single segment.
    pub fn namespace(&self) -> String {
        let path = self.path();
        match path.split_last() {
            Some((_, parents)) if !parents.is_empty() => {
                format!("{SEPARATOR}{}", parents.join("/"))
            }
            _ => String::new(),
        }
    }

    /// Exact, case-sensitive prefix match.
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    /// Case-sensitive substring match.
    pub fn contains(&self, needle: &str) -> bool {
        self.0.contains(needle)
    }
}

impl core::fmt::Display for JobId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JobId {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
