//! Projected job records.
//!
//! Records are immutable snapshots: a fresh set is built from every poll
//! response and never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clusterview_core::{Entity, JobId};

/// State of a recurring job definition.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Initial,
    Starting,
    Active,
    Failed,
    Success,
    Scheduled,
    Unscheduled,
}

impl ScheduleStatus {
    pub const ALL: [ScheduleStatus; 7] = [
        ScheduleStatus::Initial,
        ScheduleStatus::Starting,
        ScheduleStatus::Active,
        ScheduleStatus::Failed,
        ScheduleStatus::Success,
        ScheduleStatus::Scheduled,
        ScheduleStatus::Unscheduled,
    ];

    /// Position in a status sort (lower sorts first).
    pub const fn rank(self) -> u8 {
        match self {
            ScheduleStatus::Active => 0,
            ScheduleStatus::Starting => 1,
            ScheduleStatus::Initial => 2,
            ScheduleStatus::Failed => 3,
            ScheduleStatus::Scheduled => 4,
            ScheduleStatus::Success => 5,
            ScheduleStatus::Unscheduled => 6,
        }
    }
}

/// Outcome of the most recent execution of a job.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "SUCCESS")]
    Success,
    /// The job never ran.
    #[serde(rename = "N/A")]
    NotAvailable,
}

impl RunStatus {
    pub const ALL: [RunStatus; 4] = [
        RunStatus::Failed,
        RunStatus::Running,
        RunStatus::Success,
        RunStatus::NotAvailable,
    ];

    /// Position in a last-run sort (lower sorts first).
    pub const fn rank(self) -> u8 {
        match self {
            RunStatus::Failed => 0,
            RunStatus::Running => 1,
            RunStatus::Success => 2,
            RunStatus::NotAvailable => 3,
        }
    }
}

/// Summary of the most recent run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRun {
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub cron: String,
    pub enabled: bool,
    pub timezone: Option<String>,
    pub next_run_at: Option<DateTime<Utc>>,
}

/// One execution of a job, active or finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRun {
    pub id: String,
    pub status: ScheduleStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// A job as exposed to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub path: Vec<String>,
    pub namespace: String,
    pub description: String,
    pub schedule_status: ScheduleStatus,
    /// `None` when the job never ran.
    pub last_run_status: Option<LastRun>,
    pub schedules: Vec<Schedule>,
    pub active_runs: Vec<JobRun>,
    pub success_count: u64,
    pub failure_count: u64,
}

impl Job {
    /// Run status used for sorting; a job that never ran is "N/A".
    pub fn last_run(&self) -> RunStatus {
        self.last_run_status
            .as_ref()
            .map_or(RunStatus::NotAvailable, |run| run.status)
    }
}

impl Entity for Job {
    type Id = JobId;

    fn id(&self) -> &JobId {
        &self.id
    }
}

/// A job plus its finished runs and the raw upstream document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: Job,
    /// Finished runs, newest first.
    pub run_history: Vec<JobRun>,
    pub json: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn ranks_are_a_total_order() {
        let ranks: HashSet<u8> = ScheduleStatus::ALL.iter().map(|s| s.rank()).collect();
        assert_eq!(ranks.len(), ScheduleStatus::ALL.len());

        let ranks: HashSet<u8> = RunStatus::ALL.iter().map(|s| s.rank()).collect();
        assert_eq!(ranks.len(), RunStatus::ALL.len());
    }

    #[test]
    fn failed_sorts_before_scheduled() {
        assert!(ScheduleStatus::Failed.rank() < ScheduleStatus::Scheduled.rank());
        assert!(RunStatus::Success.rank() < RunStatus::NotAvailable.rank());
    }

    #[test]
    fn wire_names() {
        assert_eq!(
            serde_json::to_string(&ScheduleStatus::Unscheduled).unwrap(),
            "\"UNSCHEDULED\""
        );
        assert_eq!(serde_json::to_string(&RunStatus::NotAvailable).unwrap(), "\"N/A\"");
    }
}
