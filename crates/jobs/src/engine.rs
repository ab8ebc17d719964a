//! Filter → project → sort.
//!
//! Pure functions over one poll response. The pipeline never mixes records
//! from two responses and never mutates its input.

use std::cmp::Ordering;

use clusterview_core::{Entity, JobId};

use crate::model::{Job, JobDetail, JobRun, LastRun, RunStatus, Schedule, ScheduleStatus};
use crate::query::{JobConnection, JobsQuery, SortBy, SortDirection};
use crate::upstream::{ActiveRunState, FinishedRunResponse, JobResponse};

/// Build the externally visible result for `query` from one poll response.
///
/// Order: namespace filter, substring filter, projection, stable sort.
pub fn apply(query: &JobsQuery, response: &[JobResponse]) -> JobConnection {
    let total_count = response.len();

    let in_namespace = filter_by_namespace(response, query.namespace.as_deref());
    let matching = filter_by_id(in_namespace, query.filter.as_deref());

    let mut nodes: Vec<Job> = matching.into_iter().map(project).collect();
    sort_jobs(&mut nodes, query.sort_by, query.sort_direction);

    JobConnection {
        filtered_count: nodes.len(),
        total_count,
        nodes,
    }
}

/// Keep records whose id starts with `namespace`; `None` keeps all.
pub fn filter_by_namespace<'a, T, I>(records: I, namespace: Option<&str>) -> Vec<&'a T>
where
    I: IntoIterator<Item = &'a T>,
    T: Entity<Id = JobId> + 'a,
{
    match namespace {
        None => records.into_iter().collect(),
        Some(prefix) => records
            .into_iter()
            .filter(|r| r.id().starts_with(prefix))
            .collect(),
    }
}

/// Keep records whose id contains `filter`; `None` keeps all.
pub fn filter_by_id<'a, T, I>(records: I, filter: Option<&str>) -> Vec<&'a T>
where
    I: IntoIterator<Item = &'a T>,
    T: Entity<Id = JobId> + 'a,
{
    match filter {
        None => records.into_iter().collect(),
        Some(needle) => records
            .into_iter()
            .filter(|r| r.id().contains(needle))
            .collect(),
    }
}

/// Stable sort; equal keys keep their input order in both directions.
pub fn sort_jobs(jobs: &mut [Job], sort_by: SortBy, direction: SortDirection) {
    let compare = comparator(sort_by);
    jobs.sort_by(|a, b| match direction {
        SortDirection::Asc => compare(a, b),
        SortDirection::Desc => compare(a, b).reverse(),
    });
}

pub fn comparator(sort_by: SortBy) -> fn(&Job, &Job) -> Ordering {
    match sort_by {
        SortBy::Id => compare_by_id,
        SortBy::Status => compare_by_status,
        SortBy::LastRun => compare_by_last_run,
    }
}

/// Case-insensitive comparison; ids differing only in case put lowercase
/// first, so the order is total.
pub fn compare_by_id(a: &Job, b: &Job) -> Ordering {
    compare_ids(a.id.as_str(), b.id.as_str())
}

pub fn compare_ids(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| b.cmp(a))
}

pub fn compare_by_status(a: &Job, b: &Job) -> Ordering {
    a.schedule_status.rank().cmp(&b.schedule_status.rank())
}

pub fn compare_by_last_run(a: &Job, b: &Job) -> Ordering {
    a.last_run().rank().cmp(&b.last_run().rank())
}

/// Map an upstream record to the visible [`Job`] shape.
pub fn project(raw: &JobResponse) -> Job {
    let id = raw.id.clone();
    let history = raw.history.clone().unwrap_or_default();

    Job {
        name: id.name().to_string(),
        path: id.path().into_iter().map(str::to_string).collect(),
        namespace: id.namespace(),
        description: raw.description.clone().unwrap_or_default(),
        schedule_status: schedule_status(raw),
        last_run_status: last_run(raw),
        schedules: raw
            .schedules
            .iter()
            .map(|s| Schedule {
                id: s.id.clone(),
                cron: s.cron.clone(),
                enabled: s.enabled,
                timezone: s.timezone.clone(),
                next_run_at: s.next_run_at,
            })
            .collect(),
        active_runs: active_runs(raw),
        success_count: history.success_count,
        failure_count: history.failure_count,
        id,
    }
}

/// [`project`] plus finished runs (newest first) and the raw document.
pub fn project_detail(raw: &JobResponse) -> JobDetail {
    let mut run_history: Vec<JobRun> = Vec::new();
    if let Some(history) = &raw.history {
        run_history.extend(
            history
                .successful_finished_runs
                .iter()
                .map(|r| finished_run(r, ScheduleStatus::Success)),
        );
        run_history.extend(
            history
                .failed_finished_runs
                .iter()
                .map(|r| finished_run(r, ScheduleStatus::Failed)),
        );
    }
    run_history.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));

    JobDetail {
        job: project(raw),
        run_history,
        json: raw
            .document
            .clone()
            .unwrap_or_else(|| serde_json::to_value(raw).unwrap_or(serde_json::Value::Null)),
    }
}

fn finished_run(run: &FinishedRunResponse, status: ScheduleStatus) -> JobRun {
    JobRun {
        id: run.id.clone(),
        status,
        created_at: run.created_at,
        finished_at: run.finished_at,
    }
}

fn active_state(state: ActiveRunState) -> ScheduleStatus {
    match state {
        ActiveRunState::Initial => ScheduleStatus::Initial,
        ActiveRunState::Starting => ScheduleStatus::Starting,
        ActiveRunState::Active | ActiveRunState::Unknown => ScheduleStatus::Active,
    }
}

/// Active runs, newest first.
fn active_runs(raw: &JobResponse) -> Vec<JobRun> {
    let mut runs: Vec<JobRun> = raw
        .active_runs
        .iter()
        .map(|r| JobRun {
            id: r.id.clone(),
            status: active_state(r.status),
            created_at: r.created_at,
            finished_at: None,
        })
        .collect();
    runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    runs
}

/// Newest active run, else an enabled schedule, else the latest outcome.
fn schedule_status(raw: &JobResponse) -> ScheduleStatus {
    if let Some(newest) = raw.active_runs.iter().max_by_key(|r| r.created_at) {
        return active_state(newest.status);
    }

    if raw.schedules.iter().any(|s| s.enabled) {
        return ScheduleStatus::Scheduled;
    }

    match last_finished(raw) {
        Some(LastRun {
            status: RunStatus::Failed,
            ..
        }) => ScheduleStatus::Failed,
        Some(_) => ScheduleStatus::Success,
        None => ScheduleStatus::Unscheduled,
    }
}

fn last_run(raw: &JobResponse) -> Option<LastRun> {
    if let Some(newest) = raw.active_runs.iter().max_by_key(|r| r.created_at) {
        return Some(LastRun {
            status: RunStatus::Running,
            started_at: newest.created_at,
            finished_at: None,
        });
    }
    last_finished(raw)
}

fn last_finished(raw: &JobResponse) -> Option<LastRun> {
    let history = raw.history.as_ref()?;
    let finished = |status, at| LastRun {
        status,
        started_at: None,
        finished_at: at,
    };

    match (history.last_success_at, history.last_failure_at) {
        (None, None) => None,
        (Some(s), Some(f)) if f > s => Some(finished(RunStatus::Failed, Some(f))),
        (Some(s), _) => Some(finished(RunStatus::Success, Some(s))),
        (None, Some(f)) => Some(finished(RunStatus::Failed, Some(f))),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::upstream::{ActiveRunResponse, HistoryResponse, ScheduleResponse};

    fn raw(id: &str) -> JobResponse {
        JobResponse {
            id: JobId::new(id).unwrap(),
            description: None,
            labels: Default::default(),
            run: serde_json::Value::Null,
            schedules: Vec::new(),
            active_runs: Vec::new(),
            history: None,
            document: None,
        }
    }

    fn ts(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
        crate::upstream::timestamp::parse(s)
    }

    fn with_status(id: &str, status: ScheduleStatus) -> JobResponse {
        let mut job = raw(id);
        match status {
            ScheduleStatus::Scheduled => job.schedules.push(ScheduleResponse {
                id: "s".to_string(),
                cron: "* * * * *".to_string(),
                enabled: true,
                timezone: None,
                concurrency_policy: None,
                next_run_at: None,
            }),
            ScheduleStatus::Failed => {
                job.history = Some(HistoryResponse {
                    failure_count: 1,
                    last_failure_at: ts("2020-01-01T00:00:00Z"),
                    ..Default::default()
                })
            }
            ScheduleStatus::Success => {
                job.history = Some(HistoryResponse {
                    success_count: 1,
                    last_success_at: ts("2020-01-01T00:00:00Z"),
                    ..Default::default()
                })
            }
            _ => {}
        }
        job
    }

    fn ids(connection: &JobConnection) -> Vec<&str> {
        connection.nodes.iter().map(|j| j.id.as_str()).collect()
    }

    #[test]
    fn namespace_and_status_sort_scenario() {
        let response = vec![
            with_status("/a/job1", ScheduleStatus::Scheduled),
            with_status("/a/job2", ScheduleStatus::Failed),
            with_status("/b/job3", ScheduleStatus::Success),
        ];
        let query = JobsQuery::new()
            .with_namespace("/a")
            .sorted(SortBy::Status, SortDirection::Asc);

        let result = apply(&query, &response);

        assert_eq!(result.total_count, 3);
        assert_eq!(result.filtered_count, 2);
        assert_eq!(ids(&result), vec!["/a/job2", "/a/job1"]);
        assert_eq!(result.nodes[0].schedule_status, ScheduleStatus::Failed);
        assert_eq!(result.nodes[1].schedule_status, ScheduleStatus::Scheduled);
    }

    #[test]
    fn defaults_match_everything_sorted_by_id() {
        let response = vec![raw("/b"), raw("/A"), raw("/a")];
        let result = apply(&JobsQuery::default(), &response);

        assert_eq!(result.filtered_count, 3);
        assert_eq!(ids(&result), vec!["/a", "/A", "/b"]);
    }

    #[test]
    fn detail_json_is_the_upstream_document() {
        let document = serde_json::json!({
            "id": "ops.backup",
            "labels": { "team": "ops" },
            "run": { "cmd": "backup.sh" },
            "disabledAt": "2020-01-01T00:00:00Z"
        });
        let mut job = JobResponse::from_document(document.clone()).unwrap();
        job.id = JobId::new("/ops/backup").unwrap();

        let detail = project_detail(&job);
        assert_eq!(detail.job.id.as_str(), "/ops/backup");
        assert_eq!(detail.json, document);
    }

    #[test]
    fn detail_json_falls_back_to_the_decoded_record() {
        let detail = project_detail(&raw("/a/job1"));
        assert_eq!(detail.json["id"], "/a/job1");
        assert!(detail.json.get("document").is_none());
    }

    #[test]
    fn case_variants_put_lowercase_first() {
        assert_eq!(compare_ids("/a", "/A"), Ordering::Less);
        assert_eq!(compare_ids("/Jobs/x", "/jobs/x"), Ordering::Greater);
        assert_eq!(compare_ids("/A", "/b"), Ordering::Less);
        assert_eq!(compare_ids("/a", "/a"), Ordering::Equal);
    }

    #[test]
    fn substring_filter_is_case_sensitive() {
        let response = vec![raw("/ops/Backup"), raw("/ops/backup-db"), raw("/dev/test")];
        let result = apply(&JobsQuery::new().with_filter("backup"), &response);

        assert_eq!(ids(&result), vec!["/ops/backup-db"]);
        assert_eq!(result.total_count, 3);
    }

    #[test]
    fn never_run_jobs_sort_as_not_available() {
        let response = vec![
            raw("/never"),
            with_status("/ok", ScheduleStatus::Success),
            with_status("/bad", ScheduleStatus::Failed),
        ];
        let query = JobsQuery::new().sorted(SortBy::LastRun, SortDirection::Asc);

        let result = apply(&query, &response);
        assert_eq!(ids(&result), vec!["/bad", "/ok", "/never"]);
        assert_eq!(result.nodes[2].last_run(), RunStatus::NotAvailable);
    }

    #[test]
    fn status_resolution_prefers_active_runs() {
        let mut job = with_status("/a/job", ScheduleStatus::Scheduled);
        job.active_runs = vec![
            ActiveRunResponse {
                id: "old".to_string(),
                status: ActiveRunState::Active,
                created_at: ts("2020-01-01T00:00:00Z"),
            },
            ActiveRunResponse {
                id: "new".to_string(),
                status: ActiveRunState::Starting,
                created_at: ts("2020-01-02T00:00:00Z"),
            },
        ];

        let projected = project(&job);
        assert_eq!(projected.schedule_status, ScheduleStatus::Starting);
        assert_eq!(projected.last_run(), RunStatus::Running);
        assert_eq!(projected.active_runs[0].id, "new");
    }

    #[test]
    fn latest_outcome_wins() {
        let mut job = raw("/a/job");
        job.history = Some(HistoryResponse {
            last_success_at: ts("2020-01-01T00:00:00Z"),
            last_failure_at: ts("2020-01-03T00:00:00Z"),
            ..Default::default()
        });

        let projected = project(&job);
        assert_eq!(projected.schedule_status, ScheduleStatus::Failed);
        assert_eq!(projected.last_run(), RunStatus::Failed);
        assert_eq!(projected.name, "job");
        assert_eq!(projected.namespace, "/a");
    }

    #[test]
    fn detail_lists_finished_runs_newest_first() {
        let mut job = raw("/a/job");
        job.history = Some(HistoryResponse {
            successful_finished_runs: vec![FinishedRunResponse {
                id: "r1".to_string(),
                created_at: None,
                finished_at: ts("2020-01-01T00:00:00Z"),
            }],
            failed_finished_runs: vec![FinishedRunResponse {
                id: "r2".to_string(),
                created_at: None,
                finished_at: ts("2020-01-02T00:00:00Z"),
            }],
            ..Default::default()
        });

        let detail = project_detail(&job);
        let runs: Vec<&str> = detail.run_history.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(runs, vec!["r2", "r1"]);
        assert_eq!(detail.json["id"], "/a/job");
    }

    #[test]
    fn projection_leaves_input_untouched() {
        let response = vec![with_status("/a/x", ScheduleStatus::Failed), raw("/a/y")];
        let before = response.clone();
        let _ = apply(&JobsQuery::new().sorted(SortBy::Status, SortDirection::Desc), &response);
        assert_eq!(response, before);
    }

    fn job_id_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec(prop::sample::select(vec!["a", "b", "A", "ops", "x1"]), 1..4)
            .prop_map(|segments| format!("/{}", segments.join("/")))
    }

    fn response_strategy() -> impl Strategy<Value = Vec<JobResponse>> {
        prop::collection::vec(
            (job_id_strategy(), prop::sample::select(ScheduleStatus::ALL.to_vec())),
            0..30,
        )
        .prop_map(|jobs| jobs.iter().map(|(id, s)| with_status(id, *s)).collect())
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: namespace filtering keeps the total count and only
        /// returns ids with the prefix.
        #[test]
        fn namespace_filter_properties(
            response in response_strategy(),
            namespace in prop::sample::select(vec!["/a", "/ops", "/A/b", "/zzz"]),
        ) {
            let result = apply(&JobsQuery::new().with_namespace(namespace), &response);

            prop_assert_eq!(result.total_count, response.len());
            prop_assert_eq!(result.nodes.len(), result.filtered_count);
            prop_assert!(result.filtered_count <= result.total_count);
            for node in &result.nodes {
                prop_assert!(node.id.starts_with(namespace));
            }
        }

        /// Property: the filtered count is the number of ids containing the substring.
        #[test]
        fn substring_count_property(
            response in response_strategy(),
            filter in prop::sample::select(vec!["a", "ops", "/x1", "A/", "missing"]),
        ) {
            let result = apply(&JobsQuery::new().with_filter(filter), &response);
            let expected = response.iter().filter(|r| r.id.contains(filter)).count();
            prop_assert_eq!(result.filtered_count, expected);
        }

        /// Property: sorting is idempotent for every key and direction.
        #[test]
        fn sorting_is_idempotent(
            response in response_strategy(),
            sort_by in prop::sample::select(vec![SortBy::Id, SortBy::Status, SortBy::LastRun]),
            direction in prop::sample::select(vec![SortDirection::Asc, SortDirection::Desc]),
        ) {
            let once = apply(&JobsQuery::new().sorted(sort_by, direction), &response);
            let mut twice = once.nodes.clone();
            sort_jobs(&mut twice, sort_by, direction);
            prop_assert_eq!(once.nodes, twice);
        }

        /// Property: for ID (a total order over distinct ids) the descending
        /// result is the ascending result reversed.
        #[test]
        fn id_direction_reverses_order(response in response_strategy()) {
            let mut seen = std::collections::HashSet::new();
            let unique: Vec<JobResponse> = response
                .into_iter()
                .filter(|r| seen.insert(r.id.clone()))
                .collect();

            let asc = apply(&JobsQuery::new().sorted(SortBy::Id, SortDirection::Asc), &unique);
            let mut desc = apply(&JobsQuery::new().sorted(SortBy::Id, SortDirection::Desc), &unique).nodes;
            desc.reverse();
            prop_assert_eq!(asc.nodes, desc);
        }
    }
}
