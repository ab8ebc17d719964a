use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::json;

use clusterview_jobs::engine;
use clusterview_jobs::{JobResponse, JobsQuery, SortBy, SortDirection};

/// A synthetic job list spread over a handful of namespaces.
fn synthetic_jobs(count: usize) -> Vec<JobResponse> {
    (0..count)
        .map(|i| {
            let raw = match i % 3 {
                0 => json!({
                    "id": format!("/team{}/job{i}", i % 7),
                    "schedules": [{ "id": "s", "cron": "* * * * *" }]
                }),
                1 => json!({
                    "id": format!("/team{}/Job{i}", i % 7),
                    "history": { "lastFailureAt": "2020-01-01T00:00:00Z" }
                }),
                _ => json!({
                    "id": format!("/team{}/etl/job{i}", i % 7),
                    "activeRuns": [{ "id": "r", "status": "ACTIVE", "createdAt": "2020-01-01T00:00:00Z" }]
                }),
            };
            serde_json::from_value(raw).expect("synthetic job must decode")
        })
        .collect()
}

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_query");

    for count in [100usize, 1_000, 10_000] {
        let jobs = synthetic_jobs(count);
        group.throughput(Throughput::Elements(count as u64));

        for sort_by in [SortBy::Id, SortBy::Status, SortBy::LastRun] {
            let query = JobsQuery::new()
                .with_namespace("/team3")
                .sorted(sort_by, SortDirection::Desc);
            group.bench_with_input(
                BenchmarkId::new(format!("{sort_by:?}"), count),
                &jobs,
                |b, jobs| b.iter(|| engine::apply(black_box(&query), black_box(jobs))),
            );
        }
    }

    group.finish();
}

fn bench_projection(c: &mut Criterion) {
    let jobs = synthetic_jobs(1_000);
    let mut group = c.benchmark_group("projection");

    group.bench_function("project_1000", |b| {
        b.iter(|| jobs.iter().map(engine::project).count())
    });
    group.bench_function("project_detail_1000", |b| {
        b.iter(|| jobs.iter().map(engine::project_detail).count())
    });

    group.finish();
}

criterion_group!(benches, bench_apply, bench_projection);
criterion_main!(benches);
