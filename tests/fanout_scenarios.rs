// SPDX-License-Identifier: Apache-2.0

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use common::{template, MockConnector, Script};
use dbfanout::config::RunSettings;
use dbfanout::engine::error::ErrorKind;
use dbfanout::engine::types::{CredentialTemplate, Target, Value};
use dbfanout::fanout::resolver::POSTGRES_DISCOVERY_QUERY;
use dbfanout::fanout::{
    AggregationMode, FanoutRunner, NoticeStatus, Outcome, RunResult, Scheduler, SchedulerOptions,
    TargetEntry,
};

fn settings(max_concurrency: usize) -> RunSettings {
    RunSettings {
        max_concurrency,
        ..RunSettings::default()
    }
}

fn three_tenants() -> MockConnector {
    MockConnector::new(["db_a", "db_b", "db_c"])
        .script("db_a", Script::Rows(2))
        .script("db_b", Script::Empty)
        .script("db_c", Script::RefuseConnect)
}

fn targets(names: &[&str]) -> Vec<Target> {
    names.iter().map(|n| Target::new(*n)).collect()
}

#[tokio::test]
async fn unified_run_merges_rows_and_reports_the_rest() {
    let runner = FanoutRunner::new(Arc::new(three_tenants()), settings(5));

    let output = runner
        .run(template(), None, "SELECT id, total FROM orders", AggregationMode::Unified)
        .await
        .unwrap();

    assert_eq!(output.targets, targets(&["db_a", "db_b", "db_c"]));

    let RunResult::Unified { artifact, notices } = &output.result else {
        panic!("expected unified result, got {:?}", output.result);
    };
    assert_eq!(artifact.name, "grouped_results");
    assert_eq!(artifact.table.row_count(), 2);
    let names: Vec<_> = artifact.table.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "total", "database"]);
    for row in &artifact.table.rows {
        assert_eq!(row.values[2], Value::Text("db_a".into()));
    }

    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0].target.as_str(), "db_b");
    assert_eq!(notices[0].status, NoticeStatus::Empty);
    assert_eq!(notices[1].target.as_str(), "db_c");
    assert!(matches!(
        notices[1].status,
        NoticeStatus::Failed {
            kind: ErrorKind::Connection,
            ..
        }
    ));

    assert_eq!(output.report.total, 3);
    assert_eq!(output.report.succeeded(), 2);
    assert!(output
        .report
        .to_string()
        .starts_with("completed with 2/3 targets succeeded"));
}

#[tokio::test]
async fn separate_run_keeps_targets_apart() {
    let runner = FanoutRunner::new(Arc::new(three_tenants()), settings(5));

    let output = runner
        .run(template(), None, "SELECT id, total FROM orders", AggregationMode::Separate)
        .await
        .unwrap();

    let RunResult::Separate { entries } = &output.result else {
        panic!("expected separate result");
    };
    assert_eq!(entries.len(), 3);

    match &entries[&Target::new("db_a")] {
        TargetEntry::Artifact(artifact) => {
            assert_eq!(artifact.name, "db_a");
            assert_eq!(artifact.table.row_count(), 2);
            assert_eq!(artifact.table.columns.len(), 2);
        }
        other => panic!("unexpected entry for db_a: {other:?}"),
    }
    assert!(matches!(entries[&Target::new("db_b")], TargetEntry::Empty));
    assert!(matches!(
        entries[&Target::new("db_c")],
        TargetEntry::Failed {
            kind: ErrorKind::Connection,
            ..
        }
    ));
    assert_eq!(output.result.artifacts().len(), 1);
}

#[tokio::test]
async fn concurrency_never_exceeds_the_bound() {
    let names: Vec<String> = (0..12).map(|i| format!("tenant_{i:02}")).collect();
    let connector = MockConnector::new(names.clone()).default_delay(Duration::from_millis(30));
    let probe = connector.probe();

    let scheduler = Scheduler::new(
        Arc::new(connector),
        SchedulerOptions {
            max_concurrency: 3,
            ..SchedulerOptions::default()
        },
    );
    let targets: Vec<Target> = names.iter().map(Target::new).collect();
    let outcomes = scheduler
        .run(&targets, Arc::new(template()), Arc::from("SELECT 1"))
        .await;

    assert_eq!(outcomes.len(), 12);
    assert!(probe.peak() <= 3, "peak was {}", probe.peak());
    assert!(probe.peak() >= 2, "tasks never overlapped");
    assert_eq!(probe.open(), 0);
    assert_eq!(probe.closed(), 12);

    let snapshot = scheduler.metrics().snapshot();
    assert!(snapshot.peak_in_flight <= 3);
    assert_eq!(snapshot.finished, 12);
    assert_eq!(snapshot.successes, 12);
    assert_eq!(scheduler.metrics().in_flight(), 0);
}

#[tokio::test]
async fn zero_concurrency_still_runs_every_target() {
    let connector = MockConnector::new(["db_a", "db_b"]);
    let probe = connector.probe();
    let scheduler = Scheduler::new(
        Arc::new(connector),
        SchedulerOptions {
            max_concurrency: 0,
            ..SchedulerOptions::default()
        },
    );

    let outcomes = scheduler
        .run(&targets(&["db_a", "db_b"]), Arc::new(template()), Arc::from("SELECT 1"))
        .await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(probe.peak(), 1);
}

#[tokio::test]
async fn query_failure_is_isolated() {
    let connector = MockConnector::new(["db_a", "db_b", "db_c"])
        .script("db_b", Script::FailQuery)
        .delay("db_b", Duration::from_millis(5));
    let probe = connector.probe();
    let scheduler = Scheduler::new(Arc::new(connector), SchedulerOptions::default());

    let outcomes = scheduler
        .run(
            &targets(&["db_a", "db_b", "db_c"]),
            Arc::new(template()),
            Arc::from("SELECT * FROM orders"),
        )
        .await;

    assert!(matches!(outcomes[0], Outcome::Success { .. }));
    match &outcomes[1] {
        Outcome::Failure { kind, message, .. } => {
            assert_eq!(*kind, ErrorKind::QueryExecution);
            assert!(message.contains("does not exist"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(matches!(outcomes[2], Outcome::Success { .. }));
    // connection of the failing target is still closed
    assert_eq!(probe.closed(), 3);
}

#[tokio::test]
async fn slow_target_times_out_alone() {
    let connector = MockConnector::new(["db_a", "db_slow"])
        .delay("db_slow", Duration::from_secs(30));
    let probe = connector.probe();
    let scheduler = Scheduler::new(
        Arc::new(connector),
        SchedulerOptions {
            task_timeout: Some(Duration::from_millis(100)),
            ..SchedulerOptions::default()
        },
    );

    let started = Instant::now();
    let outcomes = scheduler
        .run(&targets(&["db_a", "db_slow"]), Arc::new(template()), Arc::from("SELECT 1"))
        .await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(matches!(outcomes[0], Outcome::Success { .. }));
    match &outcomes[1] {
        Outcome::Failure { kind, .. } => assert_eq!(*kind, ErrorKind::Timeout),
        other => panic!("unexpected outcome: {other:?}"),
    }
    // the abandoned connection was dropped
    assert_eq!(probe.open(), 0);
    assert_eq!(scheduler.metrics().snapshot().timeouts, 1);
}

#[tokio::test]
async fn cancellation_resolves_every_outstanding_target() {
    let names: Vec<String> = (0..8).map(|i| format!("tenant_{i}")).collect();
    let connector = MockConnector::new(names.clone()).default_delay(Duration::from_secs(30));
    let probe = connector.probe();

    let cancel = CancellationToken::new();
    let scheduler = Scheduler::new(
        Arc::new(connector),
        SchedulerOptions {
            max_concurrency: 2,
            cancel: cancel.clone(),
            ..SchedulerOptions::default()
        },
    );

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let targets: Vec<Target> = names.iter().map(Target::new).collect();
    let started = Instant::now();
    let outcomes = scheduler
        .run(&targets, Arc::new(template()), Arc::from("SELECT 1"))
        .await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(outcomes.len(), 8);
    for outcome in &outcomes {
        match outcome {
            Outcome::Failure { kind, .. } => assert_eq!(*kind, ErrorKind::Cancelled),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert_eq!(probe.open(), 0);
    assert_eq!(scheduler.metrics().snapshot().cancelled, 8);
}

#[tokio::test]
async fn panicking_target_becomes_a_failure() {
    let connector = MockConnector::new(["db_a", "db_b", "db_c"]).script("db_b", Script::Panic);
    let scheduler = Scheduler::new(Arc::new(connector), SchedulerOptions::default());

    let outcomes = scheduler
        .run(&targets(&["db_a", "db_b", "db_c"]), Arc::new(template()), Arc::from("SELECT 1"))
        .await;

    assert_eq!(outcomes.len(), 3);
    assert!(matches!(outcomes[0], Outcome::Success { .. }));
    match &outcomes[1] {
        Outcome::Failure { target, kind, .. } => {
            assert_eq!(target.as_str(), "db_b");
            assert_eq!(*kind, ErrorKind::Internal);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(matches!(outcomes[2], Outcome::Success { .. }));
    assert_eq!(scheduler.metrics().snapshot().failures, 1);
}

#[tokio::test]
async fn no_targets_means_no_data() {
    let connector: MockConnector = MockConnector::new(Vec::<String>::new());
    let probe = connector.probe();
    let runner = FanoutRunner::new(Arc::new(connector), settings(5));

    for mode in [AggregationMode::Unified, AggregationMode::Separate] {
        let output = runner.run(template(), None, "SELECT 1", mode).await.unwrap();
        assert!(output.targets.is_empty());
        assert!(output.result.is_no_data());
        assert_eq!(output.report.total, 0);
    }
    assert_eq!(probe.connects(), 0);
}

#[tokio::test]
async fn unified_with_only_failures_is_no_data_with_notices() {
    let connector = MockConnector::new(["db_a", "db_b"])
        .script("db_a", Script::FailQuery)
        .script("db_b", Script::Empty);
    let runner = FanoutRunner::new(Arc::new(connector), settings(5));

    let output = runner
        .run(template(), None, "SELECT 1", AggregationMode::Unified)
        .await
        .unwrap();

    let RunResult::NoData { notices } = &output.result else {
        panic!("expected no data");
    };
    assert_eq!(notices.len(), 2);
    assert_eq!(output.report.succeeded(), 1);
}

#[tokio::test]
async fn discovery_failure_aborts_before_fan_out() {
    let connector = MockConnector::new(["db_a"]).fail_discovery();
    let probe = connector.probe();
    let runner = FanoutRunner::new(Arc::new(connector), settings(5));

    let err = runner
        .run(template(), None, "SELECT 1", AggregationMode::Unified)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Discovery);
    assert!(err.is_fatal());
    assert_eq!(probe.connects(), 0);
}

#[tokio::test]
async fn unsupported_engine_is_fatal() {
    let runner = FanoutRunner::new(Arc::new(MockConnector::new(["db_a"])), settings(5));
    let template = CredentialTemplate {
        engine: "oracle".into(),
        ..template()
    };

    let err = runner
        .run(template, None, "SELECT 1", AggregationMode::Unified)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedEngine);
}

#[tokio::test]
async fn discovery_query_defaults_per_engine_and_can_be_overridden() {
    let connector = MockConnector::new(["db_a"]);
    let probe = connector.probe();
    let runner = FanoutRunner::new(Arc::new(connector), settings(5));

    runner
        .run(template(), None, "SELECT 1", AggregationMode::Unified)
        .await
        .unwrap();
    assert_eq!(probe.discovery_sql().as_deref(), Some(POSTGRES_DISCOVERY_QUERY));

    let custom = "SELECT datname FROM pg_database WHERE datname LIKE 'tenant_%'";
    runner
        .run(template(), Some(custom), "SELECT 1", AggregationMode::Unified)
        .await
        .unwrap();
    assert_eq!(probe.discovery_sql().as_deref(), Some(custom));
}

#[tokio::test]
async fn discovery_is_stable_across_runs() {
    let runner = FanoutRunner::new(Arc::new(three_tenants()), settings(2));

    let first = runner
        .run(template(), None, "SELECT 1", AggregationMode::Separate)
        .await
        .unwrap();
    let second = runner
        .run(template(), None, "SELECT 1", AggregationMode::Separate)
        .await
        .unwrap();

    assert_eq!(first.targets, second.targets);
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn duplicate_discovery_rows_run_once() {
    let connector = MockConnector::new(["db_a", "db_a", "db_b"])
        .script("db_a", Script::Rows(2))
        .script("db_b", Script::Rows(1));
    let probe = connector.probe();
    let runner = FanoutRunner::new(Arc::new(connector), settings(5));

    let output = runner
        .run(template(), None, "SELECT id, total FROM orders", AggregationMode::Separate)
        .await
        .unwrap();

    assert_eq!(output.targets, targets(&["db_a", "db_b"]));
    assert_eq!(probe.connects(), 2);
    assert_eq!(output.report.total, 2);

    let RunResult::Separate { entries } = &output.result else {
        panic!("expected separate result");
    };
    assert_eq!(entries.len(), output.report.total);
    assert_eq!(output.result.artifacts().len(), 2);

    let unified = FanoutRunner::new(
        Arc::new(MockConnector::new(["db_a", "db_a"]).script("db_a", Script::Rows(2))),
        settings(5),
    )
    .run(template(), None, "SELECT id, total FROM orders", AggregationMode::Unified)
    .await
    .unwrap();
    assert_eq!(unified.result.artifacts()[0].table.row_count(), 2);
}
