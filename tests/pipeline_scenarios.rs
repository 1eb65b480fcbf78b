//! End-to-end pipeline scenarios: config -> coordinator -> aggregated stats.
//!
//! Each test drives the full `Coordinator::run` against a `wiremock` stub
//! and inspects the final `AggregatedStats` snapshot, matching the kind of
//! scenario a load test run itself would be graded against.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use loadtest_core::config::{Config, Mode, SloConfig};
use loadtest_core::coordinator::{Coordinator, ExitCause};
use loadtest_core::errors::DefaultValidator;
use loadtest_core::types::AggregatedStats;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn collector() -> (Arc<Mutex<Vec<AggregatedStats>>>, impl Fn(AggregatedStats) + Send + Sync + 'static) {
    let snapshots = Arc::new(Mutex::new(Vec::new()));
    let for_closure = snapshots.clone();
    (snapshots, move |stats: AggregatedStats| {
        for_closure.lock().unwrap().push(stats);
    })
}

async fn run_with_timeout(
    coordinator: Coordinator,
    on_snapshot: impl Fn(AggregatedStats) + Send + Sync + 'static,
) -> ExitCause {
    tokio::time::timeout(Duration::from_secs(15), coordinator.run(on_snapshot))
        .await
        .expect("coordinator should finish within the test timeout")
}

#[tokio::test]
async fn s1_happy_path_scale_mode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id": 1, "name": "ok"}"#))
        .mount(&server)
        .await;

    let mut config = Config::for_testing();
    config.request.url = server.uri();
    config.request.json_schema = Some(r#"{"required": ["id", "name"]}"#.to_string());
    config.execution.mode = Mode::Scale;
    config.execution.concurrency = 5;
    config.execution.requests_to_issue = 100;
    config.execution.max_execution_time = Duration::from_secs(10);

    let (snapshots, on_snapshot) = collector();
    let coordinator = Coordinator::new(config, Some(Arc::new(DefaultValidator)));
    let cause = run_with_timeout(coordinator, on_snapshot).await;

    assert_eq!(cause, ExitCause::Completed);
    assert_eq!(cause.exit_code(), 0);

    // The coordinator always runs one final aggregation pass during
    // shutdown and hands it to the presenter, so at least one snapshot is
    // guaranteed here even under a slow CI host.
    let last = snapshots.lock().unwrap().last().cloned().expect("final snapshot published");
    assert_eq!(last.total_requests, 100);
    assert_eq!(last.total_responses, 100);
    assert_eq!(last.total_valid_responses, 100);
    assert!(!last.overall_failure);
}

#[tokio::test]
async fn s2_all_connection_failures_trip_harvest_slo() {
    // Nothing is listening on this port.
    let mut config = Config::for_testing();
    config.request.url = "http://127.0.0.1:1".to_string();
    config.request.timeout = Duration::from_millis(200);
    config.execution.mode = Mode::Scale;
    config.execution.concurrency = 2;
    config.execution.requests_to_issue = 10;
    config.execution.max_execution_time = Duration::from_secs(10);
    config.slo = SloConfig {
        harvest_pct: 90.0,
        yield_pct: 0.0,
        throughput_responses_per_sec: 0.0,
        latency_budgets: Vec::new(),
    };

    let (snapshots, on_snapshot) = collector();
    let coordinator = Coordinator::new(config, Some(Arc::new(DefaultValidator)));
    let cause = run_with_timeout(coordinator, on_snapshot).await;

    assert_eq!(cause, ExitCause::Completed);

    let last = snapshots.lock().unwrap().last().cloned().expect("final snapshot published");
    assert_eq!(last.total_requests, 10);
    assert_eq!(last.total_responses, 0);
    assert_eq!(last.harvest, 0.0);
    assert!(last.latency_percentiles.total.is_empty());
    assert!(last.overall_failure);
    assert!(last.failure_description.as_deref().unwrap_or("").contains("harvest"));
}

#[tokio::test]
async fn s3_schema_failures_only_keep_harvest_but_zero_yield() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id": 1}"#))
        .mount(&server)
        .await;

    let mut config = Config::for_testing();
    config.request.url = server.uri();
    config.request.json_schema = Some(r#"{"required": ["id", "name"]}"#.to_string());
    config.execution.mode = Mode::Scale;
    config.execution.concurrency = 5;
    config.execution.requests_to_issue = 50;
    config.execution.max_execution_time = Duration::from_secs(10);

    let (snapshots, on_snapshot) = collector();
    let coordinator = Coordinator::new(config, Some(Arc::new(DefaultValidator)));
    let cause = run_with_timeout(coordinator, on_snapshot).await;

    assert_eq!(cause, ExitCause::Completed);

    let last = snapshots.lock().unwrap().last().cloned().expect("final snapshot published");
    assert_eq!(last.total_requests, 50);
    assert_eq!(last.total_responses, 50);
    assert_eq!(last.harvest, 100.0);
    assert_eq!(last.yield_pct, 0.0);
    assert_eq!(*last.failure_counts.get("schema_violation").unwrap_or(&0), 50);
}

#[tokio::test]
async fn s5_warmup_suppresses_early_aggregation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut config = Config::for_testing();
    config.request.url = server.uri();
    config.execution.mode = Mode::Scale;
    config.execution.concurrency = 2;
    config.execution.requests_to_issue = 4;
    config.execution.warm_up = Duration::from_secs(2);
    config.execution.analysis_cadence = Duration::from_millis(100);
    config.execution.max_execution_time = Duration::from_secs(10);

    let start = std::time::Instant::now();
    let (snapshots, on_snapshot) = collector();
    let coordinator = Coordinator::new(config, Some(Arc::new(DefaultValidator)));
    let _cause = run_with_timeout(coordinator, on_snapshot).await;

    // Every *ticked* publication (not the shutdown cleanup pass, which runs
    // unconditionally) must have landed no earlier than the warm-up.
    let early_ticks = snapshots
        .lock()
        .unwrap()
        .iter()
        .filter(|s| s.elapsed < Duration::from_millis(1900))
        .count();
    assert_eq!(early_ticks, 0, "no aggregation should publish before warm-up elapses");
    let _ = start;
}

#[tokio::test]
async fn ramp_to_failure_trips_on_latency_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(100)))
        .mount(&server)
        .await;

    let mut config = Config::for_testing();
    config.request.url = server.uri();
    config.execution.mode = Mode::Fail;
    config.execution.concurrency = 50;
    config.execution.ramp = loadtest_core::load_models::RampPolicy::new(5.0, 5.0);
    config.execution.analysis_cadence = Duration::from_millis(100);
    config.execution.max_execution_time = Duration::from_secs(5);
    config.slo = SloConfig {
        harvest_pct: 0.0,
        yield_pct: 0.0,
        throughput_responses_per_sec: 0.0,
        latency_budgets: vec![Duration::from_millis(50)],
    };
    config.execution.quantiles = vec![0.99];

    let (_snapshots, on_snapshot) = collector();
    let coordinator = Coordinator::new(config, Some(Arc::new(DefaultValidator)));
    let cause = run_with_timeout(coordinator, on_snapshot).await;

    // Either the SLO breach is observed, or the run's max duration expires
    // first on a slow CI host — both are legitimate terminations here, but
    // the breach path is what this scenario targets.
    assert!(matches!(cause, ExitCause::SloBreach | ExitCause::Completed));
}
