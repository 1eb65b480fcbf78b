use std::process::ExitCode;
use std::sync::Arc;

use mimalloc::MiMalloc;
use tracing::{error, info};

use loadtest_core::config::Config;
use loadtest_core::coordinator::Coordinator;
use loadtest_core::errors::{DefaultValidator, Validator};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        mode = ?config.execution.mode,
        concurrency = config.execution.concurrency,
        requests_to_issue = config.execution.requests_to_issue,
        url = %config.request.url,
        "starting load test"
    );

    let validator: Arc<dyn Validator> = Arc::new(DefaultValidator);
    let coordinator = Coordinator::new(config, Some(validator));

    let cause = coordinator
        .run(|stats| {
            info!(
                elapsed_ms = stats.elapsed.as_millis() as u64,
                total_requests = stats.total_requests,
                total_responses = stats.total_responses,
                harvest = stats.harvest,
                yield_pct = stats.yield_pct,
                throughput_resp_per_sec = stats.throughput_responses_per_sec,
                overall_failure = stats.overall_failure,
                description = ?stats.failure_description,
                "aggregated stats"
            );
        })
        .await;

    info!(?cause, exit_code = cause.exit_code(), "load test finished");

    ExitCode::from(cause.exit_code() as u8)
}
