//! Wires the pipeline together and arbitrates shutdown.
//!
//! A central `select!` races every termination source — analyser failure,
//! spawner completion, accumulator completion, an optional presenter
//! completion, and Ctrl-C — then drives the same ordered cleanup
//! regardless of which source fired.

use std::sync::Arc;

use tracing::info;

use crate::accumulator::Accumulator;
use crate::analyser::Analyser;
use crate::config::Config;
use crate::errors::Validator;
use crate::requester::Requester;
use crate::types::AggregatedStats;
use crate::worker::Spawner;

/// Why the run ended, driving the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCause {
    /// The configured request count was fully issued and drained cleanly.
    Completed,
    /// Ramp-to-failure observed an SLO breach.
    SloBreach,
    /// The process received Ctrl-C.
    Interrupted,
}

impl ExitCause {
    /// Process exit code: 0 for natural completion or an intentional
    /// ramp-to-failure stop, 1 for an interrupt. An SLO breach in ramp
    /// mode is the ramp policy doing its job, not a failure of the run
    /// itself, so it exits clean the same as a completed scale run.
    pub fn exit_code(self) -> i32 {
        match self {
            ExitCause::Completed | ExitCause::SloBreach => 0,
            ExitCause::Interrupted => 1,
        }
    }
}

/// Owns every component of one run and drives it to completion.
pub struct Coordinator {
    config: Config,
    validator: Option<Arc<dyn Validator>>,
}

impl Coordinator {
    pub fn new(config: Config, validator: Option<Arc<dyn Validator>>) -> Self {
        Self { config, validator }
    }

    /// Runs the full pipeline to completion, invoking `on_snapshot` for
    /// every published `AggregatedStats` tick (the hand-off to the
    /// external presentation layer). Returns the reason the run ended.
    pub async fn run<F>(self, on_snapshot: F) -> ExitCause
    where
        F: Fn(AggregatedStats) + Send + Sync + 'static,
    {
        let client_config = self.config.to_client_config();
        let build_result = crate::client::build_client(&client_config)
            .expect("failed to build HTTP client from configuration");
        let client = build_result.client;

        let request_spec = self.config.request.clone();
        let validator = self.validator.clone();
        let requester_factory = move || {
            Requester::new(client.clone(), request_spec.clone(), validator.clone())
        };

        let (spawner, outcomes_rx, heartbeats_rx) =
            Spawner::start(self.config.execution.clone(), requester_factory);

        let accumulator = Arc::new(Accumulator::new(self.config.execution.requests_to_issue));
        let accumulator_task = tokio::spawn(accumulator.clone().run(outcomes_rx, heartbeats_rx));

        let analyser = Arc::new(Analyser::new(
            accumulator.clone(),
            self.config.execution.clone(),
            self.config.slo.clone(),
        ));

        // `on_snapshot` is the hand-off to the presenter; it is shared
        // between the analyser's own ticks and the coordinator's final
        // cleanup pass, which must reach the presenter too.
        let on_snapshot = Arc::new(on_snapshot);
        let analyser_for_run = analyser.clone();
        let on_snapshot_for_run = on_snapshot.clone();
        let analysis_task = tokio::spawn(async move {
            analyser_for_run
                .run(move |stats| (*on_snapshot_for_run)(stats))
                .await;
        });

        info!(mode = ?self.config.execution.mode, "coordinator started");

        let cause = tokio::select! {
            _ = analyser.fail.wait() => ExitCause::SloBreach,
            _ = spawner.done.wait() => ExitCause::Completed,
            _ = accumulator.done.wait() => ExitCause::Completed,
            _ = tokio::signal::ctrl_c() => ExitCause::Interrupted,
        };

        info!(?cause, "coordinator shutting down");

        // Ordered cleanup: stop admitting new work, stop the analyser's
        // tickers, run one final heartbeat snapshot, then one final
        // analysis pass — handed to the presenter exactly like every
        // other tick — before the component tasks are joined.
        spawner.request_stop();
        analyser.request_stop();
        let _ = analysis_task.await;

        let final_heartbeat = spawner.cleanup();
        let final_stats = analyser.analyze_once();
        info!(
            issued = final_heartbeat.issued,
            total_requests = final_stats.total_requests,
            total_responses = final_stats.total_responses,
            harvest = final_stats.harvest,
            "final aggregation complete"
        );
        (*on_snapshot)(final_stats);

        let _ = accumulator_task.await;

        cause
    }
}
