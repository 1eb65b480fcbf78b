//! Ties the accumulator, percentiles, throughput, and SLO together.
//!
//! A ticker wakes the analysis pass at a fixed cadence, suppressed until
//! the configured warm-up elapses, and a second, independent ticker
//! drives the throughput window so the two concerns can run at different
//! rates.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::interval;
use tracing::warn;

use crate::accumulator::Accumulator;
use crate::config::{ExecutionConfig, SloConfig};
use crate::percentiles::{compute_percentiles, min_mean_max_total};
use crate::signal::OneShot;
use crate::slo;
use crate::throughput::{compute_throughput_point, ThroughputSeries};
use crate::types::AggregatedStats;

/// Runs the periodic analysis and throughput ticks, publishing
/// `AggregatedStats` snapshots and firing `fail` the first time an SLO
/// breach is observed in ramp-to-failure mode.
pub struct Analyser {
    accumulator: Arc<Accumulator>,
    execution: ExecutionConfig,
    slo: SloConfig,
    throughput_series: ThroughputSeries,
    test_start: Instant,
    pub stop: OneShot,
    pub fail: OneShot,
}

impl Analyser {
    pub fn new(accumulator: Arc<Accumulator>, execution: ExecutionConfig, slo: SloConfig) -> Self {
        Self {
            accumulator,
            execution,
            slo,
            throughput_series: ThroughputSeries::new(),
            test_start: Instant::now(),
            stop: OneShot::new(),
            fail: OneShot::new(),
        }
    }

    /// Runs both tickers until `stop` fires. Each loop iteration that
    /// observes a tick publishes on `publish`.
    pub async fn run<F: Fn(AggregatedStats) + Send + Sync>(&self, publish: F) {
        let mut analysis_ticker = interval(self.execution.analysis_cadence);
        let mut throughput_ticker = interval(self.execution.throughput_cadence);

        loop {
            tokio::select! {
                _ = analysis_ticker.tick() => {
                    if self.test_start.elapsed() < self.execution.warm_up {
                        continue;
                    }
                    let stats = self.analyze_once();
                    if self.execution.mode == crate::config::Mode::Fail && stats.overall_failure {
                        warn!(description = ?stats.failure_description, "SLO breach observed");
                        self.fail.fire();
                    }
                    publish(stats);
                }
                _ = throughput_ticker.tick() => {
                    let outcomes = self.accumulator.outcomes_snapshot();
                    let point = compute_throughput_point(&outcomes, Instant::now(), self.execution.throughput_window);
                    self.throughput_series.record(point);
                }
                _ = self.stop.wait() => break,
            }
        }
    }

    /// One aggregation pass over the accumulator's current snapshot.
    pub fn analyze_once(&self) -> AggregatedStats {
        let outcomes = self.accumulator.outcomes_snapshot();
        let heartbeats = self.accumulator.heartbeats_snapshot();

        // Per the spec's invariant `totalRequests = heartbeats.last.issued`
        // (not `len(outcomes)`, which only counts what has *completed* and
        // understates issued while requests are still in flight).
        let total_requests = heartbeats.last().map(|h| h.issued).unwrap_or(0);
        let total_responses = outcomes.iter().filter(|o| o.has_response()).count() as u64;
        let total_valid_responses = outcomes.iter().filter(|o| o.is_valid()).count() as u64;

        let harvest = if total_requests == 0 {
            0.0
        } else {
            total_responses as f64 / total_requests as f64 * 100.0
        };
        let yield_pct = if total_responses == 0 {
            0.0
        } else {
            total_valid_responses as f64 / total_responses as f64 * 100.0
        };

        let latency_percentiles = compute_percentiles(&outcomes, &self.execution.quantiles);
        let (min_total_time, mean_total_time, max_total_time) = min_mean_max_total(&outcomes);

        let latest_throughput = self.throughput_series.latest();
        let throughput_bytes_per_sec = latest_throughput.map(|p| p.bytes_per_sec).unwrap_or(0.0);
        let throughput_responses_per_sec =
            latest_throughput.map(|p| p.responses_per_sec).unwrap_or(0.0);

        let (concurrency_avg, concurrency_max) = concurrency_stats(&heartbeats);

        let mut failure_counts: BTreeMap<&'static str, u64> = BTreeMap::new();
        for outcome in &outcomes {
            for failure in &outcome.failures {
                *failure_counts.entry(failure.category()).or_insert(0) += 1;
            }
        }

        let mut stats = AggregatedStats {
            start: self.test_start,
            elapsed: self.test_start.elapsed(),
            total_duration: self.execution.max_execution_time,
            total_requests,
            total_responses,
            total_valid_responses,
            concurrency_avg,
            concurrency_max,
            harvest,
            yield_pct,
            configured_quantiles: self.execution.quantiles.clone(),
            latency_percentiles,
            min_total_time,
            mean_total_time,
            max_total_time,
            throughput_bytes_per_sec,
            throughput_responses_per_sec,
            throughput_series: self.throughput_series.snapshot(),
            failure_counts,
            overall_failure: false,
            failure_description: None,
        };

        let (overall_failure, failure_description) = slo::evaluate(&stats, &self.slo);
        stats.overall_failure = overall_failure;
        stats.failure_description = failure_description;
        stats
    }

    pub fn request_stop(&self) {
        self.stop.fire();
    }
}

/// Computes average/max pool concurrency from a series of heartbeats.
///
/// The average is accumulated as an integer sum of `busy_workers` and
/// truncated by integer division before the final cast to `f64` — a
/// deliberately preserved rounding rule, documented in DESIGN.md, rather
/// than an average of floats.
fn concurrency_stats(heartbeats: &[crate::types::OverallStats]) -> (u64, u64) {
    if heartbeats.is_empty() {
        return (0, 0);
    }
    let sum: u64 = heartbeats.iter().map(|h| h.busy_workers as u64).sum();
    let max = heartbeats.iter().map(|h| h.busy_workers as u64).max().unwrap_or(0);
    let avg = sum / heartbeats.len() as u64;
    (avg, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OverallStats, RequestOutcome};

    fn outcome() -> RequestOutcome {
        let now = Instant::now();
        RequestOutcome {
            start: now,
            finish: now,
            connect_time: Duration::ZERO,
            response_time: Duration::from_millis(10),
            total_time: Duration::from_millis(10),
            request_bytes: 0,
            response_bytes: 0,
            failures: Vec::new(),
        }
    }

    #[test]
    fn concurrency_stats_truncates_average() {
        let heartbeats = vec![
            OverallStats {
                test_start: Instant::now(),
                elapsed: Duration::ZERO,
                configured_total_duration: Duration::ZERO,
                drain_time: Duration::ZERO,
                issued: 0,
                configured_rate: 0.0,
                pool_size: 10,
                busy_workers: 3,
                available_workers: 7,
            },
            OverallStats {
                test_start: Instant::now(),
                elapsed: Duration::ZERO,
                configured_total_duration: Duration::ZERO,
                drain_time: Duration::ZERO,
                issued: 0,
                configured_rate: 0.0,
                pool_size: 10,
                busy_workers: 4,
                available_workers: 6,
            },
        ];
        // (3 + 4) / 2 = 3 (integer division), not 3.5
        let (avg, max) = concurrency_stats(&heartbeats);
        assert_eq!(avg, 3);
        assert_eq!(max, 4);
    }

    #[tokio::test]
    async fn analyze_once_computes_harvest_and_yield() {
        let accumulator = Arc::new(Accumulator::new(0));
        accumulator.outcomes_snapshot();
        let (outcomes_tx, outcomes_rx) = tokio::sync::mpsc::channel(8);
        let (heartbeats_tx, heartbeats_rx) = tokio::sync::mpsc::channel(8);
        let run_task = tokio::spawn(accumulator.clone().run(outcomes_rx, heartbeats_rx));

        for _ in 0..4 {
            outcomes_tx.send(outcome()).await.unwrap();
        }
        heartbeats_tx
            .send(OverallStats {
                test_start: Instant::now(),
                elapsed: Duration::ZERO,
                configured_total_duration: Duration::ZERO,
                drain_time: Duration::ZERO,
                issued: 4,
                configured_rate: 0.0,
                pool_size: 4,
                busy_workers: 0,
                available_workers: 4,
            })
            .await
            .unwrap();
        drop(outcomes_tx);
        drop(heartbeats_tx);
        let _ = run_task.await;

        let analyser = Analyser::new(accumulator, ExecutionConfig::default(), SloConfig::default());
        let stats = analyser.analyze_once();
        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.harvest, 100.0);
        assert_eq!(stats.yield_pct, 100.0);
    }
}
