//! Core data model: the values that flow through the pipeline.
//!
//! `RequestOutcome` and `OverallStats` are produced upstream (Requester,
//! Spawner) and consumed downstream (Accumulator, Analyser) by value —
//! nothing here is shared behind a lock once it has been sent on a channel.

use std::time::{Duration, Instant};

use crate::errors::Failure;

/// A snapshot of one completed (or failed) HTTP transaction.
///
/// Created once by a Worker and never mutated after being appended to the
/// Accumulator's outcome log.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub start: Instant,
    pub finish: Instant,
    pub connect_time: Duration,
    pub response_time: Duration,
    pub total_time: Duration,
    pub request_bytes: u64,
    pub response_bytes: u64,
    pub failures: Vec<Failure>,
}

impl RequestOutcome {
    /// True iff no failure in the list is a `TransportError` or
    /// `StatusCodeViolation` — i.e. the outcome is eligible for latency
    /// statistics. Derived, never stored.
    pub fn has_response(&self) -> bool {
        !self.failures.iter().any(|f| {
            matches!(
                f,
                Failure::TransportError { .. } | Failure::StatusCodeViolation { .. }
            )
        })
    }

    /// True iff the outcome carries no failures at all (valid response).
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A periodic heartbeat describing pool and time state, produced by the
/// Spawner on a fixed cadence (see `worker::DEFAULT_HEARTBEAT_INTERVAL`).
#[derive(Debug, Clone)]
pub struct OverallStats {
    pub test_start: Instant,
    pub elapsed: Duration,
    pub configured_total_duration: Duration,
    /// Time since the Spawner stopped admitting new tokens; `Duration::ZERO`
    /// while still admitting.
    pub drain_time: Duration,
    pub issued: u64,
    pub configured_rate: f64,
    pub pool_size: usize,
    pub busy_workers: usize,
    pub available_workers: usize,
}

/// Latency percentiles for one phase (connect, response, or total time),
/// aligned index-for-index with the configured quantile list.
#[derive(Debug, Clone, Default)]
pub struct PhasePercentiles {
    pub connect: Vec<Duration>,
    pub response: Vec<Duration>,
    pub total: Vec<Duration>,
}

/// One point in a rolling throughput series.
#[derive(Debug, Clone, Copy)]
pub struct ThroughputPoint {
    pub at: Instant,
    pub bytes_per_sec: f64,
    pub responses_per_sec: f64,
}

/// A snapshot of the analysis at one tick — the sole output the core
/// hands to the (external) presentation layer.
#[derive(Debug, Clone)]
pub struct AggregatedStats {
    pub start: Instant,
    pub elapsed: Duration,
    pub total_duration: Duration,

    pub total_requests: u64,
    pub total_responses: u64,
    pub total_valid_responses: u64,

    pub concurrency_avg: u64,
    pub concurrency_max: u64,

    pub harvest: f64,
    pub yield_pct: f64,

    /// Index-aligned with the configured quantile list.
    pub configured_quantiles: Vec<f64>,
    pub latency_percentiles: PhasePercentiles,

    pub min_total_time: Duration,
    pub mean_total_time: Duration,
    pub max_total_time: Duration,

    pub throughput_bytes_per_sec: f64,
    pub throughput_responses_per_sec: f64,
    pub throughput_series: Vec<ThroughputPoint>,

    pub failure_counts: std::collections::BTreeMap<&'static str, u64>,

    pub overall_failure: bool,
    pub failure_description: Option<String>,
}
