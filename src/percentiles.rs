//! Exact percentile computation over a sorted sample.
//!
//! Rather than an approximate histogram with bounded memory, this sorts
//! the response-bearing sample fresh on every analysis tick and indexes
//! it directly, so every reported percentile lands exactly on an observed
//! duration. Ticks run on a hundreds-of-milliseconds cadence over a
//! bounded accumulator snapshot, so the repeated sort is cheap relative
//! to the network I/O it is measuring.

use std::time::Duration;

use crate::types::{PhasePercentiles, RequestOutcome};

/// Index into a sorted, zero-based sample of length `n` for quantile `p`.
///
/// `ceil((n - 1) * p)` — an inclusive rank, not an interpolation between
/// adjacent samples.
fn quantile_index(n: usize, p: f64) -> usize {
    debug_assert!((0.0..=1.0).contains(&p));
    if n == 0 {
        return 0;
    }
    (((n - 1) as f64) * p).ceil() as usize
}

/// Computes one quantile array over an already-sorted sample.
fn quantiles_of(sorted: &[Duration], quantiles: &[f64]) -> Vec<Duration> {
    if sorted.is_empty() {
        return Vec::new();
    }
    quantiles
        .iter()
        .map(|p| sorted[quantile_index(sorted.len(), *p).min(sorted.len() - 1)])
        .collect()
}

/// Computes connect/response/total percentiles over every outcome that
/// `has_response()` — transport errors and status violations carry no
/// meaningful latency sample.
pub fn compute_percentiles(outcomes: &[RequestOutcome], quantiles: &[f64]) -> PhasePercentiles {
    let mut connect: Vec<Duration> = Vec::new();
    let mut response: Vec<Duration> = Vec::new();
    let mut total: Vec<Duration> = Vec::new();

    for outcome in outcomes.iter().filter(|o| o.has_response()) {
        connect.push(outcome.connect_time);
        response.push(outcome.response_time);
        total.push(outcome.total_time);
    }

    connect.sort_unstable();
    response.sort_unstable();
    total.sort_unstable();

    PhasePercentiles {
        connect: quantiles_of(&connect, quantiles),
        response: quantiles_of(&response, quantiles),
        total: quantiles_of(&total, quantiles),
    }
}

/// Min/mean/max total-time across response-bearing outcomes. Returns
/// zeros when no such outcome exists yet.
pub fn min_mean_max_total(outcomes: &[RequestOutcome]) -> (Duration, Duration, Duration) {
    let samples: Vec<Duration> = outcomes
        .iter()
        .filter(|o| o.has_response())
        .map(|o| o.total_time)
        .collect();

    if samples.is_empty() {
        return (Duration::ZERO, Duration::ZERO, Duration::ZERO);
    }

    let min = *samples.iter().min().unwrap();
    let max = *samples.iter().max().unwrap();
    let total_nanos: u128 = samples.iter().map(|d| d.as_nanos()).sum();
    let mean = Duration::from_nanos((total_nanos / samples.len() as u128) as u64);

    (min, mean, max)
}
