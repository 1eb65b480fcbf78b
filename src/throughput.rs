//! Sliding-window throughput calculation.
//!
//! Rather than dividing total bytes/responses by total elapsed time
//! (which smooths out spikes and stalls into a running average),
//! throughput is recomputed every tick from only the outcomes that
//! finished within the last `window`.

use std::time::{Duration, Instant};

use crate::types::{RequestOutcome, ThroughputPoint};

/// Computes one throughput point from outcomes finishing within
/// `[now - window, now]`.
pub fn compute_throughput_point(
    outcomes: &[RequestOutcome],
    now: Instant,
    window: Duration,
) -> ThroughputPoint {
    let window_start = now.checked_sub(window).unwrap_or(now);

    let mut bytes: u64 = 0;
    let mut responses: u64 = 0;

    for outcome in outcomes {
        if outcome.finish >= window_start && outcome.finish <= now && outcome.has_response() {
            bytes += outcome.response_bytes;
            responses += 1;
        }
    }

    let window_secs = window.as_secs_f64().max(f64::EPSILON);
    ThroughputPoint {
        at: now,
        bytes_per_sec: bytes as f64 / window_secs,
        responses_per_sec: responses as f64 / window_secs,
    }
}

/// A rolling series of throughput points, appended to on each analysis
/// tick and handed out whole in `AggregatedStats::throughput_series`.
#[derive(Debug, Default)]
pub struct ThroughputSeries {
    points: std::sync::Mutex<Vec<ThroughputPoint>>,
}

impl ThroughputSeries {
    pub fn new() -> Self {
        Self {
            points: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, point: ThroughputPoint) {
        self.points.lock().unwrap().push(point);
    }

    /// A cloned snapshot of every point recorded so far.
    pub fn snapshot(&self) -> Vec<ThroughputPoint> {
        self.points.lock().unwrap().clone()
    }

    /// The most recent point, if any.
    pub fn latest(&self) -> Option<ThroughputPoint> {
        self.points.lock().unwrap().last().copied()
    }
}
