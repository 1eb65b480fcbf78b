//! Ramp-to-failure rate policy.
//!
//! Deciding how fast the offered rate grows, tick over tick, in
//! ramp-to-failure mode: a fixed additive step per one-second tick. The
//! growth curve is a deliberate, documented choice (see DESIGN.md) rather
//! than one of several possible policies (linear, geometric, externally
//! parameterised) left unstated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampPolicy {
    /// Requests/sec offered on the very first tick.
    pub initial_rate: f64,
    /// Additive increase applied every subsequent tick.
    pub step: f64,
}

impl RampPolicy {
    pub fn new(initial_rate: f64, step: f64) -> Self {
        Self { initial_rate, step }
    }

    /// Target rate at a given 1-second tick index (0-based).
    ///
    /// Monotonically non-decreasing in `tick` whenever `step >= 0`, so the
    /// offered rate at heartbeat k+1 is always >= the rate at heartbeat k.
    pub fn rate_at_tick(&self, tick: u64) -> f64 {
        self.initial_rate + self.step * tick as f64
    }

    /// Number of tokens to submit on this tick: `ceil(rate)`.
    pub fn burst_at_tick(&self, tick: u64) -> u64 {
        self.rate_at_tick(tick).ceil().max(0.0) as u64
    }
}
