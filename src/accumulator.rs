//! Appends incoming outcomes and heartbeats to in-memory logs.
//!
//! Two background consumers each drain their own channel into a
//! mutex-guarded append-only `Vec`, holding the lock only for the push
//! itself. Readers (the Analyser) take a full clone of the log under the
//! same short critical section rather than borrow a slice — simpler
//! lifetimes at the cost of an allocation per tick, acceptable given the
//! tick cadence and bounded per-run sample sizes this core targets.

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::signal::OneShot;
use crate::types::{OverallStats, RequestOutcome};

/// Accumulates `RequestOutcome`s and `OverallStats` heartbeats as they
/// arrive, exposing cloned snapshots to the Analyser.
pub struct Accumulator {
    outcomes: Mutex<Vec<RequestOutcome>>,
    heartbeats: Mutex<Vec<OverallStats>>,
    target_count: u64,
    /// Fires once the outcome log reaches `target_count` entries.
    pub done: OneShot,
}

impl Accumulator {
    pub fn new(target_count: u64) -> Self {
        Self {
            outcomes: Mutex::new(Vec::new()),
            heartbeats: Mutex::new(Vec::new()),
            target_count,
            done: OneShot::new(),
        }
    }

    /// Spawns the two consumer loops. Returns once both channels close.
    pub async fn run(
        self: std::sync::Arc<Self>,
        mut outcomes_rx: mpsc::Receiver<RequestOutcome>,
        mut heartbeats_rx: mpsc::Receiver<OverallStats>,
    ) {
        let outcomes_task = {
            let this = self.clone();
            tokio::spawn(async move {
                while let Some(outcome) = outcomes_rx.recv().await {
                    let count = {
                        let mut log = this.outcomes.lock().unwrap();
                        log.push(outcome);
                        log.len() as u64
                    };
                    if this.target_count > 0 && count >= this.target_count {
                        this.done.fire();
                    }
                }
            })
        };

        let heartbeats_task = {
            let this = self.clone();
            tokio::spawn(async move {
                while let Some(heartbeat) = heartbeats_rx.recv().await {
                    this.heartbeats.lock().unwrap().push(heartbeat);
                }
            })
        };

        let _ = tokio::join!(outcomes_task, heartbeats_task);
    }

    /// A cloned snapshot of every outcome recorded so far.
    pub fn outcomes_snapshot(&self) -> Vec<RequestOutcome> {
        self.outcomes.lock().unwrap().clone()
    }

    /// A cloned snapshot of every heartbeat recorded so far.
    pub fn heartbeats_snapshot(&self) -> Vec<OverallStats> {
        self.heartbeats.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Failure;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn sample_outcome() -> RequestOutcome {
        let now = Instant::now();
        RequestOutcome {
            start: now,
            finish: now,
            connect_time: Duration::ZERO,
            response_time: Duration::ZERO,
            total_time: Duration::ZERO,
            request_bytes: 0,
            response_bytes: 0,
            failures: Vec::new(),
        }
    }

    #[tokio::test]
    async fn done_fires_once_target_count_is_reached() {
        let accumulator = Arc::new(Accumulator::new(3));
        let (outcomes_tx, outcomes_rx) = mpsc::channel(8);
        let (heartbeats_tx, heartbeats_rx) = mpsc::channel(8);

        let run_task = tokio::spawn(accumulator.clone().run(outcomes_rx, heartbeats_rx));

        for _ in 0..3 {
            outcomes_tx.send(sample_outcome()).await.unwrap();
        }
        tokio::time::timeout(Duration::from_secs(1), accumulator.done.wait())
            .await
            .expect("done should fire");

        drop(outcomes_tx);
        drop(heartbeats_tx);
        let _ = run_task.await;

        assert_eq!(accumulator.outcomes_snapshot().len(), 3);
    }

    #[tokio::test]
    async fn snapshot_reflects_appended_failures() {
        let accumulator = Arc::new(Accumulator::new(0));
        let (outcomes_tx, outcomes_rx) = mpsc::channel(8);
        let (heartbeats_tx, heartbeats_rx) = mpsc::channel(8);
        let run_task = tokio::spawn(accumulator.clone().run(outcomes_rx, heartbeats_rx));

        let mut failing = sample_outcome();
        failing.failures.push(Failure::TransportError {
            message: "boom".into(),
        });
        outcomes_tx.send(failing).await.unwrap();
        drop(outcomes_tx);
        drop(heartbeats_tx);
        let _ = run_task.await;

        let snapshot = accumulator.outcomes_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot[0].is_valid());
    }
}
