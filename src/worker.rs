//! Worker pool and Spawner: the pacing engine.
//!
//! A fixed pool of workers pulls tokens off a shared queue and reports
//! back on a results channel; a ticker drives pacing and heartbeats. The
//! token queue wants unbuffered handoff — a token handed directly from
//! producer to a waiting consumer, not queued ahead of it. Tokio's
//! `mpsc::channel` has no zero-capacity mode, so this uses a capacity-1
//! channel shared by all workers behind a mutex: `send` still blocks
//! until some idle worker is ready to `recv`, preserving that coupling.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::debug;

use crate::config::{ExecutionConfig, Mode};
use crate::requester::Requester;
use crate::signal::OneShot;
use crate::types::{OverallStats, RequestOutcome};

/// Default cadence for `OverallStats` heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

/// Drives a fixed-size worker pool against a token queue, paced per the
/// configured `Mode`, and emits periodic `OverallStats` heartbeats.
pub struct Spawner {
    config: ExecutionConfig,
    busy_flags: Vec<Arc<AtomicBool>>,
    issued: Arc<AtomicUsize>,
    test_start: Instant,
    draining_since: std::sync::Mutex<Option<Instant>>,
    pub stop: OneShot,
    pub done: OneShot,
}

impl Spawner {
    /// Builds the pool and starts its worker tasks, plus the background
    /// pacing/heartbeat loop. Returns the spawner handle, the receiving
    /// end of the outcome channel, and the receiving end of the heartbeat
    /// channel.
    pub fn start(
        config: ExecutionConfig,
        requester_factory: impl Fn() -> Requester + Send + Sync + 'static,
    ) -> (
        Arc<Self>,
        mpsc::Receiver<RequestOutcome>,
        mpsc::Receiver<OverallStats>,
    ) {
        let concurrency = config.concurrency.max(1);
        let (tokens_tx, tokens_rx) = mpsc::channel::<()>(1);
        let (outcomes_tx, outcomes_rx) = mpsc::channel::<RequestOutcome>(concurrency * 4);
        let (heartbeats_tx, heartbeats_rx) = mpsc::channel::<OverallStats>(16);

        let shared_rx = Arc::new(tokio::sync::Mutex::new(tokens_rx));
        let mut busy_flags = Vec::with_capacity(concurrency);
        let requester_factory = Arc::new(requester_factory);

        for id in 0..concurrency {
            let busy = Arc::new(AtomicBool::new(false));
            busy_flags.push(busy.clone());
            let requester = Arc::new(requester_factory());
            let shared_rx = shared_rx.clone();
            let outcomes_tx = outcomes_tx.clone();
            tokio::spawn(async move {
                loop {
                    let token = {
                        let mut rx = shared_rx.lock().await;
                        rx.recv().await
                    };
                    if token.is_none() {
                        break;
                    }
                    busy.store(true, Ordering::SeqCst);
                    let outcome = requester.execute().await;
                    busy.store(false, Ordering::SeqCst);
                    if outcomes_tx.send(outcome).await.is_err() {
                        break;
                    }
                }
                debug!(worker_id = id, "worker exiting");
            });
        }

        let spawner = Arc::new(Self {
            config: config.clone(),
            busy_flags,
            issued: Arc::new(AtomicUsize::new(0)),
            test_start: Instant::now(),
            draining_since: std::sync::Mutex::new(None),
            stop: OneShot::new(),
            done: OneShot::new(),
        });

        let pacing = spawner.clone();
        tokio::spawn(async move {
            pacing.pace_and_heartbeat(heartbeats_tx, tokens_tx).await;
        });

        (spawner, outcomes_rx, heartbeats_rx)
    }

    /// The pacing loop: admits tokens according to `Mode`, ticks
    /// heartbeats, and honors `stop`/the configured max execution time.
    ///
    /// `tokens_tx` is owned by this call, not the `Spawner` struct: when
    /// the loop below exits, dropping it here closes the token queue for
    /// every worker's `recv()`, regardless of how many `Arc<Spawner>`
    /// handles a caller still holds. If the sender instead lived on
    /// `self`, a caller holding `Arc<Spawner>` past shutdown would keep
    /// the queue open and every worker (and the accumulator waiting on
    /// their outcome senders to drop) would block forever.
    async fn pace_and_heartbeat(
        self: Arc<Self>,
        heartbeats_tx: mpsc::Sender<OverallStats>,
        tokens_tx: mpsc::Sender<()>,
    ) {
        let mut heartbeat_ticker = interval(DEFAULT_HEARTBEAT_INTERVAL);
        let mut rate_ticker = interval(Duration::from_secs(1));
        let deadline = self.test_start + self.config.max_execution_time;
        let mut tick: u64 = 0;

        loop {
            if self.stop.is_fired() {
                break;
            }
            if Instant::now() >= deadline {
                self.begin_drain();
                break;
            }
            if self.config.mode != Mode::Fail
                && self.issued.load(Ordering::SeqCst) as u64 >= self.config.requests_to_issue
            {
                self.begin_drain();
                break;
            }

            tokio::select! {
                _ = heartbeat_ticker.tick() => {
                    let stats = self.snapshot();
                    let _ = heartbeats_tx.try_send(stats);
                }
                _ = rate_ticker.tick(), if self.config.mode == Mode::Fail => {
                    let burst = self.config.ramp.burst_at_tick(tick);
                    tick += 1;
                    for _ in 0..burst {
                        if tokens_tx.try_send(()).is_ok() {
                            self.issued.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                }
                _ = Self::admit_one(&tokens_tx), if self.config.mode != Mode::Fail => {
                    self.issued.fetch_add(1, Ordering::SeqCst);
                }
                _ = self.stop.wait() => break,
            }
        }

        self.begin_drain();
        let stats = self.snapshot();
        let _ = heartbeats_tx.send(stats).await;
        // Dropping `tokens_tx` here (end of scope) closes the token queue
        // so every worker's `recv()` returns `None` and the worker tasks
        // exit, dropping their `outcomes_tx` clones in turn.
        self.done.fire();
    }

    /// Admits exactly one token, blocking until a worker is free to take
    /// it. This is how Scale/Validate mode keeps the pool saturated
    /// without an explicit rate.
    async fn admit_one(tokens_tx: &mpsc::Sender<()>) {
        let _ = tokens_tx.send(()).await;
    }

    fn begin_drain(&self) {
        let mut guard = self.draining_since.lock().unwrap();
        if guard.is_none() {
            *guard = Some(Instant::now());
        }
    }

    fn snapshot(&self) -> OverallStats {
        let busy_workers = self.busy_flags.iter().filter(|b| b.load(Ordering::SeqCst)).count();
        let pool_size = self.busy_flags.len();
        let drain_time = self
            .draining_since
            .lock()
            .unwrap()
            .map(|since| since.elapsed())
            .unwrap_or(Duration::ZERO);

        OverallStats {
            test_start: self.test_start,
            elapsed: self.test_start.elapsed(),
            configured_total_duration: self.config.max_execution_time,
            drain_time,
            issued: self.issued.load(Ordering::SeqCst) as u64,
            configured_rate: match self.config.mode {
                Mode::Fail => self.config.ramp.initial_rate,
                _ => self.config.concurrency as f64,
            },
            pool_size,
            busy_workers,
            available_workers: pool_size.saturating_sub(busy_workers),
        }
    }

    /// Idempotently signals the pacing loop to stop admitting new tokens.
    pub fn request_stop(&self) {
        self.stop.fire();
    }

    /// A final snapshot after the pool has drained, per the shutdown
    /// protocol's cleanup step. The pacing loop already pushes its own
    /// final heartbeat onto the channel when it exits; this is for a
    /// caller that wants one more synchronous read on the way out.
    pub fn cleanup(&self) -> OverallStats {
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RequestSpec;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn echo_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn scale_mode_issues_exact_request_count() {
        let server = echo_server().await;
        let url = server.uri();
        let mut config = ExecutionConfig::default();
        config.mode = Mode::Scale;
        config.concurrency = 4;
        config.requests_to_issue = 20;
        config.max_execution_time = Duration::from_secs(10);

        let (spawner, mut outcomes_rx, _heartbeats_rx) = Spawner::start(config, move || {
            Requester::new(
                reqwest::Client::new(),
                RequestSpec {
                    url: url.clone(),
                    ..Default::default()
                },
                None,
            )
        });

        let mut count = 0;
        while count < 20 {
            match tokio::time::timeout(Duration::from_secs(5), outcomes_rx.recv()).await {
                Ok(Some(_)) => count += 1,
                _ => break,
            }
        }
        assert_eq!(count, 20);
        spawner.request_stop();
    }

    #[tokio::test]
    async fn ramp_mode_grows_issued_rate_over_ticks() {
        let server = echo_server().await;
        let url = server.uri();
        let mut config = ExecutionConfig::default();
        config.mode = Mode::Fail;
        config.concurrency = 50;
        config.ramp = crate::load_models::RampPolicy::new(5.0, 5.0);
        config.max_execution_time = Duration::from_secs(3);

        let (spawner, mut outcomes_rx, mut heartbeats_rx) = Spawner::start(config, move || {
            Requester::new(
                reqwest::Client::new(),
                RequestSpec {
                    url: url.clone(),
                    ..Default::default()
                },
                None,
            )
        });

        let mut seen = 0;
        let _ = tokio::time::timeout(Duration::from_millis(1500), async {
            while let Some(_) = outcomes_rx.recv().await {
                seen += 1;
                if seen > 5 {
                    break;
                }
            }
        })
        .await;
        assert!(seen > 0);

        let _ = tokio::time::timeout(Duration::from_millis(200), heartbeats_rx.recv()).await;
        spawner.request_stop();
    }
}
