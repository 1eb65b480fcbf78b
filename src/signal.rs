//! Single-shot notification primitive.
//!
//! The design notes call for "multiple goroutines each closing and
//! signalling on their own done channel, consumed by a central select" to
//! be replaced by a one-fire latch: firing twice is harmless and a waiter
//! that arrives after the fire still observes it immediately.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// A notification that can be fired at most once (subsequent fires are
/// no-ops) and observed any number of times, including after it already
/// fired.
#[derive(Debug, Default)]
pub struct OneShot {
    notify: Notify,
    fired: AtomicBool,
}

impl OneShot {
    pub fn new() -> Self {
        Self {
            notify: Notify::new(),
            fired: AtomicBool::new(false),
        }
    }

    /// Fire the signal. Idempotent: the second and later calls do nothing.
    pub fn fire(&self) {
        if self
            .fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.notify.notify_waiters();
            // Wake any waiter that subscribes after the flag flips but
            // before it calls `notified()` — Notify only wakes currently
            // registered waiters, so we also permit a future `notify_one`.
            self.notify.notify_one();
        }
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Resolves immediately if already fired; otherwise waits for `fire()`.
    pub async fn wait(&self) {
        if self.is_fired() {
            return;
        }
        let notified = self.notify.notified();
        if self.is_fired() {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn fires_and_resolves_waiters() {
        let signal = Arc::new(OneShot::new());
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move {
                signal.wait().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.fire();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn double_fire_is_a_no_op() {
        let signal = OneShot::new();
        signal.fire();
        signal.fire();
        assert!(signal.is_fired());
        // Should resolve immediately, not hang.
        tokio::time::timeout(Duration::from_millis(50), signal.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wait_after_fire_resolves_immediately() {
        let signal = OneShot::new();
        signal.fire();
        tokio::time::timeout(Duration::from_millis(50), signal.wait())
            .await
            .unwrap();
    }
}
