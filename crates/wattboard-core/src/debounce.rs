//! Trailing-edge debouncing of filter changes.
//!
//! A burst of changes (typing a date, clicking through a dropdown) should
//! produce one fetch, for the last value, after a quiet period. Each call to
//! [`DebounceScheduler::schedule`] cancels whatever was pending; only the
//! most recently scheduled action can ever fire.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::trace;

/// Delays actions until no newer action has been scheduled for `delay`.
///
/// Dropping the scheduler cancels the pending action.
#[derive(Debug)]
pub struct DebounceScheduler {
    delay: Duration,
    /// Token of the action still waiting. A token leaves this slot only
    /// after being cancelled or when its action fires.
    pending: Arc<Mutex<Option<CancellationToken>>>,
    timers: TaskTracker,
}

fn lock_slot(slot: &Mutex<Option<CancellationToken>>) -> MutexGuard<'_, Option<CancellationToken>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DebounceScheduler {
    /// Create a scheduler with the given quiet period.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(None)),
            timers: TaskTracker::new(),
        }
    }

    /// The quiet period.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn pending(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        lock_slot(&self.pending)
    }

    /// Schedule `action`, cancelling any action still waiting.
    ///
    /// With `fire_immediately`, `action` runs synchronously before this
    /// returns (used for the first institution selection so the operator
    /// is not kept waiting). Otherwise it runs on a Tokio task once the quiet
    /// period elapses without another call.
    ///
    /// Must be called from within a Tokio runtime unless `fire_immediately`
    /// is set.
    pub fn schedule<F>(&self, fire_immediately: bool, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut pending = self.pending();
        if let Some(previous) = pending.take() {
            trace!("Debounce: superseding pending action");
            previous.cancel();
        }

        if fire_immediately {
            drop(pending);
            action();
            return;
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let slot = Arc::clone(&self.pending);
        let delay = self.delay;
        self.timers.spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    // Still uncancelled under the lock means the slot holds
                    // this token.
                    let fired = {
                        let mut pending = lock_slot(&slot);
                        !cancelled.is_cancelled() && pending.take().is_some()
                    };
                    if fired {
                        action();
                    }
                }
            }
        });
        *pending = Some(token);
    }

    /// Cancel the pending action, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match self.pending().take() {
            Some(token) => {
                let was_pending = !token.is_cancelled();
                token.cancel();
                was_pending
            }
            None => false,
        }
    }

    /// Whether an action is waiting for its quiet period to elapse.
    pub fn is_pending(&self) -> bool {
        !self.timers.is_empty()
    }

    /// Wait until no timer is outstanding (fired or cancelled).
    pub async fn wait_idle(&self) {
        self.timers.close();
        self.timers.wait().await;
        self.timers.reopen();
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        if let Some(token) = self.pending().take() {
            token.cancel();
        }
    }
}
