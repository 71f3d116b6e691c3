//! Worker lifecycle hooks and the stop handle.

use crate::identity::WorkerId;
use crate::signals;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Granularity of interruptible sleeps.
const SLEEP_STEP: Duration = Duration::from_millis(50);

/// Caller hooks invoked around the claim loop. Every method defaults to the
/// plain behavior, so implement only what you need.
pub trait WorkerHooks {
    /// Called once after the worker has its identity, before the first claim.
    fn begin(&mut self, _worker: WorkerId) {}

    /// Back off while every remaining task is held by a live peer.
    ///
    /// The default sleeps for `backoff`, returning early if `stop` fires.
    fn wait(&mut self, _worker: WorkerId, backoff: Duration, stop: &StopHandle) {
        stop.sleep(backoff);
    }

    /// Called once when the queue is exhausted.
    fn end(&mut self, _worker: WorkerId) {}
}

/// Hooks that keep every default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl WorkerHooks for NoHooks {}

/// Cloneable flag asking a running worker to stop after its current task.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
    signals: bool,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that also reports SIGINT/SIGTERM seen by [`crate::signals`].
    pub fn with_signals() -> Self {
        Self {
            flag: Arc::default(),
            signals: true,
        }
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || (self.signals && signals::interrupted())
    }

    /// Sleep for `duration` in short steps, returning early once stopped.
    pub fn sleep(&self, duration: Duration) {
        let until = Instant::now() + duration;
        while !self.is_stopped() {
            let now = Instant::now();
            if now >= until {
                return;
            }
            thread::sleep(SLEEP_STEP.min(until - now));
        }
    }
}
