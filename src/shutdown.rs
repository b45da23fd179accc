//! Process-wide shutdown flag.
//!
//! Set once by the operator (Ctrl-C) and polled by every job between units of
//! work. Nothing is interrupted mid-call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Longest uninterrupted stretch of a shutdown-aware sleep.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Requests shutdown. Idempotent; the flag is never cleared.
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Sleeps for `duration`, waking early once shutdown is requested.
    ///
    /// Returns true if shutdown was observed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + duration;
        loop {
            if self.is_shutting_down() {
                return true;
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(SLEEP_SLICE.min(deadline - now)).await;
        }
    }
}
