//! Trailing-edge debounce
//!
//! Rapid UI input (dragging a hue slider) produces a burst of color
//! updates. [`DebounceGate`] delays each one by a quiet interval and lets a
//! newer update replace a pending one, so only the last of a burst is sent.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

/// Default quiet interval
pub const DEFAULT_QUIET_INTERVAL: Duration = Duration::from_millis(100);

const WAITING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

struct Pending {
    handle: JoinHandle<()>,
    state: Arc<AtomicU8>,
}

impl Pending {
    /// Cancel unless the action already started
    fn cancel(self) {
        if self
            .state
            .compare_exchange(WAITING, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.handle.abort();
        }
    }
}

/// Runs only the last action of a burst, after a quiet interval
pub struct DebounceGate {
    quiet: Duration,
    pending: Mutex<Option<Pending>>,
}

impl DebounceGate {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: Mutex::new(None),
        }
    }

    pub fn quiet_interval(&self) -> Duration {
        self.quiet
    }

    /// Replace any pending action with `action`, to run once the quiet
    /// interval elapses without another call. Must be called from within a
    /// tokio runtime.
    pub fn schedule<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let state = Arc::new(AtomicU8::new(WAITING));
        let task_state = state.clone();
        let quiet = self.quiet;

        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            trace!("Debounce: replacing pending action");
            previous.cancel();
        }

        let handle = tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            if task_state
                .compare_exchange(WAITING, FIRED, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                action.await;
            }
        });
        *pending = Some(Pending { handle, state });
    }

    /// Drop the pending action, if it has not started yet
    pub fn cancel(&self) {
        if let Some(pending) = self.pending.lock().take() {
            pending.cancel();
        }
    }

    /// Whether an action is waiting for the quiet interval to pass
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|p| p.state.load(Ordering::SeqCst) == WAITING)
    }
}

impl Default for DebounceGate {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_INTERVAL)
    }
}

impl Drop for DebounceGate {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_single_call_fires_after_interval() {
        let gate = DebounceGate::default();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        gate.schedule(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(gate.is_pending());

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!gate.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_drop() {
        let fired = Arc::new(AtomicUsize::new(0));

        let gate = DebounceGate::default();
        let counter = fired.clone();
        gate.schedule(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        gate.cancel();
        assert!(!gate.is_pending());

        let counter = fired.clone();
        gate.schedule(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(gate);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
