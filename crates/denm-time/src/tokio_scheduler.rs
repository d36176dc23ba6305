//! Tokio-based scheduler
//!
//! Each timer is a tokio task that sleeps for the requested delay and then
//! runs its callback. Cancelling aborts the task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::{Scheduler, TimerCallback, TimerHandle};

/// Scheduler backed by tokio timers
pub struct TokioScheduler {
    runtime: Handle,
    next_id: AtomicU64,
    /// Active timers (id -> task handle)
    timers: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
}

impl TokioScheduler {
    /// Create a scheduler spawning onto `runtime`
    pub fn new(runtime: Handle) -> Self {
        TokioScheduler {
            runtime,
            next_id: AtomicU64::new(0),
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a scheduler on the runtime of the calling task
    ///
    /// Returns `None` outside a tokio runtime.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Cancel all timers.
    ///
    /// Called during shutdown.
    pub fn cancel_all(&self) {
        for (id, handle) in self.timers.lock().drain() {
            handle.abort();
            trace!(id, "timer cancelled (shutdown)");
        }
    }

    /// Number of timers that have neither fired nor been cancelled
    pub fn active_count(&self) -> usize {
        self.timers.lock().len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let timers = self.timers.clone();

        // Held across spawn + insert so a zero-delay task cannot remove its
        // entry before it exists
        let mut active = self.timers.lock();
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if timers.lock().remove(&id).is_none() {
                return;
            }
            trace!(id, "timer fired");
            callback();
        });
        active.insert(id, handle);
        debug!(id, ?delay, "timer set");

        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        if let Some(task) = self.timers.lock().remove(&handle.0) {
            task.abort();
            trace!(id = handle.0, "timer cancelled");
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn sender_callback(tx: mpsc::UnboundedSender<u32>, tag: u32) -> TimerCallback {
        Box::new(move || {
            let _ = tx.send(tag);
        })
    }

    #[tokio::test]
    async fn test_timer_fires() {
        let scheduler = TokioScheduler::current().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        scheduler.schedule(Duration::from_millis(10), sender_callback(tx, 7));

        let tag = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("timeout")
            .expect("channel closed");
        assert_eq!(tag, 7);
        assert_eq!(scheduler.active_count(), 0);
    }

    #[tokio::test]
    async fn test_timer_cancel() {
        let scheduler = TokioScheduler::current().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = scheduler.schedule(Duration::from_millis(50), sender_callback(tx, 1));
        scheduler.cancel(handle);
        scheduler.cancel(handle);

        let result = tokio::time::timeout(Duration::from_millis(150), rx.recv()).await;
        assert!(
            matches!(result, Err(_) | Ok(None)),
            "timer should have been cancelled"
        );
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let scheduler = TokioScheduler::current().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        for tag in 0..3 {
            scheduler.schedule(Duration::from_millis(50), sender_callback(tx.clone(), tag));
        }
        drop(tx);
        assert_eq!(scheduler.active_count(), 3);

        scheduler.cancel_all();
        assert_eq!(scheduler.active_count(), 0);

        let result = tokio::time::timeout(Duration::from_millis(150), rx.recv()).await;
        assert!(matches!(result, Err(_) | Ok(None)));
    }
}
