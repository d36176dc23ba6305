//! Delay scheduler seam and the simulated implementation
//!
//! A scheduler runs a one-shot callback after a relative delay. Cancelling a
//! handle that already fired, or was already cancelled, is a no-op.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use denm_core::TimestampIts;
use parking_lot::Mutex;
use tracing::trace;

use crate::{Clock, ManualClock};

/// Callback run when a timer fires
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Opaque timer handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

/// Delay scheduler
pub trait Scheduler: Send + Sync {
    /// Run `callback` once after `delay`, measured from now
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;

    /// Stop a pending timer (idempotent)
    fn cancel(&self, handle: TimerHandle);
}

struct SimQueue {
    next_id: u64,
    /// (due ms, id); ids break ties in scheduling order
    heap: BinaryHeap<Reverse<(u64, u64)>>,
    callbacks: HashMap<u64, TimerCallback>,
}

impl SimQueue {
    /// Pop the earliest live timer due at or before `deadline`
    fn pop_due(&mut self, deadline: u64) -> Option<(u64, TimerCallback)> {
        while let Some(Reverse((due, id))) = self.heap.peek().copied() {
            if !self.callbacks.contains_key(&id) {
                // cancelled
                self.heap.pop();
                continue;
            }
            if due > deadline {
                return None;
            }
            self.heap.pop();
            return self.callbacks.remove(&id).map(|cb| (due, cb));
        }
        None
    }

    fn next_due(&mut self) -> Option<u64> {
        while let Some(Reverse((due, id))) = self.heap.peek().copied() {
            if self.callbacks.contains_key(&id) {
                return Some(due);
            }
            self.heap.pop();
        }
        None
    }
}

/// Discrete-event scheduler driven by a [`ManualClock`]
///
/// Nothing fires until [`SimScheduler::advance`] or
/// [`SimScheduler::run_until`] is called. Timers fire in due-time order, and
/// in scheduling order for equal due times. The clock is set to each timer's
/// due time before its callback runs, and callbacks run without the queue
/// lock held, so they may schedule or cancel timers themselves.
pub struct SimScheduler {
    clock: ManualClock,
    queue: Mutex<SimQueue>,
}

impl SimScheduler {
    pub fn new(clock: ManualClock) -> Self {
        SimScheduler {
            clock,
            queue: Mutex::new(SimQueue {
                next_id: 0,
                heap: BinaryHeap::new(),
                callbacks: HashMap::new(),
            }),
        }
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    pub fn now(&self) -> TimestampIts {
        self.clock.now()
    }

    /// Advance simulated time by `dt`, firing everything due on the way
    pub fn advance(&self, dt: Duration) -> usize {
        let deadline = self.clock.now().saturating_add(dt);
        self.run_until(deadline)
    }

    /// Fire every timer due at or before `deadline`, then set the clock to it.
    /// Returns the number of callbacks run.
    pub fn run_until(&self, deadline: TimestampIts) -> usize {
        let mut fired = 0;
        loop {
            let next = self.queue.lock().pop_due(deadline.as_millis());
            match next {
                Some((due, callback)) => {
                    self.clock.set(TimestampIts::from_millis(due));
                    trace!(due, "sim timer fired");
                    callback();
                    fired += 1;
                }
                None => break,
            }
        }
        self.clock.set(deadline);
        fired
    }

    /// Number of live (scheduled, not cancelled, not fired) timers
    pub fn pending(&self) -> usize {
        self.queue.lock().callbacks.len()
    }

    /// Due time of the earliest live timer
    pub fn next_due(&self) -> Option<TimestampIts> {
        self.queue.lock().next_due().map(TimestampIts::from_millis)
    }
}

impl Scheduler for SimScheduler {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let due = self.clock.now().saturating_add(delay).as_millis();
        let mut queue = self.queue.lock();
        let id = queue.next_id;
        queue.next_id += 1;
        queue.heap.push(Reverse((due, id)));
        queue.callbacks.insert(id, callback);
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        // Heap entry is discarded lazily when it reaches the top
        self.queue.lock().callbacks.remove(&handle.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sim() -> SimScheduler {
        SimScheduler::new(ManualClock::new(TimestampIts::from_secs(100)))
    }

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) -> TimerCallback) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log2 = log.clone();
        let make = move |tag: u32| -> TimerCallback {
            let log = log2.clone();
            Box::new(move || log.lock().push(tag))
        };
        (log, make)
    }

    #[test]
    fn test_fires_in_due_order() {
        let s = sim();
        let (log, make) = recorder();
        s.schedule(Duration::from_secs(3), make(3));
        s.schedule(Duration::from_secs(1), make(1));
        s.schedule(Duration::from_secs(2), make(2));

        assert_eq!(s.advance(Duration::from_secs(10)), 3);
        assert_eq!(*log.lock(), vec![1, 2, 3]);
        assert_eq!(s.now(), TimestampIts::from_secs(110));
    }

    #[test]
    fn test_equal_due_times_fifo() {
        let s = sim();
        let (log, make) = recorder();
        for tag in 0..5 {
            s.schedule(Duration::from_secs(1), make(tag));
        }
        s.advance(Duration::from_secs(1));
        assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let s = sim();
        let (log, make) = recorder();
        let h = s.schedule(Duration::from_secs(1), make(1));
        s.cancel(h);
        s.cancel(h);
        assert_eq!(s.pending(), 0);

        s.advance(Duration::from_secs(2));
        assert!(log.lock().is_empty());

        // cancelling after fire is also harmless
        let h = s.schedule(Duration::from_secs(1), make(2));
        s.advance(Duration::from_secs(1));
        s.cancel(h);
        assert_eq!(*log.lock(), vec![2]);
    }

    #[test]
    fn test_clock_reads_due_time_inside_callback() {
        let s = Arc::new(sim());
        let seen = Arc::new(Mutex::new(None));
        let (s2, seen2) = (s.clone(), seen.clone());
        s.schedule(
            Duration::from_millis(2500),
            Box::new(move || *seen2.lock() = Some(s2.now())),
        );

        s.advance(Duration::from_secs(5));
        assert_eq!(*seen.lock(), Some(TimestampIts::from_millis(102_500)));
    }

    #[test]
    fn test_callback_can_reschedule() {
        let s = Arc::new(sim());
        let count = Arc::new(Mutex::new(0u32));

        fn tick(s: Arc<SimScheduler>, count: Arc<Mutex<u32>>) {
            *count.lock() += 1;
            let s2 = s.clone();
            s.schedule(Duration::from_secs(1), Box::new(move || tick(s2, count)));
        }

        let (s2, c2) = (s.clone(), count.clone());
        s.schedule(Duration::from_secs(1), Box::new(move || tick(s2, c2)));

        s.advance(Duration::from_secs(4));
        assert_eq!(*count.lock(), 4);
        assert_eq!(s.pending(), 1);
        assert_eq!(s.next_due(), Some(TimestampIts::from_secs(105)));
    }

    proptest::proptest! {
        #[test]
        fn prop_fire_order_matches_due_order(delays in proptest::collection::vec(0u64..10_000, 1..40)) {
            let s = sim();
            let fired = Arc::new(Mutex::new(Vec::new()));
            for (i, d) in delays.iter().enumerate() {
                let fired = fired.clone();
                let d = *d;
                s.schedule(Duration::from_millis(d), Box::new(move || fired.lock().push((d, i))));
            }
            s.advance(Duration::from_secs(10));

            let fired = fired.lock().clone();
            let mut expected = fired.clone();
            expected.sort();
            proptest::prop_assert_eq!(fired.len(), delays.len());
            proptest::prop_assert_eq!(fired, expected);
        }
    }
}
