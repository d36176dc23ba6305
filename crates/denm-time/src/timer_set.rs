//! Per-entry timers
//!
//! Every originating entry owns a validity, a repetition and a repetition
//! duration timer; every receiving entry owns a validity timer. Each timer is
//! a [`TimerSlot`]:
//! - arming a slot cancels whatever it held before
//! - every arm or cancel bumps the slot epoch
//! - a fire is honoured only if it carries the current epoch
//!
//! The epoch check makes a callback that was already in flight when its timer
//! was cancelled or re-armed a no-op.

use std::time::Duration;

use denm_core::TimestampIts;

use crate::{Scheduler, TimerCallback, TimerHandle};

/// Entry timers; receiving entries only use `Validity`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Deletes the entry
    Validity,
    /// Retransmits the stored packet
    Repetition,
    /// Stops repetition
    RepetitionDuration,
}

/// One independently cancellable timer
#[derive(Debug, Default)]
pub struct TimerSlot {
    handle: Option<TimerHandle>,
    epoch: u64,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a fresh timer, replacing any pending one.
    ///
    /// `make` receives the epoch the callback must present when it fires.
    pub fn arm<F>(&mut self, scheduler: &dyn Scheduler, delay: Duration, make: F) -> u64
    where
        F: FnOnce(u64) -> TimerCallback,
    {
        self.cancel(scheduler);
        self.epoch += 1;
        let epoch = self.epoch;
        self.handle = Some(scheduler.schedule(delay, make(epoch)));
        epoch
    }

    /// Cancel the pending timer, if any (idempotent)
    pub fn cancel(&mut self, scheduler: &dyn Scheduler) {
        if let Some(handle) = self.handle.take() {
            scheduler.cancel(handle);
        }
        self.epoch += 1;
    }

    /// Consume a fire carrying `epoch`; false when the fire is stale
    pub fn fire(&mut self, epoch: u64) -> bool {
        if self.is_current(epoch) {
            self.handle = None;
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn is_current(&self, epoch: u64) -> bool {
        self.handle.is_some() && self.epoch == epoch
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}

/// The three timers of an originating entry
#[derive(Debug, Default)]
pub struct TimerSet {
    pub validity: TimerSlot,
    pub repetition: TimerSlot,
    pub repetition_duration: TimerSlot,
    /// Retransmission period while repetition is running
    pub repetition_interval: Duration,
    /// When the armed repetition timer is due
    pub repetition_due: Option<TimestampIts>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn slot(&self, kind: TimerKind) -> &TimerSlot {
        match kind {
            TimerKind::Validity => &self.validity,
            TimerKind::Repetition => &self.repetition,
            TimerKind::RepetitionDuration => &self.repetition_duration,
        }
    }

    #[cfg(test)]
    fn slot_mut(&mut self, kind: TimerKind) -> &mut TimerSlot {
        match kind {
            TimerKind::Validity => &mut self.validity,
            TimerKind::Repetition => &mut self.repetition,
            TimerKind::RepetitionDuration => &mut self.repetition_duration,
        }
    }

    /// Stop retransmission
    pub fn stop_repetition(&mut self, scheduler: &dyn Scheduler) {
        self.repetition.cancel(scheduler);
        self.repetition_duration.cancel(scheduler);
        self.repetition_due = None;
    }

    /// Cancel all three timers
    pub fn cancel_all(&mut self, scheduler: &dyn Scheduler) {
        self.validity.cancel(scheduler);
        self.stop_repetition(scheduler);
    }

    /// True when no timer is pending
    pub fn is_idle(&self) -> bool {
        !self.validity.is_armed() && !self.repetition.is_armed() && !self.repetition_duration.is_armed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ManualClock, SimScheduler};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn sim() -> SimScheduler {
        SimScheduler::new(ManualClock::new(TimestampIts::ZERO))
    }

    #[test]
    fn test_arm_replaces_previous_timer() {
        let s = sim();
        let mut slot = TimerSlot::new();
        let fired = Arc::new(Mutex::new(Vec::new()));

        let f = fired.clone();
        let first = slot.arm(&s, Duration::from_secs(1), move |e| {
            Box::new(move || f.lock().push(e))
        });
        let f = fired.clone();
        let second = slot.arm(&s, Duration::from_secs(2), move |e| {
            Box::new(move || f.lock().push(e))
        });

        assert_ne!(first, second);
        assert_eq!(s.pending(), 1);
        s.advance(Duration::from_secs(3));
        assert_eq!(*fired.lock(), vec![second]);
    }

    #[test]
    fn test_stale_fire_rejected() {
        let s = sim();
        let mut slot = TimerSlot::new();
        let epoch = slot.arm(&s, Duration::from_secs(1), |_| Box::new(|| {}));

        slot.cancel(&s);
        assert!(!slot.fire(epoch));

        let epoch = slot.arm(&s, Duration::from_secs(1), |_| Box::new(|| {}));
        assert!(slot.fire(epoch));
        // second fire with the same epoch is stale
        assert!(!slot.fire(epoch));
        assert!(!slot.is_armed());
    }

    #[test]
    fn test_cancel_all() {
        let s = sim();
        let mut set = TimerSet::new();
        for kind in [TimerKind::Validity, TimerKind::Repetition, TimerKind::RepetitionDuration] {
            set.slot_mut(kind)
                .arm(&s, Duration::from_secs(5), |_| Box::new(|| {}));
        }
        set.repetition_due = Some(TimestampIts::from_secs(5));
        assert_eq!(s.pending(), 3);
        assert!(!set.is_idle());

        set.cancel_all(&s);
        set.cancel_all(&s);
        assert_eq!(s.pending(), 0);
        assert!(set.is_idle());
        assert!(set.repetition_due.is_none());
        assert!(!set.slot(TimerKind::Validity).is_armed());
    }
}
