//! Clock implementations
//!
//! The engine is agnostic to where "now" comes from. [`SystemClock`] maps
//! wall-clock time onto the ITS epoch; [`ManualClock`] is advanced
//! explicitly and is shared between a simulation and the services it drives.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use denm_core::TimestampIts;

/// Source of the current ITS timestamp
pub trait Clock: Send + Sync {
    fn now(&self) -> TimestampIts;
}

/// Wall-clock time in milliseconds since the ITS epoch
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimestampIts {
        let unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        TimestampIts::from_unix_millis(unix_ms)
    }
}

/// Manually driven clock
///
/// Clones share the same time value.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: TimestampIts) -> Self {
        ManualClock {
            millis: Arc::new(AtomicU64::new(start.as_millis())),
        }
    }

    /// Jump to `time`; the clock never moves backwards
    pub fn set(&self, time: TimestampIts) {
        self.millis.fetch_max(time.as_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, dt: Duration) -> TimestampIts {
        let dt_ms = dt.as_millis() as u64;
        let prev = self.millis.fetch_add(dt_ms, Ordering::SeqCst);
        TimestampIts::from_millis(prev + dt_ms)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> TimestampIts {
        TimestampIts::from_millis(self.millis.load(Ordering::SeqCst))
    }
}
