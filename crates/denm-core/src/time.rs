//! Time primitives for the DEN basic service
//!
//! All protocol timestamps are ITS timestamps: milliseconds elapsed since
//! 2004-01-01T00:00:00.000 UTC. Whether "now" comes from the wall clock or a
//! simulated clock is decided by the clock implementation, not by this type.

use std::ops::{Add, Sub};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Milliseconds between the UNIX epoch and the ITS epoch (2004-01-01 UTC)
pub const ITS_EPOCH_UNIX_MS: u64 = 1_072_915_200_000;

/// ITS timestamp in milliseconds since the ITS epoch
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TimestampIts(pub u64);

impl TimestampIts {
    pub const ZERO: TimestampIts = TimestampIts(0);

    #[inline]
    pub fn from_millis(millis: u64) -> Self {
        TimestampIts(millis)
    }

    #[inline]
    pub fn from_secs(secs: u64) -> Self {
        TimestampIts(secs.saturating_mul(1000))
    }

    /// Convert a UNIX timestamp (ms) to ITS time, clamping pre-2004 values to zero
    #[inline]
    pub fn from_unix_millis(unix_ms: u64) -> Self {
        TimestampIts(unix_ms.saturating_sub(ITS_EPOCH_UNIX_MS))
    }

    #[inline]
    pub fn as_millis(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Self {
        TimestampIts(self.0.saturating_add(duration.as_millis() as u64))
    }

    /// Latest instant at which an event detected at `self` is still valid
    #[inline]
    pub fn validity_deadline(self, validity_secs: u32) -> Self {
        TimestampIts(self.0.saturating_add(validity_secs as u64 * 1000))
    }

    /// True when `now` lies strictly past the validity deadline
    #[inline]
    pub fn is_expired(self, validity_secs: u32, now: TimestampIts) -> bool {
        now > self.validity_deadline(validity_secs)
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        TimestampIts(u64::from_le_bytes(bytes))
    }
}

impl Add<Duration> for TimestampIts {
    type Output = TimestampIts;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl Sub<TimestampIts> for TimestampIts {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: TimestampIts) -> Self::Output {
        Duration::from_millis(self.0.saturating_sub(rhs.0))
    }
}

impl std::fmt::Debug for TimestampIts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "its({}ms)", self.0)
    }
}

impl std::fmt::Display for TimestampIts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_conversion() {
        let t = TimestampIts::from_unix_millis(ITS_EPOCH_UNIX_MS + 1500);
        assert_eq!(t.as_millis(), 1500);
        assert_eq!(TimestampIts::from_unix_millis(0), TimestampIts::ZERO);
    }

    #[test]
    fn test_expiry_is_strict() {
        let detection = TimestampIts::from_secs(100);
        assert!(!detection.is_expired(10, TimestampIts::from_secs(110)));
        assert!(detection.is_expired(10, TimestampIts::from_millis(110_001)));
    }

    #[test]
    fn test_difference_saturates() {
        let a = TimestampIts::from_millis(10);
        let b = TimestampIts::from_millis(25);
        assert_eq!(b - a, Duration::from_millis(15));
        assert_eq!(a - b, Duration::ZERO);
    }
}
