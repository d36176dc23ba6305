//! Presence flags for optional fields
//!
//! Every group of optional fields on the wire is preceded by one presence
//! byte; a cleared bit means the field (or whole container) is absent and
//! nothing else is written for it.

/// Presence bitmap (1 byte)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PresenceFlags(pub u8);

impl PresenceFlags {
    pub const NONE: PresenceFlags = PresenceFlags(0);

    // Management block
    pub const TERMINATION: u8 = 0b0000_0001;
    pub const RELEVANCE_DISTANCE: u8 = 0b0000_0010;
    pub const RELEVANCE_TRAFFIC_DIRECTION: u8 = 0b0000_0100;
    pub const VALIDITY_DURATION: u8 = 0b0000_1000;
    pub const TRANSMISSION_INTERVAL: u8 = 0b0001_0000;
    pub const SITUATION: u8 = 0b0010_0000;
    pub const LOCATION: u8 = 0b0100_0000;
    pub const ALACARTE: u8 = 0b1000_0000;

    #[inline]
    pub fn new(bits: u8) -> Self {
        PresenceFlags(bits)
    }

    #[inline]
    pub fn has(self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    #[inline]
    pub fn set(&mut self, bit: u8, value: bool) {
        if value {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    /// Collect presence bits from a list of (bit, present) pairs
    pub fn from_fields(fields: &[(u8, bool)]) -> Self {
        let mut flags = PresenceFlags::NONE;
        for &(bit, present) in fields {
            flags.set(bit, present);
        }
        flags
    }

    /// Bits set outside `allowed` (a well-formed peer never sends these)
    #[inline]
    pub fn unknown_bits(self, allowed: u8) -> u8 {
        self.0 & !allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear() {
        let mut flags = PresenceFlags::NONE;
        flags.set(PresenceFlags::SITUATION, true);
        flags.set(PresenceFlags::VALIDITY_DURATION, true);
        assert!(flags.has(PresenceFlags::SITUATION));
        assert!(!flags.has(PresenceFlags::LOCATION));

        flags.set(PresenceFlags::SITUATION, false);
        assert!(!flags.has(PresenceFlags::SITUATION));
        assert!(flags.has(PresenceFlags::VALIDITY_DURATION));
    }

    #[test]
    fn test_from_fields() {
        let flags = PresenceFlags::from_fields(&[(0b01, true), (0b10, false), (0b100, true)]);
        assert_eq!(flags.0, 0b101);
        assert_eq!(flags.unknown_bits(0b001), 0b100);
    }
}
