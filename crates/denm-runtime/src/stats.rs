//! Service counters

use crate::DropReason;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub triggers: u64,
    pub updates: u64,
    pub terminations: u64,
    /// Messages handed to the transport, repetitions included
    pub transmissions: u64,
    pub transmit_failures: u64,
    pub repetitions: u64,
    pub originating_expired: u64,
    pub received: u64,
    pub receiving_expired: u64,
    pub dropped_wrong_message_id: u64,
    pub dropped_not_ready: u64,
    pub dropped_malformed: u64,
    pub dropped_own_message: u64,
    pub dropped_expired: u64,
    pub dropped_unknown_termination: u64,
    pub dropped_stale: u64,
    pub dropped_duplicate: u64,
    pub dropped_already_terminated: u64,
}

impl ServiceStats {
    pub(crate) fn record_drop(&mut self, reason: DropReason) {
        let counter = match reason {
            DropReason::WrongMessageId => &mut self.dropped_wrong_message_id,
            DropReason::NotReady => &mut self.dropped_not_ready,
            DropReason::Malformed => &mut self.dropped_malformed,
            DropReason::OwnMessage => &mut self.dropped_own_message,
            DropReason::Expired => &mut self.dropped_expired,
            DropReason::UnknownTermination => &mut self.dropped_unknown_termination,
            DropReason::Stale => &mut self.dropped_stale,
            DropReason::Duplicate => &mut self.dropped_duplicate,
            DropReason::AlreadyTerminated => &mut self.dropped_already_terminated,
        };
        *counter += 1;
    }

    /// All receive-side drops
    pub fn dropped(&self) -> u64 {
        self.dropped_wrong_message_id
            + self.dropped_not_ready
            + self.dropped_malformed
            + self.dropped_own_message
            + self.dropped_expired
            + self.dropped_unknown_termination
            + self.dropped_stale
            + self.dropped_duplicate
            + self.dropped_already_terminated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_drop() {
        let mut stats = ServiceStats::default();
        stats.record_drop(DropReason::Duplicate);
        stats.record_drop(DropReason::Duplicate);
        stats.record_drop(DropReason::Stale);
        assert_eq!(stats.dropped_duplicate, 2);
        assert_eq!(stats.dropped_stale, 1);
        assert_eq!(stats.dropped(), 3);
    }
}
