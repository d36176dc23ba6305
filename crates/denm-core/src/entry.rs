//! Originating and receiving table entries
//!
//! Entries are plain values; the service owns the tables and the timers
//! attached to each entry.

use bytes::Bytes;

use crate::{ActionId, Termination, TimestampIts};

/// Lifecycle state of a table entry
///
/// Transitions only go `Active -> Cancelled | Negated`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum EntryStatus {
    #[default]
    Active,
    Cancelled,
    Negated,
}

impl EntryStatus {
    #[inline]
    pub fn is_active(self) -> bool {
        self == EntryStatus::Active
    }

    /// Status implied by a termination marker
    pub fn from_termination(termination: Option<Termination>) -> Self {
        match termination {
            None => EntryStatus::Active,
            Some(Termination::IsCancellation) => EntryStatus::Cancelled,
            Some(Termination::IsNegation) => EntryStatus::Negated,
        }
    }

    /// Termination marker implied by this status
    pub fn termination(self) -> Option<Termination> {
        match self {
            EntryStatus::Active => None,
            EntryStatus::Cancelled => Some(Termination::IsCancellation),
            EntryStatus::Negated => Some(Termination::IsNegation),
        }
    }
}

/// An event this station is currently broadcasting
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OriginatingEntry {
    pub action_id: ActionId,
    /// Last transmitted encoded message
    pub packet: Bytes,
    pub status: EntryStatus,
    pub reference_time: TimestampIts,
}

impl OriginatingEntry {
    pub fn new(action_id: ActionId, packet: Bytes, reference_time: TimestampIts) -> Self {
        OriginatingEntry {
            action_id,
            packet,
            status: EntryStatus::Active,
            reference_time,
        }
    }

    #[inline]
    pub fn termination(&self) -> Option<Termination> {
        self.status.termination()
    }
}

/// An event learned from another station
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivingEntry {
    pub action_id: ActionId,
    /// Last accepted encoded message
    pub packet: Bytes,
    pub status: EntryStatus,
    pub reference_time: TimestampIts,
    pub detection_time: TimestampIts,
    pub termination: Option<Termination>,
}

impl ReceivingEntry {
    pub fn new(
        action_id: ActionId,
        packet: Bytes,
        reference_time: TimestampIts,
        detection_time: TimestampIts,
        termination: Option<Termination>,
    ) -> Self {
        ReceivingEntry {
            action_id,
            packet,
            status: EntryStatus::from_termination(termination),
            reference_time,
            detection_time,
            termination,
        }
    }

    /// Incoming timestamps regress with respect to the stored ones
    pub fn is_stale(&self, reference_time: TimestampIts, detection_time: TimestampIts) -> bool {
        reference_time < self.reference_time || detection_time < self.detection_time
    }

    /// Incoming message carries nothing new (a pure retransmission)
    pub fn is_repetition_of(
        &self,
        reference_time: TimestampIts,
        detection_time: TimestampIts,
        termination: Option<Termination>,
    ) -> bool {
        reference_time == self.reference_time
            && detection_time == self.detection_time
            && termination == self.termination
    }
}
