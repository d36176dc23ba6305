//! Receiving side: acceptance, deduplication and aging
//!
//! Inbound traffic has no one to report errors to, so every rejection is a
//! logged drop described by a [`DropReason`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use denm_core::{ActionId, EventData, ReceivingEntry};
use denm_time::TimerKind;
use denm_transport::LinkAddress;
use denm_wire::is_denm;

use crate::service::ServiceCore;

/// Why an inbound message was not accepted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// Payload is not tagged as a DENM
    WrongMessageId,
    /// Station identity not configured yet
    NotReady,
    /// Decoding failed
    Malformed,
    /// Sent by this station
    OwnMessage,
    /// Validity already elapsed on arrival
    Expired,
    /// Termination for an event never seen
    UnknownTermination,
    /// Reference or detection time went backwards
    Stale,
    /// Nothing new compared to the stored entry
    Duplicate,
    /// Non-terminating message for a terminated event
    AlreadyTerminated,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::WrongMessageId => "wrong message id",
            DropReason::NotReady => "not ready",
            DropReason::Malformed => "malformed",
            DropReason::OwnMessage => "own message",
            DropReason::Expired => "expired",
            DropReason::UnknownTermination => "termination of unknown event",
            DropReason::Stale => "stale",
            DropReason::Duplicate => "duplicate",
            DropReason::AlreadyTerminated => "already terminated",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of processing one inbound payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Accepted, stored and delivered to the callback
    Delivered(Box<EventData>),
    Dropped(DropReason),
}

impl ReceiveOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, ReceiveOutcome::Delivered(_))
    }

    pub fn drop_reason(&self) -> Option<DropReason> {
        match self {
            ReceiveOutcome::Dropped(reason) => Some(*reason),
            ReceiveOutcome::Delivered(_) => None,
        }
    }

    pub fn event_data(&self) -> Option<&EventData> {
        match self {
            ReceiveOutcome::Delivered(data) => Some(data),
            ReceiveOutcome::Dropped(_) => None,
        }
    }
}

impl ServiceCore {
    pub(crate) fn receive(self: &Arc<Self>, payload: &[u8], from: LinkAddress) -> ReceiveOutcome {
        match self.accept(payload) {
            Ok(data) => {
                self.stats.lock().received += 1;
                let callback = self.callback.read().clone();
                if let Some(callback) = callback {
                    callback(&data, from);
                }
                ReceiveOutcome::Delivered(Box::new(data))
            }
            Err(reason) => {
                match reason {
                    DropReason::Malformed | DropReason::Expired => {
                        warn!(%from, "dropping message: {}", reason)
                    }
                    DropReason::Duplicate | DropReason::OwnMessage => {
                        trace!(%from, "dropping message: {}", reason)
                    }
                    _ => debug!(%from, "dropping message: {}", reason),
                }
                self.stats.lock().record_drop(reason);
                ReceiveOutcome::Dropped(reason)
            }
        }
    }

    /// Validate and store; returns the data to deliver
    fn accept(self: &Arc<Self>, payload: &[u8]) -> Result<EventData, DropReason> {
        if !is_denm(payload) {
            return Err(DropReason::WrongMessageId);
        }
        let (own_station, _) = self.ready().map_err(|_| DropReason::NotReady)?;

        let msg = self.codec.decode(payload).map_err(|e| {
            debug!("decode failed: {}", e);
            DropReason::Malformed
        })?;
        if msg.header.station_id == own_station {
            return Err(DropReason::OwnMessage);
        }
        let data = msg.to_event_data().map_err(|_| DropReason::Malformed)?;

        let mgmt = &msg.management;
        let action_id = mgmt.action_id;
        let validity_secs = mgmt.validity_duration();
        let now = self.now();
        if mgmt.detection_time.is_expired(validity_secs, now) {
            return Err(DropReason::Expired);
        }

        let mut table = self.receiving.lock();
        match table.get(&action_id) {
            None if mgmt.termination.is_some() => return Err(DropReason::UnknownTermination),
            None => debug!(%action_id, "new event received"),
            Some(slot) => {
                let stored = &slot.entry;
                if stored.is_stale(mgmt.reference_time, mgmt.detection_time) {
                    return Err(DropReason::Stale);
                }
                if stored.is_repetition_of(mgmt.reference_time, mgmt.detection_time, mgmt.termination)
                {
                    return Err(DropReason::Duplicate);
                }
                if !stored.status.is_active() && mgmt.termination.is_none() {
                    return Err(DropReason::AlreadyTerminated);
                }
                debug!(%action_id, termination = ?mgmt.termination, "event refreshed");
            }
        }

        let slot = table.upsert(ReceivingEntry::new(
            action_id,
            Bytes::copy_from_slice(payload),
            mgmt.reference_time,
            mgmt.detection_time,
            mgmt.termination,
        ));
        slot.validity.arm(
            self.scheduler(),
            Duration::from_secs(validity_secs as u64),
            |epoch| {
                self.timer_callback(
                    action_id,
                    TimerKind::Validity,
                    epoch,
                    ServiceCore::on_receiving_expired,
                )
            },
        );

        Ok(data)
    }

    fn on_receiving_expired(self: &Arc<Self>, action_id: ActionId, epoch: u64) {
        let mut table = self.receiving.lock();
        let Some(slot) = table.get_mut(&action_id) else {
            return;
        };
        if !slot.validity.fire(epoch) {
            trace!(%action_id, "stale receiving validity fire");
            return;
        }
        table.remove(&action_id);
        drop(table);

        self.stats.lock().receiving_expired += 1;
        debug!(%action_id, "receiving entry expired");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{event_at, from_station, Station, T0};
    use crate::ServiceConfig;
    use denm_core::{EntryStatus, StationId, Termination};
    use denm_wire::{BinaryCodec, Codec};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Station 1 announces an event that station 2 listens to
    fn pair() -> (Station, Station, ActionId) {
        let a = Station::new(1);
        let b = Station::on(2, &a.sim);
        let id = a.service.trigger(&event_at(T0, 10)).unwrap();
        (a, b, id)
    }

    #[test]
    fn test_first_message_delivered() {
        let (a, b, id) = pair();

        let outcome = b.service.receive(&a.last_payload(), from_station(1));
        let data = outcome.event_data().unwrap();
        assert_eq!(data.action_id, Some(id));
        assert_eq!(data.reference_time, Some(T0));
        assert_eq!(data.termination, None);

        let entry = b.service.receiving_entry(id).unwrap();
        assert_eq!(entry.status, EntryStatus::Active);
        assert_eq!(entry.packet, a.last_payload());
        assert_eq!(b.delivered_count(), 1);
        assert_eq!(b.service.stats().received, 1);
    }

    #[test]
    fn test_duplicate_delivered_once() {
        let (a, b, _) = pair();
        let payload = a.last_payload();

        assert!(b.service.receive(&payload, from_station(1)).is_delivered());
        assert_eq!(
            b.service.receive(&payload, from_station(1)),
            ReceiveOutcome::Dropped(DropReason::Duplicate)
        );
        assert_eq!(b.delivered_count(), 1);
        assert_eq!(b.service.stats().dropped_duplicate, 1);
    }

    #[test]
    fn test_stale_message_does_not_mutate() {
        let (a, b, id) = pair();
        let original = a.last_payload();

        a.advance(2);
        a.service.update(&event_at(T0, 10), id).unwrap();
        let updated = a.last_payload();

        assert!(b.service.receive(&updated, from_station(1)).is_delivered());
        let before = b.service.receiving_entry(id).unwrap();
        assert_eq!(before.reference_time, T0 + Duration::from_secs(2));

        assert_eq!(
            b.service.receive(&original, from_station(1)).drop_reason(),
            Some(DropReason::Stale)
        );
        assert_eq!(b.service.receiving_entry(id).unwrap(), before);
        assert_eq!(b.delivered_count(), 1);
    }

    #[test]
    fn test_termination_of_unknown_event_dropped() {
        let (a, b, id) = pair();
        a.service.terminate(&event_at(T0, 10), id).unwrap();

        assert_eq!(
            b.service.receive(&a.last_payload(), from_station(1)).drop_reason(),
            Some(DropReason::UnknownTermination)
        );
        assert_eq!(b.service.receiving_len(), 0);
        assert_eq!(b.delivered_count(), 0);
    }

    #[test]
    fn test_cancellation_updates_status() {
        let (a, b, id) = pair();
        b.service.receive(&a.last_payload(), from_station(1));

        a.advance(1);
        a.service.terminate(&event_at(T0, 10), id).unwrap();
        let cancel = a.last_payload();

        let outcome = b.service.receive(&cancel, from_station(1));
        assert_eq!(
            outcome.event_data().and_then(|d| d.termination),
            Some(Termination::IsCancellation)
        );
        let entry = b.service.receiving_entry(id).unwrap();
        assert_eq!(entry.status, EntryStatus::Cancelled);
        assert_eq!(entry.termination, Some(Termination::IsCancellation));

        // Retransmitted cancellation carries nothing new
        assert_eq!(
            b.service.receive(&cancel, from_station(1)).drop_reason(),
            Some(DropReason::Duplicate)
        );
    }

    #[test]
    fn test_terminated_entry_never_reactivates() {
        let (a, b, id) = pair();
        b.service.receive(&a.last_payload(), from_station(1));
        a.advance(1);
        a.service.terminate(&event_at(T0, 10), id).unwrap();
        b.service.receive(&a.last_payload(), from_station(1));

        // A later message for the same event without a termination marker
        let codec = BinaryCodec::new();
        let mut msg = codec.decode(&a.last_payload()).unwrap();
        msg.management.termination = None;
        msg.management.reference_time = T0 + Duration::from_secs(3);
        let revived = codec.encode(&msg).unwrap();

        assert_eq!(
            b.service.receive(&revived, from_station(1)).drop_reason(),
            Some(DropReason::AlreadyTerminated)
        );
        assert_eq!(b.service.receiving_entry(id).unwrap().status, EntryStatus::Cancelled);
    }

    #[test]
    fn test_expired_on_arrival() {
        let (a, b, _) = pair();
        let payload = a.last_payload();
        a.advance(11);

        assert_eq!(
            b.service.receive(&payload, from_station(1)).drop_reason(),
            Some(DropReason::Expired)
        );
        assert_eq!(b.service.receiving_len(), 0);
    }

    #[test]
    fn test_foreign_and_malformed_payloads() {
        let (a, b, _) = pair();
        let payload = a.last_payload();

        let mut foreign = payload.to_vec();
        foreign[1] = 2;
        assert_eq!(
            b.service.receive(&foreign, from_station(1)).drop_reason(),
            Some(DropReason::WrongMessageId)
        );
        assert_eq!(
            b.service.receive(&[], from_station(1)).drop_reason(),
            Some(DropReason::WrongMessageId)
        );
        assert_eq!(
            b.service
                .receive(&payload[..payload.len() - 1], from_station(1))
                .drop_reason(),
            Some(DropReason::Malformed)
        );

        let stats = b.service.stats();
        assert_eq!(stats.dropped_wrong_message_id, 2);
        assert_eq!(stats.dropped_malformed, 1);
        assert_eq!(stats.dropped(), 3);
    }

    #[test]
    fn test_own_message_dropped() {
        let a = Station::new(1);
        a.service.trigger(&event_at(T0, 10)).unwrap();

        assert_eq!(
            a.service.receive(&a.last_payload(), from_station(1)).drop_reason(),
            Some(DropReason::OwnMessage)
        );
        assert_eq!(a.service.receiving_len(), 0);
    }

    #[test]
    fn test_not_ready_drops_everything() {
        let (a, _, _) = pair();
        let c = Station::with_config(&ServiceConfig::default(), &a.sim);

        assert_eq!(
            c.service.receive(&a.last_payload(), from_station(1)).drop_reason(),
            Some(DropReason::NotReady)
        );
        c.service
            .set_station_properties(StationId::new(3), denm_core::StationType::Tram);
        assert!(c.service.receive(&a.last_payload(), from_station(1)).is_delivered());
    }

    #[test]
    fn test_receiving_entry_expires() {
        let (a, b, id) = pair();
        b.service.receive(&a.last_payload(), from_station(1));

        a.advance(9);
        assert!(b.service.receiving_entry(id).is_some());
        a.advance(1);
        assert!(b.service.receiving_entry(id).is_none());
        assert_eq!(b.service.stats().receiving_expired, 1);
    }

    #[test]
    fn test_accepted_update_restarts_validity() {
        let (a, b, id) = pair();
        b.service.receive(&a.last_payload(), from_station(1));

        a.advance(6);
        a.service.update(&event_at(T0 + Duration::from_secs(6), 10), id).unwrap();
        assert!(b.service.receive(&a.last_payload(), from_station(1)).is_delivered());

        // First timer would have fired at t=10
        a.advance(8);
        assert!(b.service.receiving_entry(id).is_some());
        a.advance(2);
        assert!(b.service.receiving_entry(id).is_none());
    }

    #[test]
    fn test_callback_may_reenter_service() {
        let (a, b, _) = pair();
        let seen = Arc::new(AtomicUsize::new(0));

        let service = Arc::downgrade(&b.service);
        let counter = seen.clone();
        b.service.set_receive_callback(move |_, from| {
            assert_eq!(from, from_station(1));
            if let Some(service) = service.upgrade() {
                counter.store(service.receiving_len(), Ordering::SeqCst);
            }
        });

        assert!(b.service.receive(&a.last_payload(), from_station(1)).is_delivered());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
