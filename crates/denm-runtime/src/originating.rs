//! Originating side: trigger, update, terminate and the entry timers
//!
//! Every transition runs under the originating table lock, from the table
//! lookup through the timer restart, so a timer fire for the same entry is
//! ordered entirely before or after it.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use denm_core::{
    ActionId, DenmError, DenmResult, EntryStatus, EventData, OriginatingEntry, Termination,
    TimestampIts,
};

use denm_time::TimerKind;

use crate::service::ServiceCore;
use crate::OriginatingSlot;

/// Timer parameters of one request
struct EntrySchedule {
    validity: Duration,
    /// (interval, total duration)
    repetition: Option<(Duration, Duration)>,
}

impl EntrySchedule {
    fn from_data(data: &EventData) -> Self {
        EntrySchedule {
            validity: Duration::from_secs(data.validity_duration() as u64),
            repetition: data
                .has_repetition()
                .then(|| (data.repetition_interval(), data.repetition_duration())),
        }
    }
}

impl ServiceCore {
    pub(crate) fn trigger(self: &Arc<Self>, data: &EventData) -> DenmResult<ActionId> {
        let (builder, transport, now) = self.check_request(data)?;

        let mut table = self.originating.lock();
        let action_id = table.allocate(builder.station_id());
        let packet = self.compose(&builder, data, action_id, now, None)?;

        self.transmit(&*transport, packet.clone());

        let slot = table.insert(
            OriginatingSlot::new(OriginatingEntry::new(action_id, packet, now)),
            self.scheduler(),
        );
        self.start_timers(slot, action_id, &EntrySchedule::from_data(data), now);
        drop(table);

        self.stats.lock().triggers += 1;
        debug!(%action_id, "event triggered");
        Ok(action_id)
    }

    pub(crate) fn update(self: &Arc<Self>, data: &EventData, action_id: ActionId) -> DenmResult<()> {
        let (builder, transport, now) = self.check_request(data)?;

        let mut table = self.originating.lock();
        let slot = table
            .get_mut(&action_id)
            .ok_or(DenmError::UnknownActionId(action_id))?;
        if !slot.entry.status.is_active() {
            return Err(DenmError::NonActiveActionIdOriginating(action_id));
        }

        // Built before touching the timers, so a failed update leaves the
        // entry exactly as it was
        let packet = self.compose(&builder, data, action_id, now, None)?;

        slot.timers.cancel_all(self.scheduler());
        self.transmit(&*transport, packet.clone());
        slot.entry.packet = packet;
        slot.entry.reference_time = now;
        self.start_timers(slot, action_id, &EntrySchedule::from_data(data), now);
        drop(table);

        self.stats.lock().updates += 1;
        debug!(%action_id, "event updated");
        Ok(())
    }

    pub(crate) fn terminate(
        self: &Arc<Self>,
        data: &EventData,
        action_id: ActionId,
    ) -> DenmResult<()> {
        let (builder, transport, now) = self.check_request(data)?;
        let schedule = EntrySchedule::from_data(data);

        let mut table = self.originating.lock();
        let status = table.get(&action_id).map(|slot| slot.entry.status);

        let termination = match status {
            Some(EntryStatus::Active) => {
                let packet = self.compose(
                    &builder,
                    data,
                    action_id,
                    now,
                    Some(Termination::IsCancellation),
                )?;

                let slot = table
                    .get_mut(&action_id)
                    .ok_or(DenmError::WrongTableData(action_id))?;
                slot.timers.cancel_all(self.scheduler());
                self.transmit(&*transport, packet.clone());
                slot.entry.packet = packet;
                slot.entry.status = EntryStatus::Cancelled;
                slot.entry.reference_time = now;
                self.start_timers(slot, action_id, &schedule, now);
                Termination::IsCancellation
            }
            Some(_) => return Err(DenmError::NonActiveActionIdOriginating(action_id)),
            None if action_id.originating_station == builder.station_id() => {
                return Err(DenmError::UnknownActionIdOriginating(action_id));
            }
            None => {
                let reference_time = self.negation_reference_time(action_id)?;
                let packet = self.compose(
                    &builder,
                    data,
                    action_id,
                    reference_time,
                    Some(Termination::IsNegation),
                )?;

                self.transmit(&*transport, packet.clone());
                let mut entry = OriginatingEntry::new(action_id, packet, reference_time);
                entry.status = EntryStatus::Negated;
                let slot = table.insert(OriginatingSlot::new(entry), self.scheduler());
                self.start_timers(slot, action_id, &schedule, now);
                Termination::IsNegation
            }
        };
        drop(table);

        self.stats.lock().terminations += 1;
        debug!(%action_id, ?termination, "event terminated");
        Ok(())
    }

    /// Reference time to negate an event learned from another station
    fn negation_reference_time(&self, action_id: ActionId) -> DenmResult<TimestampIts> {
        let receiving = self.receiving.lock();
        match receiving.get(&action_id) {
            None => Err(DenmError::UnknownActionIdReceiving(action_id)),
            Some(slot) if !slot.entry.status.is_active() => {
                Err(DenmError::NonActiveActionIdReceiving(action_id))
            }
            Some(slot) => Ok(slot.entry.reference_time),
        }
    }

    fn start_timers(
        self: &Arc<Self>,
        slot: &mut OriginatingSlot,
        action_id: ActionId,
        schedule: &EntrySchedule,
        now: TimestampIts,
    ) {
        let scheduler = self.scheduler();

        slot.timers.validity.arm(scheduler, schedule.validity, |epoch| {
            self.timer_callback(
                action_id,
                TimerKind::Validity,
                epoch,
                ServiceCore::on_validity_expired,
            )
        });

        if let Some((interval, duration)) = schedule.repetition {
            slot.timers.repetition_interval = interval;
            slot.timers.repetition_due = Some(now + interval);
            slot.timers.repetition.arm(scheduler, interval, |epoch| {
                self.timer_callback(
                    action_id,
                    TimerKind::Repetition,
                    epoch,
                    ServiceCore::on_repetition,
                )
            });
            slot.timers.repetition_duration.arm(scheduler, duration, |epoch| {
                self.timer_callback(
                    action_id,
                    TimerKind::RepetitionDuration,
                    epoch,
                    ServiceCore::on_repetition_stop,
                )
            });
        }
    }

    fn on_validity_expired(self: &Arc<Self>, action_id: ActionId, epoch: u64) {
        let mut table = self.originating.lock();
        let Some(slot) = table.get_mut(&action_id) else {
            trace!(%action_id, "validity fire for deleted entry");
            return;
        };
        if !slot.timers.validity.fire(epoch) {
            trace!(%action_id, "stale validity fire");
            return;
        }

        slot.timers.cancel_all(self.scheduler());
        table.remove(&action_id);
        drop(table);

        self.stats.lock().originating_expired += 1;
        debug!(%action_id, "originating entry expired");
    }

    fn on_repetition(self: &Arc<Self>, action_id: ActionId, epoch: u64) {
        let mut table = self.originating.lock();
        let Some(slot) = table.get_mut(&action_id) else {
            return;
        };
        if !slot.timers.repetition.fire(epoch) {
            trace!(%action_id, "stale repetition fire");
            return;
        }

        // Next slot is computed from the previous due time, not from the
        // (possibly late) fire time
        let now = self.now();
        let interval = slot.timers.repetition_interval;
        let due = slot.timers.repetition_due.unwrap_or(now) + interval;
        slot.timers.repetition_due = Some(due);
        slot.timers.repetition.arm(self.scheduler(), due - now, |epoch| {
            self.timer_callback(
                action_id,
                TimerKind::Repetition,
                epoch,
                ServiceCore::on_repetition,
            )
        });

        let packet = slot.entry.packet.clone();
        self.retransmit(action_id, packet);
    }

    fn on_repetition_stop(self: &Arc<Self>, action_id: ActionId, epoch: u64) {
        let mut table = self.originating.lock();
        let Some(slot) = table.get_mut(&action_id) else {
            return;
        };
        if !slot.timers.repetition_duration.fire(epoch) {
            trace!(%action_id, "stale repetition stop");
            return;
        }

        // The window is inclusive: a retransmission due right now still goes out
        let now = self.now();
        let due_now = slot.timers.repetition.is_armed()
            && slot.timers.repetition_due.map_or(false, |due| due <= now);
        slot.timers.stop_repetition(self.scheduler());

        if due_now {
            let packet = slot.entry.packet.clone();
            self.retransmit(action_id, packet);
        }
        debug!(%action_id, "repetition stopped");
    }

    fn retransmit(&self, action_id: ActionId, packet: Bytes) {
        match self.transport() {
            Ok(transport) => {
                self.transmit(&*transport, packet);
                self.stats.lock().repetitions += 1;
                trace!(%action_id, "retransmitted");
            }
            Err(e) => warn!(%action_id, "retransmission skipped: {}", e),
        }
    }
}
