//! DEN basic service
//!
//! Shared state and the public handle. The protocol transitions live in the
//! `originating` and `receiving` modules.
//!
//! Locking:
//! - the originating table and the receiving table each have one lock
//! - when both are needed the originating lock is taken first
//! - timer callbacks take the same lock as the application calls, and carry
//!   an epoch so a fire that lost the race against a cancel is ignored
//! - the receive callback runs with no table lock held

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use denm_core::{
    ActionId, DenmError, DenmResult, EventData, OriginatingEntry, ReceivingEntry, StationId,
    StationType, Termination, TimestampIts,
};
use denm_time::{Clock, Scheduler, TimerCallback, TimerKind};
use denm_transport::{GeoArea, LinkAddress, TransmitRequest, Transport};
use denm_wire::{BinaryCodec, Codec, MessageBuilder};

use crate::{OriginatingTable, ReceiveOutcome, ReceivingTable, ServiceConfig, ServiceStats};

/// Application callback for accepted messages
pub type ReceiveCallback = Arc<dyn Fn(&EventData, LinkAddress) + Send + Sync>;

/// Transmission parameters applied to every outgoing message
#[derive(Clone, Copy, Debug)]
pub(crate) struct TransmitParams {
    pub area: GeoArea,
    pub destination_port: u16,
    pub lifetime: Duration,
    pub hop_limit: u8,
    pub traffic_class: u8,
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct StationProperties {
    pub station_id: Option<StationId>,
    pub station_type: Option<StationType>,
}

pub(crate) struct ServiceCore {
    pub(crate) station: RwLock<StationProperties>,
    pub(crate) params: RwLock<TransmitParams>,
    pub(crate) originating: Mutex<OriginatingTable>,
    pub(crate) receiving: Mutex<ReceivingTable>,
    pub(crate) transport: RwLock<Option<Arc<dyn Transport>>>,
    pub(crate) callback: RwLock<Option<ReceiveCallback>>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) scheduler: Arc<dyn Scheduler>,
    pub(crate) codec: Arc<dyn Codec>,
    pub(crate) stats: Mutex<ServiceStats>,
}

impl ServiceCore {
    #[inline]
    pub(crate) fn now(&self) -> TimestampIts {
        self.clock.now()
    }

    #[inline]
    pub(crate) fn scheduler(&self) -> &dyn Scheduler {
        &*self.scheduler
    }

    /// Station identity, or `AttributesUnset` until both parts are known
    pub(crate) fn ready(&self) -> DenmResult<(StationId, StationType)> {
        let station = self.station.read();
        match (station.station_id, station.station_type) {
            (Some(id), Some(kind)) => Ok((id, kind)),
            _ => Err(DenmError::AttributesUnset),
        }
    }

    pub(crate) fn transport(&self) -> DenmResult<Arc<dyn Transport>> {
        self.transport
            .read()
            .clone()
            .ok_or(DenmError::TransportUnavailable)
    }

    /// Checks shared by trigger, update and terminate
    pub(crate) fn check_request(
        &self,
        data: &EventData,
    ) -> DenmResult<(MessageBuilder, Arc<dyn Transport>, TimestampIts)> {
        let (station_id, station_type) = self.ready()?;
        if !data.is_complete() {
            return Err(DenmError::WrongDeData);
        }
        let now = self.now();
        if data.is_expired(now) {
            return Err(DenmError::ValidityExpired);
        }
        let transport = self.transport()?;
        Ok((MessageBuilder::new(station_id, station_type), transport, now))
    }

    /// Build and encode one message
    pub(crate) fn compose(
        &self,
        builder: &MessageBuilder,
        data: &EventData,
        action_id: ActionId,
        reference_time: TimestampIts,
        termination: Option<Termination>,
    ) -> DenmResult<Bytes> {
        let mut msg = builder.build(data, action_id, reference_time)?;
        msg.management.termination = termination;
        self.codec.encode(&msg)
    }

    /// Hand a payload to the transport; failures are logged, not returned
    pub(crate) fn transmit(&self, transport: &dyn Transport, payload: Bytes) {
        let params = *self.params.read();
        let request = TransmitRequest {
            payload,
            area: params.area,
            lifetime: params.lifetime,
            hop_limit: params.hop_limit,
            traffic_class: params.traffic_class,
            destination_port: params.destination_port,
        };

        let result = transport.send(request);
        let mut stats = self.stats.lock();
        match result {
            Ok(()) => stats.transmissions += 1,
            Err(e) => {
                stats.transmit_failures += 1;
                warn!("transmission failed: {}", e);
            }
        }
    }

    /// Wrap a timer handler so it holds only a weak reference to the service
    pub(crate) fn timer_callback(
        self: &Arc<Self>,
        action_id: ActionId,
        kind: TimerKind,
        epoch: u64,
        handler: fn(&Arc<ServiceCore>, ActionId, u64),
    ) -> TimerCallback {
        let core = Arc::downgrade(self);
        Box::new(move || {
            trace!(%action_id, ?kind, epoch, "timer fired");
            if let Some(core) = core.upgrade() {
                handler(&core, action_id, epoch);
            }
        })
    }

    pub(crate) fn cleanup(&self) {
        self.originating.lock().cancel_all_timers(self.scheduler());
        self.receiving.lock().cancel_all_timers(self.scheduler());
        debug!("all timers cancelled");
    }
}

/// DEN basic service instance
///
/// One instance represents one ITS station. All methods take `&self`; the
/// service can be shared across threads and with its own timer callbacks.
pub struct DenService {
    core: Arc<ServiceCore>,
}

impl DenService {
    /// Create a service using the binary codec
    pub fn new(config: &ServiceConfig, clock: Arc<dyn Clock>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::with_codec(config, clock, scheduler, Arc::new(BinaryCodec::new()))
    }

    pub fn with_codec(
        config: &ServiceConfig,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
        codec: Arc<dyn Codec>,
    ) -> Self {
        let params = TransmitParams {
            area: config.geo_area,
            destination_port: config.destination_port,
            lifetime: config.packet_lifetime(),
            hop_limit: config.hop_limit,
            traffic_class: config.traffic_class,
        };
        let station = StationProperties {
            station_id: config.station_id,
            station_type: config.station_type,
        };

        DenService {
            core: Arc::new(ServiceCore {
                station: RwLock::new(station),
                params: RwLock::new(params),
                originating: Mutex::new(OriginatingTable::new()),
                receiving: Mutex::new(ReceivingTable::new()),
                transport: RwLock::new(None),
                callback: RwLock::new(None),
                clock,
                scheduler,
                codec,
                stats: Mutex::new(ServiceStats::default()),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    pub fn set_station_properties(&self, station_id: StationId, station_type: StationType) {
        let mut station = self.core.station.write();
        station.station_id = Some(station_id);
        station.station_type = Some(station_type);
    }

    pub fn set_station_id(&self, station_id: StationId) {
        self.core.station.write().station_id = Some(station_id);
    }

    pub fn set_station_type(&self, station_type: StationType) {
        self.core.station.write().station_type = Some(station_type);
    }

    pub fn station_id(&self) -> Option<StationId> {
        self.core.station.read().station_id
    }

    pub fn station_type(&self) -> Option<StationType> {
        self.core.station.read().station_type
    }

    /// True once station id and station type are both set
    pub fn is_ready(&self) -> bool {
        self.core.ready().is_ok()
    }

    pub fn set_geo_area(&self, area: GeoArea) {
        self.core.params.write().area = area;
    }

    pub fn geo_area(&self) -> GeoArea {
        self.core.params.read().area
    }

    /// Port carried in the header of outgoing messages and accepted inbound
    pub fn destination_port(&self) -> u16 {
        self.core.params.read().destination_port
    }

    pub fn set_transport(&self, transport: Arc<dyn Transport>) {
        *self.core.transport.write() = Some(transport);
    }

    pub fn clear_transport(&self) {
        *self.core.transport.write() = None;
    }

    /// Register the callback invoked once per accepted message
    pub fn set_receive_callback<F>(&self, callback: F)
    where
        F: Fn(&EventData, LinkAddress) + Send + Sync + 'static,
    {
        *self.core.callback.write() = Some(Arc::new(callback));
    }

    // ------------------------------------------------------------------
    // Protocol operations
    // ------------------------------------------------------------------

    /// Announce a new event; returns its freshly allocated action id
    pub fn trigger(&self, data: &EventData) -> DenmResult<ActionId> {
        self.core.trigger(data)
    }

    /// Re-announce an active own event with new data
    pub fn update(&self, data: &EventData, action_id: ActionId) -> DenmResult<()> {
        self.core.update(data, action_id)
    }

    /// Cancel an own event or negate an event learned from another station
    pub fn terminate(&self, data: &EventData, action_id: ActionId) -> DenmResult<()> {
        self.core.terminate(data, action_id)
    }

    /// Process one inbound payload; rejections are silent drops
    pub fn receive(&self, payload: &[u8], from: LinkAddress) -> ReceiveOutcome {
        self.core.receive(payload, from)
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn originating_entry(&self, action_id: ActionId) -> Option<OriginatingEntry> {
        self.core
            .originating
            .lock()
            .get(&action_id)
            .map(|slot| slot.entry.clone())
    }

    pub fn receiving_entry(&self, action_id: ActionId) -> Option<ReceivingEntry> {
        self.core
            .receiving
            .lock()
            .get(&action_id)
            .map(|slot| slot.entry.clone())
    }

    pub fn originating_len(&self) -> usize {
        self.core.originating.lock().len()
    }

    pub fn receiving_len(&self) -> usize {
        self.core.receiving.lock().len()
    }

    pub fn originating_ids(&self) -> Vec<ActionId> {
        self.core.originating.lock().ids()
    }

    pub fn receiving_ids(&self) -> Vec<ActionId> {
        self.core.receiving.lock().ids()
    }

    /// Sequence number the next trigger will use
    pub fn next_sequence_number(&self) -> u32 {
        self.core.originating.lock().next_sequence()
    }

    /// True while the entry still retransmits periodically
    pub fn is_repeating(&self, action_id: ActionId) -> bool {
        self.core
            .originating
            .lock()
            .get(&action_id)
            .map(|slot| slot.timers.repetition.is_armed())
            .unwrap_or(false)
    }

    /// True while any timer of the originating entry is pending
    pub fn has_pending_timers(&self, action_id: ActionId) -> bool {
        self.core
            .originating
            .lock()
            .get(&action_id)
            .map(|slot| !slot.timers.is_idle())
            .unwrap_or(false)
    }

    pub fn stats(&self) -> ServiceStats {
        self.core.stats.lock().clone()
    }

    pub fn now(&self) -> TimestampIts {
        self.core.now()
    }

    /// Stop every outstanding timer of both tables
    ///
    /// Entries stay inspectable but are no longer repeated or aged.
    pub fn cleanup(&self) {
        self.core.cleanup();
    }
}

impl Drop for DenService {
    fn drop(&mut self) {
        self.core.cleanup();
    }
}
