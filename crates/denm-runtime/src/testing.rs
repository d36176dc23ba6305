//! Fixtures shared by the unit tests of this crate

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use denm_core::{EventData, ReferencePosition, StationId, StationType, TimestampIts};
use denm_time::{ManualClock, SimScheduler};
use denm_transport::{LinkAddress, RecordingTransport};

use crate::{DenService, ServiceConfig};

pub const T0: TimestampIts = TimestampIts(600_000_000);

/// One station on a simulated clock with a recording transport
pub struct Station {
    pub sim: Arc<SimScheduler>,
    pub transport: Arc<RecordingTransport>,
    pub service: Arc<DenService>,
    pub delivered: Arc<Mutex<Vec<EventData>>>,
}

impl Station {
    pub fn new(id: u32) -> Self {
        let sim = Arc::new(SimScheduler::new(ManualClock::new(T0)));
        Self::on(id, &sim)
    }

    /// Station sharing the clock and scheduler of `sim`
    pub fn on(id: u32, sim: &Arc<SimScheduler>) -> Self {
        let config = ServiceConfig::for_station(StationId::new(id), StationType::PassengerCar);
        Self::with_config(&config, sim)
    }

    pub fn with_config(config: &ServiceConfig, sim: &Arc<SimScheduler>) -> Self {
        let service = Arc::new(DenService::new(
            config,
            Arc::new(sim.clock().clone()),
            sim.clone(),
        ));
        let transport = Arc::new(RecordingTransport::new());
        service.set_transport(transport.clone());

        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = delivered.clone();
        service.set_receive_callback(move |data, _from| sink.lock().push(data.clone()));

        Station {
            sim: sim.clone(),
            transport,
            service,
            delivered,
        }
    }

    pub fn advance(&self, secs: u64) -> usize {
        self.sim.advance(Duration::from_secs(secs))
    }

    pub fn last_payload(&self) -> Bytes {
        self.transport
            .last()
            .map(|request| request.payload)
            .unwrap_or_default()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.lock().len()
    }
}

pub fn from_station(id: u32) -> LinkAddress {
    LinkAddress::Station(StationId::new(id))
}

/// Complete event data detected at `detection_time`
pub fn event_at(detection_time: TimestampIts, validity_secs: u32) -> EventData {
    let mut data = EventData::new()
        .with_mandatory_fields(detection_time, ReferencePosition::from_degrees(45.0703, 7.6869));
    data.set_validity_duration(validity_secs).unwrap();
    data
}
