//! Multi-station simulation
//!
//! A [`Simulation`] owns one simulated clock, one scheduler and one
//! [`BroadcastMedium`]. Stations are full [`DenService`] instances attached
//! to the medium; every accepted message is recorded in the station's inbox.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use denm_core::{
    ActionId, EventData, ReferencePosition, StationId, StationType, Termination, TimestampIts,
};
use denm_runtime::{DenService, ServiceConfig};
use denm_time::{Clock, ManualClock, SimScheduler};
use denm_transport::LinkAddress;

use crate::{BroadcastMedium, MediumConfig};

/// Simulation start, well clear of the ITS epoch
pub const SIM_START: TimestampIts = TimestampIts(600_000_000);

/// One accepted message as seen by the application
#[derive(Clone, Debug)]
pub struct Delivery {
    pub at: TimestampIts,
    pub from: LinkAddress,
    pub data: EventData,
}

impl Delivery {
    pub fn action_id(&self) -> Option<ActionId> {
        self.data.action_id
    }

    pub fn termination(&self) -> Option<Termination> {
        self.data.termination
    }
}

/// A station taking part in a simulation
pub struct SimStation {
    pub id: StationId,
    pub service: Arc<DenService>,
    inbox: Arc<Mutex<Vec<Delivery>>>,
}

impl SimStation {
    pub fn inbox(&self) -> Vec<Delivery> {
        self.inbox.lock().clone()
    }

    /// Deliveries concerning one event
    pub fn deliveries_for(&self, action_id: ActionId) -> Vec<Delivery> {
        self.inbox
            .lock()
            .iter()
            .filter(|d| d.action_id() == Some(action_id))
            .cloned()
            .collect()
    }

    pub fn knows(&self, action_id: ActionId) -> bool {
        self.service.receiving_entry(action_id).is_some()
    }
}

pub struct Simulation {
    scheduler: Arc<SimScheduler>,
    medium: BroadcastMedium,
    stations: Vec<SimStation>,
}

impl Simulation {
    pub fn new(config: MediumConfig, seed: u64) -> Self {
        let scheduler = Arc::new(SimScheduler::new(ManualClock::new(SIM_START)));
        let medium = BroadcastMedium::new(scheduler.clone(), config, seed);
        Simulation {
            scheduler,
            medium,
            stations: Vec::new(),
        }
    }

    /// Simulation with `count` passenger cars, station ids 1..=count
    pub fn with_stations(config: MediumConfig, seed: u64, count: u32) -> Self {
        let mut sim = Self::new(config, seed);
        for id in 1..=count {
            sim.add_station(StationId::new(id), StationType::PassengerCar);
        }
        sim
    }

    /// Add a station; returns its index
    pub fn add_station(&mut self, id: StationId, station_type: StationType) -> usize {
        let config = ServiceConfig::for_station(id, station_type);
        let service = Arc::new(DenService::new(
            &config,
            Arc::new(self.scheduler.clock().clone()),
            self.scheduler.clone(),
        ));

        let inbox = Arc::new(Mutex::new(Vec::new()));
        let sink = inbox.clone();
        let clock = self.scheduler.clock().clone();
        service.set_receive_callback(move |data, from| {
            sink.lock().push(Delivery {
                at: clock.now(),
                from,
                data: data.clone(),
            });
        });

        self.medium.attach(id, &service);
        self.stations.push(SimStation { id, service, inbox });
        self.stations.len() - 1
    }

    pub fn station(&self, index: usize) -> &SimStation {
        &self.stations[index]
    }

    pub fn stations(&self) -> &[SimStation] {
        &self.stations
    }

    pub fn medium(&self) -> &BroadcastMedium {
        &self.medium
    }

    pub fn scheduler(&self) -> &Arc<SimScheduler> {
        &self.scheduler
    }

    pub fn now(&self) -> TimestampIts {
        self.scheduler.now()
    }

    /// Run every timer and delivery due within `dt`
    pub fn advance(&self, dt: Duration) -> usize {
        self.scheduler.advance(dt)
    }

    pub fn advance_secs(&self, secs: u64) -> usize {
        self.advance(Duration::from_secs(secs))
    }

    /// Event detected now at a fixed test position
    pub fn event(&self, validity_secs: u32) -> EventData {
        let mut data = EventData::new()
            .with_mandatory_fields(self.now(), ReferencePosition::from_degrees(45.0629, 7.6785));
        // Out-of-range values fall back to the 600 s default
        let _ = data.set_validity_duration(validity_secs);
        data
    }

    /// Same as [`Simulation::event`] with periodic retransmission
    pub fn repeated_event(&self, validity_secs: u32, interval: Duration, duration: Duration) -> EventData {
        let mut data = self.event(validity_secs);
        data.set_repetition(duration, interval);
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stations_share_one_clock() {
        let sim = Simulation::with_stations(MediumConfig::perfect(), 1, 3);
        sim.advance_secs(5);
        for station in sim.stations() {
            assert_eq!(station.service.now(), SIM_START + Duration::from_secs(5));
        }
    }

    #[test]
    fn test_trigger_reaches_every_other_station() {
        let sim = Simulation::with_stations(MediumConfig::perfect(), 1, 4);
        let id = sim.station(0).service.trigger(&sim.event(30)).unwrap();
        sim.advance(Duration::from_millis(1));

        assert!(sim.station(0).inbox().is_empty());
        for station in &sim.stations()[1..] {
            let deliveries = station.deliveries_for(id);
            assert_eq!(deliveries.len(), 1);
            assert_eq!(deliveries[0].from, LinkAddress::Station(StationId::new(1)));
        }
        assert_eq!(sim.medium().stats().delivered, 3);
    }
}
