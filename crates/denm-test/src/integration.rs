//! End-to-end scenario suite
//!
//! Scenarios that run several DEN services over the simulated medium and
//! check the properties that must hold across stations:
//! - Every accepted message is delivered at most once per station
//! - Stations never deliver their own events
//! - A terminated event is never reported active again
//! - Nothing is delivered past its validity
//! - Every table entry and timer is gone once all validities have elapsed

use std::collections::HashSet;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use denm_core::{ActionId, EventData, StationId, StationType};

use crate::{Delivery, MediumConfig, MediumStats, SimStation, Simulation};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub station_count: u32,
    pub event_count: usize,
    pub validity_secs: u32,
    /// (interval, duration) of retransmission
    pub repetition: Option<(Duration, Duration)>,
    /// Share of events cancelled by their originator
    pub cancel_ratio: f64,
    pub medium: MediumConfig,
    pub seed: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        ScenarioConfig {
            station_count: 5,
            event_count: 10,
            validity_secs: 30,
            repetition: Some((Duration::from_secs(1), Duration::from_secs(10))),
            cancel_ratio: 0.3,
            medium: MediumConfig::good(),
            seed: 0xDE_17,
        }
    }
}

impl ScenarioConfig {
    /// Two stations, lossless, no repetition
    pub fn minimal() -> Self {
        ScenarioConfig {
            station_count: 2,
            event_count: 3,
            repetition: None,
            cancel_ratio: 0.0,
            medium: MediumConfig::perfect(),
            ..Default::default()
        }
    }

    pub fn standard() -> Self {
        Self::default()
    }

    /// Congested channel, more stations
    pub fn lossy() -> Self {
        ScenarioConfig {
            station_count: 8,
            event_count: 20,
            medium: MediumConfig::lossy(),
            ..Default::default()
        }
    }

    pub fn with_medium(mut self, medium: MediumConfig) -> Self {
        self.medium = medium;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

// ============================================================================
// RESULT
// ============================================================================

#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Share of (event, other station) pairs where the event was delivered
    pub coverage: f64,
    /// Among stations knowing a cancelled event, share that saw the cancellation
    pub termination_coverage: f64,
    pub deliveries: usize,
    pub medium: MediumStats,
    /// Table entries left after every validity elapsed
    pub residual_entries: usize,
    /// Timers left after every validity elapsed
    pub pending_timers: usize,
    pub invariant_violations: Vec<String>,
}

impl ScenarioResult {
    pub fn invariants_maintained(&self) -> bool {
        self.invariant_violations.is_empty()
    }

    /// Invariants hold and the system drained completely
    pub fn passed(&self) -> bool {
        self.invariants_maintained() && self.residual_entries == 0 && self.pending_timers == 0
    }
}

// ============================================================================
// HARNESS
// ============================================================================

struct EventRecord {
    origin: usize,
    id: ActionId,
    data: EventData,
    cancelled: bool,
}

pub struct ScenarioHarness {
    config: ScenarioConfig,
    sim: Simulation,
    rng: StdRng,
    events: Vec<EventRecord>,
    violations: Vec<String>,
}

impl ScenarioHarness {
    pub fn new(config: ScenarioConfig) -> Self {
        let sim = Simulation::with_stations(config.medium.clone(), config.seed, config.station_count);
        let rng = StdRng::seed_from_u64(config.seed.rotate_left(17));
        ScenarioHarness {
            config,
            sim,
            rng,
            events: Vec::new(),
            violations: Vec::new(),
        }
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn run(&mut self) -> ScenarioResult {
        self.trigger_events();
        self.cancel_events();

        // Let repetitions and cancellations spread
        self.sim.advance_secs(3);
        let termination_coverage = self.termination_coverage();

        // Drain: last cancellation restarted its validity
        let drain = self.config.validity_secs as u64
            + self.config.repetition.map_or(0, |(_, d)| d.as_secs())
            + 5;
        self.sim.advance_secs(drain);

        self.check_invariants();
        ScenarioResult {
            coverage: self.coverage(),
            termination_coverage,
            deliveries: self.sim.stations().iter().map(|s| s.inbox().len()).sum(),
            medium: self.sim.medium().stats(),
            residual_entries: self.residual_entries(),
            pending_timers: self.sim.scheduler().pending(),
            invariant_violations: self.violations.clone(),
        }
    }

    fn trigger_events(&mut self) {
        for _ in 0..self.config.event_count {
            let origin = self.rng.gen_range(0..self.sim.stations().len());
            let data = match self.config.repetition {
                Some((interval, duration)) => {
                    self.sim
                        .repeated_event(self.config.validity_secs, interval, duration)
                }
                None => self.sim.event(self.config.validity_secs),
            };

            match self.sim.station(origin).service.trigger(&data) {
                Ok(id) => self.events.push(EventRecord {
                    origin,
                    id,
                    data,
                    cancelled: false,
                }),
                Err(e) => self.violations.push(format!("trigger failed: {}", e)),
            }
            self.sim.advance(Duration::from_millis(250));
        }
    }

    fn cancel_events(&mut self) {
        for event in &mut self.events {
            if self.rng.gen::<f64>() >= self.config.cancel_ratio {
                continue;
            }
            let service = &self.sim.station(event.origin).service;
            match service.terminate(&event.data, event.id) {
                Ok(()) => event.cancelled = true,
                Err(e) => self
                    .violations
                    .push(format!("cancel of {} failed: {}", event.id, e)),
            }
            self.sim.advance(Duration::from_millis(100));
        }
    }

    fn coverage(&self) -> f64 {
        let stations = self.sim.stations();
        let mut total = 0usize;
        let mut reached = 0usize;
        for event in &self.events {
            for (i, station) in stations.iter().enumerate() {
                if i == event.origin {
                    continue;
                }
                total += 1;
                if !station.deliveries_for(event.id).is_empty() {
                    reached += 1;
                }
            }
        }
        ratio(reached, total)
    }

    fn termination_coverage(&self) -> f64 {
        let mut knowing = 0usize;
        let mut terminated = 0usize;
        for event in self.events.iter().filter(|e| e.cancelled) {
            for station in self.sim.stations() {
                if let Some(entry) = station.service.receiving_entry(event.id) {
                    knowing += 1;
                    if !entry.status.is_active() {
                        terminated += 1;
                    }
                }
            }
        }
        if knowing == 0 {
            1.0
        } else {
            ratio(terminated, knowing)
        }
    }

    fn residual_entries(&self) -> usize {
        self.sim
            .stations()
            .iter()
            .map(|s| s.service.originating_len() + s.service.receiving_len())
            .sum()
    }

    fn check_invariants(&mut self) {
        for station in self.sim.stations() {
            check_station(station, self.config.validity_secs, &mut self.violations);
        }
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        part as f64 / total as f64
    }
}

/// Per-station delivery invariants
pub fn check_station(station: &SimStation, validity_secs: u32, violations: &mut Vec<String>) {
    let inbox = station.inbox();
    let mut seen = HashSet::new();
    let mut terminated = HashSet::new();

    for delivery in &inbox {
        let Some(id) = delivery.action_id() else {
            violations.push(format!("station {}: delivery without action id", station.id));
            continue;
        };

        if id.originating_station == station.id && delivery.termination().is_none() {
            violations.push(format!("station {} delivered its own event {}", station.id, id));
        }

        let key = (id, delivery.data.reference_time, delivery.data.detection_time(), delivery.termination());
        if !seen.insert(key) {
            violations.push(format!("station {} delivered {} twice", station.id, id));
        }

        if delivery.termination().is_some() {
            terminated.insert(id);
        } else if terminated.contains(&id) {
            violations.push(format!(
                "station {} saw {} active after its termination",
                station.id, id
            ));
        }

        if let Some(detection) = delivery.data.detection_time() {
            let validity = delivery
                .data
                .validity_duration_field()
                .unwrap_or(validity_secs);
            if detection.is_expired(validity, delivery.at) {
                violations.push(format!(
                    "station {} accepted {} after its validity",
                    station.id, id
                ));
            }
        }
    }
}

// ============================================================================
// SCENARIOS
// ============================================================================

pub fn test_basic_propagation() -> ScenarioResult {
    ScenarioHarness::new(ScenarioConfig::minimal()).run()
}

pub fn test_propagation_with_repetition() -> ScenarioResult {
    ScenarioHarness::new(ScenarioConfig::standard()).run()
}

pub fn test_propagation_under_loss() -> ScenarioResult {
    ScenarioHarness::new(ScenarioConfig::lossy()).run()
}

/// Relay station 2 negates an event of station 1; station 3 must see the
/// negation coming from station 2
pub fn test_relay_negation() -> Vec<Delivery> {
    let sim = Simulation::with_stations(MediumConfig::perfect(), 7, 3);
    let data = sim.event(60);
    let Ok(id) = sim.station(0).service.trigger(&data) else {
        return Vec::new();
    };
    sim.advance(Duration::from_millis(10));
    sim.advance_secs(1);

    if sim.station(1).service.terminate(&data, id).is_err() {
        return Vec::new();
    }
    sim.advance(Duration::from_millis(10));
    sim.station(2).deliveries_for(id)
}

/// A station out of range at trigger time learns the event from a
/// retransmission once it comes back
pub fn test_late_joiner() -> bool {
    let mut sim = Simulation::new(MediumConfig::perfect(), 3);
    sim.add_station(StationId::new(1), StationType::RoadSideUnit);
    sim.add_station(StationId::new(2), StationType::PassengerCar);

    sim.medium().set_online(StationId::new(2), false);
    let data = sim.repeated_event(30, Duration::from_secs(1), Duration::from_secs(5));
    let Ok(id) = sim.station(0).service.trigger(&data) else {
        return false;
    };
    sim.advance(Duration::from_millis(500));
    let missed = !sim.station(1).knows(id);

    sim.medium().set_online(StationId::new(2), true);
    sim.advance_secs(1);
    missed && sim.station(1).knows(id) && sim.station(1).deliveries_for(id).len() == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use denm_core::{EntryStatus, Termination};
    use denm_transport::LinkAddress;
    use proptest::prelude::*;

    #[test]
    fn test_basic_propagation_test() {
        let result = test_basic_propagation();
        assert!(result.passed(), "{:?}", result);
        assert_eq!(result.coverage, 1.0);
        assert_eq!(result.deliveries, 3);
    }

    #[test]
    fn test_repetition_does_not_duplicate() {
        let result = test_propagation_with_repetition();
        assert!(result.passed(), "{:?}", result);
        assert!(result.coverage >= 0.95, "coverage {}", result.coverage);
        assert!(result.termination_coverage > 0.99);
    }

    #[test]
    fn test_lossy_channel() {
        let result = test_propagation_under_loss();
        assert!(result.passed(), "{:?}", result);
        assert!(result.medium.lost > 0);
        assert!(result.coverage > 0.75, "coverage {}", result.coverage);
    }

    #[test]
    fn test_relay_negation_test() {
        let deliveries = test_relay_negation();
        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[0].termination(), None);
        assert_eq!(deliveries[1].termination(), Some(Termination::IsNegation));
        assert_eq!(deliveries[1].from, LinkAddress::Station(StationId::new(2)));
    }

    #[test]
    fn test_negation_state_across_stations() {
        let sim = Simulation::with_stations(MediumConfig::perfect(), 11, 3);
        let data = sim.event(60);
        let id = sim.station(0).service.trigger(&data).unwrap();
        sim.advance_secs(1);
        sim.station(1).service.terminate(&data, id).unwrap();
        sim.advance_secs(1);

        // The originator keeps its own entry; it has nothing to negate
        let origin = sim.station(0).service.originating_entry(id).unwrap();
        assert_eq!(origin.status, EntryStatus::Active);
        assert_eq!(sim.station(0).service.stats().dropped_unknown_termination, 1);

        let relay = sim.station(1).service.originating_entry(id).unwrap();
        assert_eq!(relay.status, EntryStatus::Negated);

        let observer = sim.station(2).service.receiving_entry(id).unwrap();
        assert_eq!(observer.status, EntryStatus::Negated);
    }

    #[test]
    fn test_cancellation_reaches_everyone() {
        let sim = Simulation::with_stations(MediumConfig::perfect(), 5, 4);
        let data = sim.repeated_event(20, Duration::from_secs(1), Duration::from_secs(4));
        let id = sim.station(0).service.trigger(&data).unwrap();
        sim.advance_secs(2);
        sim.station(0).service.terminate(&data, id).unwrap();
        sim.advance_secs(1);

        for station in &sim.stations()[1..] {
            let entry = station.service.receiving_entry(id).unwrap();
            assert_eq!(entry.termination, Some(Termination::IsCancellation));
            let deliveries = station.deliveries_for(id);
            assert_eq!(deliveries.len(), 2);
        }

        sim.advance_secs(25);
        for station in sim.stations() {
            assert!(station.service.receiving_entry(id).is_none());
            assert!(station.service.originating_entry(id).is_none());
        }
        assert_eq!(sim.scheduler().pending(), 0);
    }

    #[test]
    fn test_late_joiner_test() {
        assert!(test_late_joiner());
    }

    #[test]
    fn test_offline_sender_counts_failure() {
        let sim = Simulation::with_stations(MediumConfig::perfect(), 2, 2);
        sim.medium().set_online(StationId::new(1), false);

        let id = sim.station(0).service.trigger(&sim.event(10)).unwrap();
        sim.advance_secs(1);

        assert!(sim.station(0).service.originating_entry(id).is_some());
        assert_eq!(sim.station(0).service.stats().transmit_failures, 1);
        assert_eq!(sim.medium().stats().refused, 1);
        assert!(!sim.station(1).knows(id));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_invariants_hold_on_any_channel(
            seed in any::<u64>(),
            loss in 0.0f64..0.6,
            duplicate in 0.0f64..0.3,
        ) {
            let medium = MediumConfig {
                loss_rate: loss,
                duplicate_prob: duplicate,
                ..MediumConfig::lossy()
            };
            let config = ScenarioConfig {
                station_count: 4,
                event_count: 6,
                ..ScenarioConfig::standard().with_medium(medium).with_seed(seed)
            };
            let result = ScenarioHarness::new(config).run();
            prop_assert!(result.passed(), "{:?}", result);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_udp_loopback() {
        use std::net::SocketAddr;
        use std::sync::Arc;

        use denm_core::ReferencePosition;
        use denm_runtime::{attach_udp, DenService, ServiceConfig};
        use denm_time::{Clock, SystemClock, TokioScheduler};

        let scheduler = Arc::new(TokioScheduler::current().unwrap());
        let station = |id: u32| {
            let config = ServiceConfig::for_station(StationId::new(id), StationType::RoadSideUnit);
            Arc::new(DenService::new(&config, Arc::new(SystemClock), scheduler.clone()))
        };
        let a = station(1);
        let b = station(2);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        b.set_receive_callback(move |data, from| {
            let _ = tx.send((data.clone(), from));
        });

        let any: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let sink: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let (b_addr, _b_loop) = attach_udp(&b, any, sink).await.unwrap();
        let (a_addr, _a_loop) = attach_udp(&a, any, b_addr).await.unwrap();

        let data = EventData::new()
            .with_mandatory_fields(SystemClock.now(), ReferencePosition::from_degrees(45.0, 7.6));
        let id = a.trigger(&data).unwrap();

        let (received, from) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.action_id, Some(id));
        assert_eq!(from, LinkAddress::Udp(a_addr));
        assert!(b.receiving_entry(id).is_some());
        assert_eq!(scheduler.active_count(), 2);
    }
}
