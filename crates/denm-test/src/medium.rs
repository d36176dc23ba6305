//! Simulated broadcast medium
//!
//! Every station attached to the medium gets a [`MediumPort`] as its
//! transport. A message sent through one port is offered to every other
//! attached station, subject to:
//! - Random loss
//! - Latency with uniform jitter
//! - Duplication
//!
//! Deliveries are scheduled on the same [`SimScheduler`] that drives the
//! service timers, so a whole scenario runs on one deterministic timeline.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use denm_core::{DenmError, DenmResult, StationId};
use denm_runtime::DenService;
use denm_time::{Scheduler, SimScheduler};
use denm_transport::{LinkAddress, TransmitRequest, Transport};

/// Link conditions of the medium
#[derive(Clone, Debug)]
pub struct MediumConfig {
    pub base_latency: Duration,
    /// Extra latency drawn uniformly from `0..=max_jitter`
    pub max_jitter: Duration,
    /// Per-receiver loss probability (0.0 - 1.0)
    pub loss_rate: f64,
    /// Probability that a delivered copy arrives twice
    pub duplicate_prob: f64,
}

impl Default for MediumConfig {
    fn default() -> Self {
        MediumConfig {
            base_latency: Duration::from_millis(5),
            max_jitter: Duration::from_millis(5),
            loss_rate: 0.0,
            duplicate_prob: 0.0,
        }
    }
}

impl MediumConfig {
    /// Instant, lossless delivery
    pub fn perfect() -> Self {
        MediumConfig {
            base_latency: Duration::ZERO,
            max_jitter: Duration::ZERO,
            loss_rate: 0.0,
            duplicate_prob: 0.0,
        }
    }

    /// Short range radio in good conditions
    pub fn good() -> Self {
        MediumConfig {
            loss_rate: 0.01,
            duplicate_prob: 0.01,
            ..Default::default()
        }
    }

    /// Congested channel
    pub fn lossy() -> Self {
        MediumConfig {
            base_latency: Duration::from_millis(20),
            max_jitter: Duration::from_millis(80),
            loss_rate: 0.3,
            duplicate_prob: 0.05,
        }
    }

    pub fn with_loss(mut self, loss_rate: f64) -> Self {
        self.loss_rate = loss_rate;
        self
    }
}

/// Medium statistics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediumStats {
    /// Messages handed to the medium
    pub sent: u64,
    /// Copies scheduled for delivery, duplicates included
    pub delivered: u64,
    pub lost: u64,
    pub duplicated: u64,
    /// Transmissions refused while a station was detached
    pub refused: u64,
}

impl MediumStats {
    pub fn loss_rate(&self) -> f64 {
        let offered = self.delivered - self.duplicated + self.lost;
        if offered == 0 {
            0.0
        } else {
            self.lost as f64 / offered as f64
        }
    }
}

struct Attachment {
    station: StationId,
    service: Weak<DenService>,
    online: bool,
}

struct MediumState {
    config: MediumConfig,
    rng: StdRng,
    attached: Vec<Attachment>,
    stats: MediumStats,
}

/// Shared broadcast channel
#[derive(Clone)]
pub struct BroadcastMedium {
    scheduler: Arc<SimScheduler>,
    state: Arc<Mutex<MediumState>>,
}

impl BroadcastMedium {
    pub fn new(scheduler: Arc<SimScheduler>, config: MediumConfig, seed: u64) -> Self {
        BroadcastMedium {
            scheduler,
            state: Arc::new(Mutex::new(MediumState {
                config,
                rng: StdRng::seed_from_u64(seed),
                attached: Vec::new(),
                stats: MediumStats::default(),
            })),
        }
    }

    /// Attach a service and install its port as the service transport
    pub fn attach(&self, station: StationId, service: &Arc<DenService>) {
        self.state.lock().attached.push(Attachment {
            station,
            service: Arc::downgrade(service),
            online: true,
        });
        service.set_transport(Arc::new(MediumPort {
            station,
            medium: self.clone(),
        }));
    }

    /// Take a station out of range (or back in); it neither sends nor hears
    pub fn set_online(&self, station: StationId, online: bool) {
        let mut state = self.state.lock();
        for attachment in state.attached.iter_mut().filter(|a| a.station == station) {
            attachment.online = online;
        }
    }

    pub fn set_config(&self, config: MediumConfig) {
        self.state.lock().config = config;
    }

    pub fn stats(&self) -> MediumStats {
        self.state.lock().stats.clone()
    }

    fn broadcast(&self, from: StationId, payload: &[u8]) -> DenmResult<()> {
        let mut deliveries = Vec::new();
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            let sender_online = state
                .attached
                .iter()
                .any(|a| a.station == from && a.online);
            if !sender_online {
                state.stats.refused += 1;
                return Err(DenmError::TransportError(format!(
                    "station {} out of range",
                    from
                )));
            }
            state.stats.sent += 1;

            for attachment in state.attached.iter().filter(|a| a.station != from && a.online) {
                if state.rng.gen::<f64>() < state.config.loss_rate {
                    state.stats.lost += 1;
                    continue;
                }
                let copies = if state.rng.gen::<f64>() < state.config.duplicate_prob {
                    state.stats.duplicated += 1;
                    2
                } else {
                    1
                };
                for _ in 0..copies {
                    let latency = sample_latency(&state.config, &mut state.rng);
                    deliveries.push((attachment.station, attachment.service.clone(), latency));
                    state.stats.delivered += 1;
                }
            }
        }

        // Scheduled outside the medium lock; the scheduler may run
        // deliveries that send again
        for (to, service, latency) in deliveries {
            let payload = payload.to_vec();
            let state = Arc::downgrade(&self.state);
            self.scheduler.schedule(
                latency,
                Box::new(move || deliver(&state, to, &service, from, &payload)),
            );
        }
        Ok(())
    }
}

fn sample_latency(config: &MediumConfig, rng: &mut StdRng) -> Duration {
    let jitter_ms = config.max_jitter.as_millis() as u64;
    let jitter = if jitter_ms == 0 {
        0
    } else {
        rng.gen_range(0..=jitter_ms)
    };
    config.base_latency + Duration::from_millis(jitter)
}

fn deliver(
    state: &Weak<Mutex<MediumState>>,
    to: StationId,
    service: &Weak<DenService>,
    from: StationId,
    payload: &[u8],
) {
    // A station that went offline while the message was in flight misses it
    let online = state.upgrade().map_or(false, |state| {
        state
            .lock()
            .attached
            .iter()
            .any(|a| a.station == to && a.online)
    });
    if !online {
        trace!(%to, "receiver offline, copy discarded");
        return;
    }
    if let Some(service) = service.upgrade() {
        service.receive(payload, LinkAddress::Station(from));
    }
}

/// One station's view of the medium
pub struct MediumPort {
    station: StationId,
    medium: BroadcastMedium,
}

impl Transport for MediumPort {
    fn send(&self, request: TransmitRequest) -> DenmResult<()> {
        self.medium.broadcast(self.station, &request.payload)
    }
}
