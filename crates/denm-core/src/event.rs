//! Event data model
//!
//! [`EventData`] is what applications hand to `trigger`/`update`/`terminate`
//! and what they get back from the receive path. It holds a management block
//! (mandatory detection time and event position, plus optional fields) and
//! three optional containers, each present or absent as a whole.

use std::time::Duration;

use crate::{ActionId, DenmError, DenmResult, StationId, StationType, TimestampIts};

/// Validity applied when the management block carries none
pub const DEFAULT_VALIDITY_SECS: u32 = 600;

/// Largest validity duration accepted (one day)
pub const MAX_VALIDITY_SECS: u32 = 86_400;

/// Termination marker carried by cancelling / negating messages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Termination {
    /// The originating station retracts its own event
    IsCancellation = 0,
    /// A relaying station overrides an event it did not originate
    IsNegation = 1,
}

impl Termination {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Termination::IsCancellation),
            1 => Some(Termination::IsNegation),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Position confidence ellipse (ETSI units, 4095/3601 = unavailable)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PosConfidenceEllipse {
    pub semi_major_confidence: u16,
    pub semi_minor_confidence: u16,
    pub semi_major_orientation: u16,
}

impl PosConfidenceEllipse {
    pub const UNAVAILABLE: PosConfidenceEllipse = PosConfidenceEllipse {
        semi_major_confidence: 4095,
        semi_minor_confidence: 4095,
        semi_major_orientation: 3601,
    };
}

impl Default for PosConfidenceEllipse {
    fn default() -> Self {
        Self::UNAVAILABLE
    }
}

/// Altitude in centimetres with a confidence class
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Altitude {
    pub value: i32,
    pub confidence: u8,
}

impl Altitude {
    pub const UNAVAILABLE: Altitude = Altitude {
        value: 800_001,
        confidence: 15,
    };
}

impl Default for Altitude {
    fn default() -> Self {
        Self::UNAVAILABLE
    }
}

/// Absolute position, latitude/longitude in 0.1 micro-degrees
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReferencePosition {
    pub latitude: i32,
    pub longitude: i32,
    pub confidence: PosConfidenceEllipse,
    pub altitude: Altitude,
}

impl ReferencePosition {
    /// Build a position from degrees, leaving confidence and altitude unavailable
    pub fn from_degrees(latitude_deg: f64, longitude_deg: f64) -> Self {
        ReferencePosition {
            latitude: (latitude_deg * 1e7).round() as i32,
            longitude: (longitude_deg * 1e7).round() as i32,
            confidence: PosConfidenceEllipse::UNAVAILABLE,
            altitude: Altitude::UNAVAILABLE,
        }
    }

    /// Set the altitude from metres
    pub fn with_altitude_m(mut self, altitude_m: f64) -> Self {
        self.altitude.value = (altitude_m * 100.0).round() as i32;
        self
    }

    pub fn latitude_deg(&self) -> f64 {
        self.latitude as f64 / 1e7
    }

    pub fn longitude_deg(&self) -> f64 {
        self.longitude as f64 / 1e7
    }
}

/// Position offset relative to the event position
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeltaReferencePosition {
    pub delta_latitude: i32,
    pub delta_longitude: i32,
    pub delta_altitude: i16,
}

/// Cause code / sub-cause code pair
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CauseCode {
    pub cause: u8,
    pub sub_cause: u8,
}

impl CauseCode {
    pub fn new(cause: u8, sub_cause: u8) -> Self {
        CauseCode { cause, sub_cause }
    }
}

/// Speed (0.01 m/s) with confidence
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Speed {
    pub value: u16,
    pub confidence: u8,
}

/// Heading (0.1 degree) with confidence
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Heading {
    pub value: u16,
    pub confidence: u8,
}

/// One point of the event history
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventPoint {
    pub position: DeltaReferencePosition,
    pub delta_time: Option<u16>,
    pub information_quality: u8,
}

/// One point of a trace
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PathPoint {
    pub position: DeltaReferencePosition,
    pub delta_time: Option<u16>,
}

/// Situation container
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Situation {
    pub information_quality: u8,
    pub event_type: CauseCode,
    pub linked_cause: Option<CauseCode>,
    pub event_history: Vec<EventPoint>,
}

/// Location container
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    pub event_speed: Option<Speed>,
    pub event_position_heading: Option<Heading>,
    pub traces: Vec<Vec<PathPoint>>,
    pub road_type: Option<u8>,
}

/// Road works extension of the a-la-carte container
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoadWorks {
    pub light_bar_siren_in_use: Option<u8>,
    pub speed_limit: Option<u8>,
    pub traffic_flow_rule: Option<u8>,
    pub cause: Option<CauseCode>,
    pub reference_denms: Vec<ActionId>,
}

/// Stationary vehicle extension of the a-la-carte container
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StationaryVehicle {
    pub stationary_since: Option<u8>,
    pub cause: Option<CauseCode>,
    pub number_of_occupants: Option<u8>,
    pub energy_storage_type: Option<u8>,
}

/// A-la-carte container
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Alacarte {
    pub lane_position: Option<i8>,
    pub external_temperature: Option<i8>,
    pub positioning_solution: Option<u8>,
    pub road_works: Option<RoadWorks>,
    pub stationary_vehicle: Option<StationaryVehicle>,
}

/// Fields that must be set before a request is accepted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mandatory {
    pub detection_time: TimestampIts,
    pub event_position: ReferencePosition,
}

/// Header information of a received message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PduHeader {
    pub protocol_version: u8,
    pub message_id: u8,
    pub station_id: StationId,
}

/// Event notification data exchanged with applications
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventData {
    mandatory: Option<Mandatory>,
    validity_duration: Option<u32>,
    /// Set on received data; for update/terminate requests the action id is
    /// passed explicitly instead
    pub action_id: Option<ActionId>,
    /// Set on received data
    pub reference_time: Option<TimestampIts>,
    /// Set on received data
    pub station_type: Option<StationType>,
    /// Set on received data
    pub header: Option<PduHeader>,
    pub termination: Option<Termination>,
    pub relevance_distance: Option<u8>,
    pub relevance_traffic_direction: Option<u8>,
    /// Transmission interval hint in milliseconds
    pub transmission_interval: Option<u16>,
    pub situation: Option<Situation>,
    pub location: Option<Location>,
    pub alacarte: Option<Alacarte>,
    repetition_interval: Duration,
    repetition_duration: Duration,
}

impl EventData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set detection time and event position
    pub fn set_mandatory_fields(&mut self, detection_time: TimestampIts, position: ReferencePosition) {
        self.mandatory = Some(Mandatory {
            detection_time,
            event_position: position,
        });
    }

    /// Builder-style variant of [`EventData::set_mandatory_fields`]
    pub fn with_mandatory_fields(mut self, detection_time: TimestampIts, position: ReferencePosition) -> Self {
        self.set_mandatory_fields(detection_time, position);
        self
    }

    pub fn mandatory(&self) -> Option<&Mandatory> {
        self.mandatory.as_ref()
    }

    /// True once the mandatory fields have been set
    pub fn is_complete(&self) -> bool {
        self.mandatory.is_some()
    }

    pub fn detection_time(&self) -> Option<TimestampIts> {
        self.mandatory.map(|m| m.detection_time)
    }

    pub fn event_position(&self) -> Option<ReferencePosition> {
        self.mandatory.map(|m| m.event_position)
    }

    /// Set the validity duration in seconds (0..=86400)
    pub fn set_validity_duration(&mut self, secs: u32) -> DenmResult<()> {
        if secs > MAX_VALIDITY_SECS {
            return Err(DenmError::InvalidValidityDuration(secs));
        }
        self.validity_duration = Some(secs);
        Ok(())
    }

    /// Validity duration in seconds, defaulting to 600 when unset
    pub fn validity_duration(&self) -> u32 {
        self.validity_duration.unwrap_or(DEFAULT_VALIDITY_SECS)
    }

    /// Validity duration exactly as set (None when the default applies)
    pub fn validity_duration_field(&self) -> Option<u32> {
        self.validity_duration
    }

    /// Configure retransmission: every `interval` for a total of `duration`
    pub fn set_repetition(&mut self, duration: Duration, interval: Duration) {
        self.repetition_duration = duration;
        self.repetition_interval = interval;
    }

    pub fn repetition_interval(&self) -> Duration {
        self.repetition_interval
    }

    pub fn repetition_duration(&self) -> Duration {
        self.repetition_duration
    }

    /// Repetition is active only when both interval and duration are non-zero
    pub fn has_repetition(&self) -> bool {
        !self.repetition_interval.is_zero() && !self.repetition_duration.is_zero()
    }

    /// True when `now` is past detection time plus validity duration
    pub fn is_expired(&self, now: TimestampIts) -> bool {
        match self.mandatory {
            Some(m) => m.detection_time.is_expired(self.validity_duration(), now),
            None => false,
        }
    }
}
