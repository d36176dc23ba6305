//! DENM message structure
//!
//! DENM = PDU header + management container + optional situation, location
//! and a-la-carte containers.

use denm_core::{
    ActionId, Alacarte, DenmResult, EventData, Location, PduHeader, ReferencePosition, Situation,
    StationType, Termination, TimestampIts, DEFAULT_VALIDITY_SECS,
};

/// Management container as carried on the wire
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagementContainer {
    pub action_id: ActionId,
    pub detection_time: TimestampIts,
    pub reference_time: TimestampIts,
    pub termination: Option<Termination>,
    pub event_position: ReferencePosition,
    pub relevance_distance: Option<u8>,
    pub relevance_traffic_direction: Option<u8>,
    /// Seconds
    pub validity_duration: Option<u32>,
    /// Milliseconds
    pub transmission_interval: Option<u16>,
    pub station_type: StationType,
}

impl ManagementContainer {
    /// Validity duration, defaulting to 600 s when absent
    pub fn validity_duration(&self) -> u32 {
        self.validity_duration.unwrap_or(DEFAULT_VALIDITY_SECS)
    }
}

/// Complete DENM
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DenmMessage {
    pub header: PduHeader,
    pub management: ManagementContainer,
    pub situation: Option<Situation>,
    pub location: Option<Location>,
    pub alacarte: Option<Alacarte>,
}

impl DenmMessage {
    #[inline]
    pub fn action_id(&self) -> ActionId {
        self.management.action_id
    }

    #[inline]
    pub fn termination(&self) -> Option<Termination> {
        self.management.termination
    }

    /// Convert a decoded message back into application event data
    pub fn to_event_data(&self) -> DenmResult<EventData> {
        let mgmt = &self.management;
        let mut data = EventData::new()
            .with_mandatory_fields(mgmt.detection_time, mgmt.event_position);

        if let Some(validity) = mgmt.validity_duration {
            data.set_validity_duration(validity)?;
        }

        data.header = Some(self.header);
        data.action_id = Some(mgmt.action_id);
        data.reference_time = Some(mgmt.reference_time);
        data.station_type = Some(mgmt.station_type);
        data.termination = mgmt.termination;
        data.relevance_distance = mgmt.relevance_distance;
        data.relevance_traffic_direction = mgmt.relevance_traffic_direction;
        data.transmission_interval = mgmt.transmission_interval;
        data.situation = self.situation.clone();
        data.location = self.location.clone();
        data.alacarte = self.alacarte.clone();

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::denm_header;
    use denm_core::{CauseCode, StationId};

    fn sample() -> DenmMessage {
        DenmMessage {
            header: denm_header(StationId::new(10)),
            management: ManagementContainer {
                action_id: ActionId::new(StationId::new(10), 3),
                detection_time: TimestampIts::from_millis(1_000),
                reference_time: TimestampIts::from_millis(1_200),
                termination: Some(Termination::IsNegation),
                event_position: ReferencePosition::from_degrees(45.0, 7.0),
                relevance_distance: Some(2),
                relevance_traffic_direction: None,
                validity_duration: None,
                transmission_interval: Some(100),
                station_type: StationType::RoadSideUnit,
            },
            situation: Some(Situation {
                information_quality: 3,
                event_type: CauseCode::new(94, 0),
                ..Default::default()
            }),
            location: None,
            alacarte: None,
        }
    }

    #[test]
    fn test_default_validity() {
        assert_eq!(sample().management.validity_duration(), DEFAULT_VALIDITY_SECS);
    }

    #[test]
    fn test_to_event_data_carries_received_fields() {
        let msg = sample();
        let data = msg.to_event_data().unwrap();

        assert_eq!(data.action_id, Some(msg.action_id()));
        assert_eq!(data.reference_time, Some(TimestampIts::from_millis(1_200)));
        assert_eq!(data.detection_time(), Some(TimestampIts::from_millis(1_000)));
        assert_eq!(data.station_type, Some(StationType::RoadSideUnit));
        assert_eq!(data.termination, Some(Termination::IsNegation));
        assert_eq!(data.header.map(|h| h.station_id), Some(StationId::new(10)));
        assert_eq!(data.situation.as_ref().map(|s| s.event_type.cause), Some(94));
        assert!(data.location.is_none());
        assert!(data.validity_duration_field().is_none());
    }
}
