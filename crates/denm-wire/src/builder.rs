//! Message builder
//!
//! Assembles an outgoing [`DenmMessage`] from application [`EventData`], the
//! allocated action id and a reference time. Optional containers are copied
//! only when present in the event data; an absent container stays absent.

use denm_core::{
    ActionId, Alacarte, DenmError, DenmResult, EventData, Location, Situation, StationId,
    StationType, TimestampIts,
};

use crate::{denm_header, DenmMessage, ManagementContainer};

/// Builds messages on behalf of one station
#[derive(Clone, Copy, Debug)]
pub struct MessageBuilder {
    station_id: StationId,
    station_type: StationType,
}

impl MessageBuilder {
    pub fn new(station_id: StationId, station_type: StationType) -> Self {
        MessageBuilder {
            station_id,
            station_type,
        }
    }

    pub fn station_id(&self) -> StationId {
        self.station_id
    }

    pub fn station_type(&self) -> StationType {
        self.station_type
    }

    /// Build a message; nothing is returned unless every part was built
    pub fn build(
        &self,
        data: &EventData,
        action_id: ActionId,
        reference_time: TimestampIts,
    ) -> DenmResult<DenmMessage> {
        let mandatory = data.mandatory().ok_or(DenmError::WrongDeData)?;

        let management = ManagementContainer {
            action_id,
            detection_time: mandatory.detection_time,
            reference_time,
            termination: data.termination,
            event_position: mandatory.event_position,
            relevance_distance: data.relevance_distance,
            relevance_traffic_direction: data.relevance_traffic_direction,
            validity_duration: data.validity_duration_field(),
            transmission_interval: data.transmission_interval,
            station_type: self.station_type,
        };

        let situation = data.situation.as_ref().map(copy_situation).transpose()?;
        let location = data.location.as_ref().map(copy_location).transpose()?;
        let alacarte = data.alacarte.as_ref().map(copy_alacarte).transpose()?;

        Ok(DenmMessage {
            header: denm_header(self.station_id),
            management,
            situation,
            location,
            alacarte,
        })
    }
}

fn try_copy<T: Clone>(items: &[T]) -> DenmResult<Vec<T>> {
    let mut out = Vec::new();
    out.try_reserve_exact(items.len())
        .map_err(|_| DenmError::AllocError)?;
    out.extend_from_slice(items);
    Ok(out)
}

fn copy_situation(situation: &Situation) -> DenmResult<Situation> {
    Ok(Situation {
        information_quality: situation.information_quality,
        event_type: situation.event_type,
        linked_cause: situation.linked_cause,
        event_history: try_copy(&situation.event_history)?,
    })
}

fn copy_location(location: &Location) -> DenmResult<Location> {
    let mut traces = Vec::new();
    traces
        .try_reserve_exact(location.traces.len())
        .map_err(|_| DenmError::AllocError)?;
    for trace in &location.traces {
        traces.push(try_copy(trace)?);
    }

    Ok(Location {
        event_speed: location.event_speed,
        event_position_heading: location.event_position_heading,
        traces,
        road_type: location.road_type,
    })
}

fn copy_alacarte(alacarte: &Alacarte) -> DenmResult<Alacarte> {
    let road_works = match &alacarte.road_works {
        Some(rw) => {
            let mut copy = rw.clone();
            copy.reference_denms = try_copy(&rw.reference_denms)?;
            Some(copy)
        }
        None => None,
    };

    Ok(Alacarte {
        lane_position: alacarte.lane_position,
        external_temperature: alacarte.external_temperature,
        positioning_solution: alacarte.positioning_solution,
        road_works,
        stationary_vehicle: alacarte.stationary_vehicle.clone(),
    })
}
