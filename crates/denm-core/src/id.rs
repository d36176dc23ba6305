//! Identity types for the DEN basic service
//!
//! An event notification is named for its entire lifetime by an
//! [`ActionId`]: the originating station plus a per-station sequence number.

use std::fmt;

use serde::{Deserialize, Serialize};

/// ITS station identifier (32-bit on the wire)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct StationId(pub u32);

impl StationId {
    pub const ZERO: StationId = StationId(0);

    #[inline]
    pub fn new(id: u32) -> Self {
        StationId(id)
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        StationId(u32::from_le_bytes(bytes))
    }
}

impl fmt::Debug for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Station({:08x})", self.0)
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ITS station type (ETSI TS 102 894-2 StationType)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum StationType {
    #[default]
    Unknown = 0,
    Pedestrian = 1,
    Cyclist = 2,
    Moped = 3,
    Motorcycle = 4,
    PassengerCar = 5,
    Bus = 6,
    LightTruck = 7,
    HeavyTruck = 8,
    Trailer = 9,
    SpecialVehicle = 10,
    Tram = 11,
    RoadSideUnit = 15,
}

impl StationType {
    /// Parse from wire byte
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(StationType::Unknown),
            1 => Some(StationType::Pedestrian),
            2 => Some(StationType::Cyclist),
            3 => Some(StationType::Moped),
            4 => Some(StationType::Motorcycle),
            5 => Some(StationType::PassengerCar),
            6 => Some(StationType::Bus),
            7 => Some(StationType::LightTruck),
            8 => Some(StationType::HeavyTruck),
            9 => Some(StationType::Trailer),
            10 => Some(StationType::SpecialVehicle),
            11 => Some(StationType::Tram),
            15 => Some(StationType::RoadSideUnit),
            _ => None,
        }
    }

    /// Convert to wire byte
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Action identity - unique name of one event notification
///
/// The sequence number is allocated by the originating station and never
/// reused while the station is alive.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ActionId {
    pub originating_station: StationId,
    pub sequence_number: u32,
}

impl ActionId {
    #[inline]
    pub fn new(originating_station: StationId, sequence_number: u32) -> Self {
        ActionId {
            originating_station,
            sequence_number,
        }
    }
}

impl fmt::Debug for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Action({}:{})",
            self.originating_station.0, self.sequence_number
        )
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.originating_station.0, self.sequence_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_id_bytes() {
        let id = StationId::new(0xDEADBEEF);
        assert_eq!(StationId::from_bytes(id.to_bytes()), id);
    }

    #[test]
    fn test_station_type_byte() {
        assert_eq!(StationType::from_byte(15), Some(StationType::RoadSideUnit));
        assert_eq!(StationType::from_byte(12), None);
        assert_eq!(StationType::PassengerCar.to_byte(), 5);
    }

    #[test]
    fn test_action_id_display() {
        let id = ActionId::new(StationId::new(42), 7);
        assert_eq!(id.to_string(), "42:7");
        assert_eq!(format!("{:?}", id), "Action(42:7)");
    }

    #[test]
    fn test_action_id_ordering_within_station() {
        let station = StationId::new(3);
        assert!(ActionId::new(station, 1) < ActionId::new(station, 2));
    }
}
