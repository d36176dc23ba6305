//! Service configuration
//!
//! Loaded from JSON; every field has a default so a partial file is enough.
//!
//! ```json
//! {
//!   "station_id": 1001,
//!   "station_type": "PassengerCar",
//!   "geo_area": { "shape": "circle", "latitude": 450703393, "longitude": 76869005, "distance_a": 500 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use denm_core::{StationId, StationType};
use denm_transport::{
    GeoArea, DEFAULT_HOP_LIMIT, DEFAULT_PACKET_LIFETIME, DEFAULT_TRAFFIC_CLASS, DENM_PORT,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::TracingConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// DEN basic service configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Unset until the station identity is known
    pub station_id: Option<StationId>,
    pub station_type: Option<StationType>,
    /// Destination area of every transmission
    pub geo_area: GeoArea,
    pub destination_port: u16,
    pub packet_lifetime_secs: u64,
    pub hop_limit: u8,
    pub traffic_class: u8,
    pub tracing: TracingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            station_id: None,
            station_type: None,
            geo_area: GeoArea::default(),
            destination_port: DENM_PORT,
            packet_lifetime_secs: DEFAULT_PACKET_LIFETIME.as_secs(),
            hop_limit: DEFAULT_HOP_LIMIT,
            traffic_class: DEFAULT_TRAFFIC_CLASS,
            tracing: TracingConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Configuration for a station whose identity is already known
    pub fn for_station(station_id: StationId, station_type: StationType) -> Self {
        ServiceConfig {
            station_id: Some(station_id),
            station_type: Some(station_type),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn packet_lifetime(&self) -> Duration {
        Duration::from_secs(self.packet_lifetime_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use denm_transport::GeoShape;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.destination_port, 2002);
        assert_eq!(config.packet_lifetime(), Duration::from_secs(60));
        assert_eq!(config.hop_limit, 1);
        assert_eq!(config.traffic_class, 0x01);
        assert!(config.station_id.is_none());
    }

    #[test]
    fn test_partial_json() {
        let config = ServiceConfig::from_json(
            r#"{
                "station_id": 1001,
                "station_type": "RoadSideUnit",
                "geo_area": { "shape": "ellipse", "latitude": 1, "longitude": 2, "distance_a": 300, "distance_b": 100 },
                "tracing": { "level": "debug" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.station_id, Some(StationId::new(1001)));
        assert_eq!(config.station_type, Some(StationType::RoadSideUnit));
        assert_eq!(config.geo_area.shape, GeoShape::Ellipse);
        assert_eq!(config.geo_area.angle, 0);
        assert_eq!(config.hop_limit, 1);
        assert_eq!(config.tracing.level, "debug");
        assert!(!config.tracing.json);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = ServiceConfig::for_station(StationId::new(7), StationType::Bus);
        let json = config.to_json().unwrap();
        assert_eq!(ServiceConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ServiceConfig::from_json(r#"{ "hop_limit": "many" }"#),
            Err(ConfigError::Json(_))
        ));
    }
}
