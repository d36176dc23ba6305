//! Destination areas for geo-broadcast
//!
//! Only the description of the area is carried here; forwarding towards it is
//! left to the network layer underneath the transport.

use serde::{Deserialize, Serialize};

/// Shape of a destination area
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoShape {
    #[default]
    Circle,
    Rectangle,
    Ellipse,
}

impl GeoShape {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(GeoShape::Circle),
            1 => Some(GeoShape::Rectangle),
            2 => Some(GeoShape::Ellipse),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Geographic destination area
///
/// Centre in 0.1 micro-degrees, distances in metres, angle in degrees from
/// north. A circle only uses `distance_a`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GeoArea {
    pub shape: GeoShape,
    pub latitude: i32,
    pub longitude: i32,
    pub distance_a: u16,
    #[serde(default)]
    pub distance_b: u16,
    #[serde(default)]
    pub angle: u16,
}

impl GeoArea {
    /// Circular area around a centre given in degrees
    pub fn circle(latitude_deg: f64, longitude_deg: f64, radius_m: u16) -> Self {
        GeoArea {
            shape: GeoShape::Circle,
            latitude: (latitude_deg * 1e7).round() as i32,
            longitude: (longitude_deg * 1e7).round() as i32,
            distance_a: radius_m,
            distance_b: 0,
            angle: 0,
        }
    }

    /// Rectangular area; `half_length_m` along `angle`, `half_width_m` across
    pub fn rectangle(
        latitude_deg: f64,
        longitude_deg: f64,
        half_length_m: u16,
        half_width_m: u16,
        angle: u16,
    ) -> Self {
        GeoArea {
            shape: GeoShape::Rectangle,
            distance_b: half_width_m,
            angle: angle % 360,
            ..Self::circle(latitude_deg, longitude_deg, half_length_m)
        }
    }

    /// Elliptical area with semi-axes `a` (along `angle`) and `b`
    pub fn ellipse(latitude_deg: f64, longitude_deg: f64, a_m: u16, b_m: u16, angle: u16) -> Self {
        GeoArea {
            shape: GeoShape::Ellipse,
            ..Self::rectangle(latitude_deg, longitude_deg, a_m, b_m, angle)
        }
    }
}
