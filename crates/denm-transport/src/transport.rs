//! Transport seam
//!
//! Transmission is one-way and fire-and-forget: the service learns only
//! whether the hand-off succeeded, never whether anyone received it.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use denm_core::{DenmResult, StationId};

use crate::{GeoArea, DENM_PORT};

/// Packet lifetime requested for every DENM
pub const DEFAULT_PACKET_LIFETIME: Duration = Duration::from_secs(60);

/// Hop limit requested for every DENM
pub const DEFAULT_HOP_LIMIT: u8 = 1;

/// Traffic class requested for every DENM
pub const DEFAULT_TRAFFIC_CLASS: u8 = 0x01;

/// One outgoing encoded message and its delivery parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransmitRequest {
    pub payload: Bytes,
    pub area: GeoArea,
    pub lifetime: Duration,
    pub hop_limit: u8,
    pub traffic_class: u8,
    pub destination_port: u16,
}

impl TransmitRequest {
    /// Request with the default DENM delivery parameters
    pub fn new(payload: Bytes, area: GeoArea) -> Self {
        TransmitRequest {
            payload,
            area,
            lifetime: DEFAULT_PACKET_LIFETIME,
            hop_limit: DEFAULT_HOP_LIMIT,
            traffic_class: DEFAULT_TRAFFIC_CLASS,
            destination_port: DENM_PORT,
        }
    }
}

/// Delivery of encoded messages
pub trait Transport: Send + Sync {
    /// Hand a message to the network without waiting for it to leave
    fn send(&self, request: TransmitRequest) -> DenmResult<()>;
}

/// Link-layer identity of a sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkAddress {
    Udp(SocketAddr),
    /// Station on a simulated medium
    Station(StationId),
}

impl fmt::Display for LinkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkAddress::Udp(addr) => write!(f, "udp://{}", addr),
            LinkAddress::Station(id) => write!(f, "station://{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters() {
        let req = TransmitRequest::new(Bytes::from_static(b"x"), GeoArea::default());
        assert_eq!(req.lifetime, Duration::from_secs(60));
        assert_eq!(req.hop_limit, 1);
        assert_eq!(req.traffic_class, 0x01);
        assert_eq!(req.destination_port, 2002);
    }

    #[test]
    fn test_link_address_display() {
        let addr = LinkAddress::Station(StationId::new(12));
        assert_eq!(addr.to_string(), "station://12");
    }
}
