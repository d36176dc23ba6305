//! DENM Transport - Delivery of encoded messages
//!
//! This crate provides:
//! - The [`Transport`] seam the service hands encoded messages to
//! - Destination areas ([`GeoArea`]) and transmit parameters
//! - A BTP-B style port header
//! - A UDP adapter with a background receive loop
//! - An in-memory recording transport

pub mod btp;
pub mod geo;
pub mod recording;
pub mod transport;
pub mod udp;

pub use btp::*;
pub use geo::*;
pub use recording::*;
pub use transport::*;
pub use udp::*;
