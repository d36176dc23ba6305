//! DENM Wire - Message structure and binary format
//!
//! This crate implements:
//! - ITS PDU header with the message-kind tag at a fixed offset
//! - Presence flags for optional fields and containers
//! - The message structure and its builder from event data
//! - The codec seam and a compact little-endian binary codec

pub mod builder;
pub mod codec;
pub mod header;
pub mod message;
pub mod presence;

pub use builder::*;
pub use codec::*;
pub use header::*;
pub use message::*;
pub use presence::*;
