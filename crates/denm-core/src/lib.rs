//! DENM Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout the DEN basic service:
//! - Identifiers (StationId, ActionId, StationType)
//! - ITS timestamps
//! - Event data model (management, situation, location, a-la-carte)
//! - Originating / receiving table entries
//! - Error taxonomy

pub mod id;
pub mod time;
pub mod event;
pub mod entry;
pub mod error;

pub use id::*;
pub use time::*;
pub use event::*;
pub use entry::*;
pub use error::*;
