//! DENM Runtime - The DEN basic service
//!
//! [`DenService`] owns the originating and receiving tables and implements
//! the four protocol transitions:
//! 1. `trigger` - announce a new event under a fresh action id
//! 2. `update` - re-announce an active event with new data
//! 3. `terminate` - cancel an own event or negate a relayed one
//! 4. `receive` - accept, deduplicate and age events from other stations
//!
//! Time, timers, transport and codec are injected, so the same engine runs
//! under a tokio runtime or inside a deterministic simulation.

pub mod config;
pub mod driver;
pub mod service;
pub mod stats;
pub mod tables;
pub mod telemetry;

mod originating;
mod receiving;

#[cfg(test)]
mod testing;

pub use config::*;
pub use driver::*;
pub use receiving::{DropReason, ReceiveOutcome};
pub use service::*;
pub use stats::*;
pub use tables::*;
pub use telemetry::*;
