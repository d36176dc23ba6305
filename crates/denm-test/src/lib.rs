//! DENM Test Harness - Multi-station simulation
//!
//! This crate provides:
//! - A seeded broadcast medium with loss, latency and duplication
//! - A simulation driving several DEN services on one simulated clock
//! - End-to-end scenarios checking cross-station delivery invariants

pub mod integration;
pub mod medium;
pub mod simulation;

pub use integration::*;
pub use medium::*;
pub use simulation::*;
