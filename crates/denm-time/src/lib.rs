//! DENM Time - Clocks and timers
//!
//! The protocol engine never reads wall-clock time or sleeps itself. It
//! depends on two seams:
//! - [`Clock`]: the current ITS timestamp (system or manually driven)
//! - [`Scheduler`]: one-shot delayed callbacks with idempotent cancel
//!
//! [`SimScheduler`] runs callbacks in simulated time for deterministic tests,
//! [`TokioScheduler`] runs them on a tokio runtime. [`TimerSet`] groups the
//! timers owned by one table entry.

pub mod clock;
pub mod scheduler;
pub mod timer_set;
pub mod tokio_scheduler;

pub use clock::*;
pub use scheduler::*;
pub use timer_set::*;
pub use tokio_scheduler::*;
