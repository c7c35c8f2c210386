//! Simulation runtime for homesim: virtual clock and task scheduler
//!
//! The clock provides virtual time advancing at a configurable multiple of
//! wall-clock speed with pause/resume and forward time travel. The scheduler
//! fires recurring and one-shot tasks on virtual-time boundaries, driven by
//! the clock, and stays correct across pause/resume/speed changes.

mod clock;
mod scheduler;

pub use clock::{ClockError, SimulationClock};
pub use scheduler::{Scheduler, TaskFuture, TaskId, TaskKind};
