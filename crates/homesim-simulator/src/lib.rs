//! Simulation coordinator for homesim
//!
//! The `Simulator` composes one virtual clock, one scheduler, one entity
//! store, one event bus, one context generator and the behavior-engine set,
//! and exposes the external control surface: home registration, state
//! queries, service calls, change-record subscriptions, clock control and
//! run statistics.

mod config;
mod error;
mod simulator;

pub use config::SimConfig;
pub use error::SimulatorError;
pub use simulator::{HomeSetup, Simulator, SimulatorStats};
