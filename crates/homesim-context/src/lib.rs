//! Ambient context generation for homesim
//!
//! Behavior engines read a per-home ContextSnapshot: outdoor weather,
//! daylight, calendar flags and an occupancy-likelihood value. Everything
//! here is a deterministic function of virtual time, home parameters and
//! the run seed, which is what makes batch generation reproducible.

mod calendar;
mod daylight;
mod generator;
mod occupancy;
mod rng;
mod weather;

pub use calendar::{CalendarTable, VacationWindow};
pub use daylight::Daylight;
pub use generator::{ContextGenerator, ContextSnapshot, HomeContextParams};
pub use occupancy::occupancy_likelihood;
pub use rng::SimRng;
pub use weather::{WeatherModel, WeatherSample};
