//! Behavior engines for homesim
//!
//! One engine per domain, behind the `Behavior` trait. Engines never talk
//! to each other; cross-entity reads (a power sensor watching a plug) go
//! through the `StateReader` snapshot lookup, which keeps ticks for
//! distinct entities independently parallelizable.

mod binary_sensor;
mod climate;
mod cover;
mod engine;
mod light;
mod media_player;
mod sensor;
mod switch;
#[cfg(test)]
mod testutil;

pub use binary_sensor::BinarySensorBehavior;
pub use climate::ClimateBehavior;
pub use cover::CoverBehavior;
pub use engine::{behavior_for, Behavior, BehaviorState, StateReader, TickOutcome};
pub use light::LightBehavior;
pub use media_player::MediaPlayerBehavior;
pub use sensor::SensorBehavior;
pub use switch::SwitchBehavior;
