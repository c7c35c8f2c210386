//! Home synthesis for homesim
//!
//! A home is drawn deterministically from the run seed: profile-scaled
//! entity/device counts, a region with latitude, feature flags, an
//! occupancy profile and vacation windows, then exploded into concrete
//! entity specs the behavior engines animate.

mod builder;
mod spec;

pub use builder::{Home, HomeBuilder};
pub use spec::{DeviceCategory, EntitySpec, ALL_DEVICE_CATEGORIES};
