//! Core types for the homesim simulation kernel
//!
//! This crate provides the fundamental types shared across the workspace:
//! EntityId, Domain, Snapshot, ChangeRecord and ServiceCall.

mod change_record;
mod domain;
mod entity_id;
mod profile;
mod region;
mod service_call;
mod snapshot;

pub use change_record::ChangeRecord;
pub use domain::{Domain, ALL_DOMAINS};
pub use entity_id::{EntityId, EntityIdError};
pub use profile::{FeatureFlags, OccupancyProfile, Profile, ProfileConfig, ALL_PROFILES};
pub use region::{Region, RegionConfig, ALL_REGIONS};
pub use service_call::{ServiceCall, ServiceError};
pub use snapshot::Snapshot;

/// Identifier of a simulated home (e.g. "sta_north_003")
pub type HomeId = String;
