//! Shared fixtures for engine tests

use chrono::{DateTime, Utc};
use homesim_context::ContextSnapshot;
use homesim_core::Snapshot;
use homesim_homes::EntitySpec;

use crate::engine::TickOutcome;

/// Snapshot as the store would hold it after applying `outcome`
pub fn snapshot_for(spec: &EntitySpec, outcome: &TickOutcome) -> Snapshot {
    Snapshot::new(
        spec.entity_id.clone(),
        outcome.state.clone(),
        outcome.attribute_delta.clone(),
        "2025-01-06T12:00:00Z".parse().unwrap(),
        spec.home_id.clone(),
    )
}

/// An unremarkable occupied-evening context at the given instant
pub fn context_at(ts: &str) -> ContextSnapshot {
    let timestamp: DateTime<Utc> = ts.parse().unwrap();
    ContextSnapshot {
        timestamp,
        outdoor_temp_c: 4.0,
        rel_humidity: 55.0,
        precip: false,
        daylight: false,
        solar_elevation: -10.0,
        holiday: false,
        weekend: false,
        dst_transition: false,
        vacation_active: false,
        occupancy_likelihood: 0.9,
    }
}
