//! The `Behavior` trait and shared engine types

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use homesim_context::{ContextSnapshot, SimRng};
use homesim_core::{Domain, EntityId, ServiceCall, ServiceError, Snapshot};
use homesim_homes::EntitySpec;
use serde_json::Value;

use crate::{
    BinarySensorBehavior, ClimateBehavior, CoverBehavior, LightBehavior, MediaPlayerBehavior,
    SensorBehavior, SwitchBehavior,
};

/// Hidden per-entity state owned by the engine side
///
/// Never exposed through the store; snapshots only carry the public state
/// string and attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum BehaviorState {
    /// Domains whose snapshot fully describes them
    Stateless,

    /// Motion/contact sensors: dwell deadline and battery level
    Binary {
        dwell_until: Option<DateTime<Utc>>,
        battery: f64,
    },

    /// Continuous sensor: smoothed value, battery, energy accumulator
    Sensor { value: f64, battery: f64 },

    /// Thermostat: tracked temperature and setpoint
    Climate { current_temp: f64, target_temp: f64 },

    /// Cover: exact position and motion target
    Cover { position: f64, target: f64 },

    /// Media player: playback position within the current item
    Media { position_s: f64, duration_s: f64 },
}

/// The result of one tick or service application
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub state: String,
    pub attribute_delta: HashMap<String, Value>,
}

impl TickOutcome {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            attribute_delta: HashMap::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attribute_delta.insert(key.into(), value);
        self
    }
}

/// Read-only cross-entity snapshot lookup, implemented by the entity store
pub trait StateReader: Send + Sync {
    fn read(&self, entity_id: &EntityId) -> Option<Snapshot>;
}

/// No-op reader for engines with no cross-entity links
pub struct NullReader;

impl StateReader for NullReader {
    fn read(&self, _entity_id: &EntityId) -> Option<Snapshot> {
        None
    }
}

/// One domain's state-machine policy
pub trait Behavior: Send + Sync {
    fn domain(&self) -> Domain;

    /// Initial public state, attributes and hidden state for a fresh entity
    fn initial_state(&self, spec: &EntitySpec, rng: &mut SimRng) -> (TickOutcome, BehaviorState);

    /// Advance the entity by `elapsed` of virtual time; None means no change
    fn tick(
        &self,
        snapshot: &Snapshot,
        spec: &EntitySpec,
        state: &mut BehaviorState,
        context: &ContextSnapshot,
        elapsed: Duration,
        reader: &dyn StateReader,
        rng: &mut SimRng,
    ) -> Option<TickOutcome>;

    /// Translate a service call into a transition; no state is mutated on error
    fn apply_service(
        &self,
        snapshot: &Snapshot,
        state: &mut BehaviorState,
        call: &ServiceCall,
    ) -> Result<TickOutcome, ServiceError>;
}

/// The engine for a domain
pub fn behavior_for(domain: Domain) -> &'static dyn Behavior {
    match domain {
        Domain::Light => &LightBehavior,
        Domain::Switch => &SwitchBehavior,
        Domain::BinarySensor => &BinarySensorBehavior,
        Domain::Sensor => &SensorBehavior,
        Domain::Climate => &ClimateBehavior,
        Domain::Cover => &CoverBehavior,
        Domain::MediaPlayer => &MediaPlayerBehavior,
    }
}

/// Reject any service call against a read-only domain
pub(crate) fn readonly_service(domain: Domain) -> Result<TickOutcome, ServiceError> {
    Err(ServiceError::ReadonlyDomain(domain))
}

#[cfg(test)]
mod tests {
    use super::*;
    use homesim_core::ALL_DOMAINS;

    #[test]
    fn test_dispatch_covers_every_domain() {
        for domain in ALL_DOMAINS {
            assert_eq!(behavior_for(*domain).domain(), *domain);
        }
    }
}
