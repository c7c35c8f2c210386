//! Switch engine: on/off with a rated-power attribute

use chrono::Duration;
use homesim_context::{ContextSnapshot, SimRng};
use homesim_core::{Domain, ServiceCall, ServiceError, Snapshot};
use homesim_homes::EntitySpec;
use serde_json::json;

use crate::engine::{Behavior, BehaviorState, StateReader, TickOutcome};

pub struct SwitchBehavior;

impl SwitchBehavior {
    const TOGGLE_RATE_PER_MIN: f64 = 0.002;
}

impl Behavior for SwitchBehavior {
    fn domain(&self) -> Domain {
        Domain::Switch
    }

    fn initial_state(&self, spec: &EntitySpec, rng: &mut SimRng) -> (TickOutcome, BehaviorState) {
        // Plugs feeding appliances often sit on
        let mut outcome = TickOutcome::new(if rng.chance(0.3) { "on" } else { "off" });
        if let Some(rated) = spec.rated_power_w {
            outcome = outcome.with_attr("rated_power_w", json!((rated * 10.0).round() / 10.0));
        }
        (outcome, BehaviorState::Stateless)
    }

    fn tick(
        &self,
        snapshot: &Snapshot,
        _spec: &EntitySpec,
        _state: &mut BehaviorState,
        context: &ContextSnapshot,
        elapsed: Duration,
        _reader: &dyn StateReader,
        rng: &mut SimRng,
    ) -> Option<TickOutcome> {
        let minutes = elapsed.num_seconds() as f64 / 60.0;
        let modulation = if snapshot.state == "off" {
            context.occupancy_likelihood
        } else {
            (1.0 - context.occupancy_likelihood).max(0.2)
        };
        if rng.chance((Self::TOGGLE_RATE_PER_MIN * modulation * minutes).min(1.0)) {
            let next = if snapshot.state == "on" { "off" } else { "on" };
            return Some(TickOutcome::new(next));
        }
        None
    }

    fn apply_service(
        &self,
        snapshot: &Snapshot,
        _state: &mut BehaviorState,
        call: &ServiceCall,
    ) -> Result<TickOutcome, ServiceError> {
        match call.service.as_str() {
            "turn_on" => Ok(TickOutcome::new("on")),
            "turn_off" => Ok(TickOutcome::new("off")),
            "toggle" => Ok(TickOutcome::new(if snapshot.state == "on" {
                "off"
            } else {
                "on"
            })),
            _ => Err(ServiceError::UnknownService {
                domain: Domain::Switch,
                service: call.service.clone(),
            }),
        }
    }
}
