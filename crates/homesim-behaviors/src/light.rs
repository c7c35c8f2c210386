//! Light engine: on/off with optional brightness/color-temp

use chrono::Duration;
use homesim_context::{ContextSnapshot, SimRng};
use homesim_core::{Domain, ServiceCall, ServiceError, Snapshot};
use homesim_homes::EntitySpec;
use serde_json::json;

use crate::engine::{Behavior, BehaviorState, StateReader, TickOutcome};

pub struct LightBehavior;

impl LightBehavior {
    /// Probability per minute of a spontaneous toggle, before occupancy
    /// modulation
    const TOGGLE_RATE_PER_MIN: f64 = 0.004;

    fn turn_on_outcome(snapshot: &Snapshot, call: &ServiceCall) -> Result<TickOutcome, ServiceError> {
        let mut outcome = TickOutcome::new("on");

        if let Some(value) = call.params.get("brightness") {
            let brightness = value.as_f64().ok_or_else(|| ServiceError::InvalidParam {
                param: "brightness".into(),
                reason: "must be a number".into(),
            })?;
            if !(0.0..=255.0).contains(&brightness) {
                return Err(ServiceError::InvalidParam {
                    param: "brightness".into(),
                    reason: format!("{brightness} outside 0..=255"),
                });
            }
            outcome = outcome.with_attr("brightness", json!(brightness.round() as u64));
        } else if snapshot.attributes.contains_key("brightness") {
            outcome = outcome.with_attr("brightness", json!(255));
        }

        if let Some(value) = call.params.get("color_temp") {
            if !snapshot.attributes.contains_key("color_temp") {
                return Err(ServiceError::InvalidParam {
                    param: "color_temp".into(),
                    reason: "light does not support color temperature".into(),
                });
            }
            let mireds = value.as_f64().ok_or_else(|| ServiceError::InvalidParam {
                param: "color_temp".into(),
                reason: "must be a number".into(),
            })?;
            outcome = outcome.with_attr("color_temp", json!(mireds.clamp(153.0, 500.0) as u64));
        }

        Ok(outcome)
    }
}

impl Behavior for LightBehavior {
    fn domain(&self) -> Domain {
        Domain::Light
    }

    fn initial_state(&self, spec: &EntitySpec, _rng: &mut SimRng) -> (TickOutcome, BehaviorState) {
        let mut outcome = TickOutcome::new("off");
        if spec.brightness {
            outcome = outcome.with_attr("brightness", json!(255));
        }
        if spec.color_temp {
            outcome = outcome
                .with_attr("color_temp", json!(370))
                .with_attr("min_mireds", json!(153))
                .with_attr("max_mireds", json!(500));
        }
        (outcome, BehaviorState::Stateless)
    }

    fn tick(
        &self,
        snapshot: &Snapshot,
        spec: &EntitySpec,
        _state: &mut BehaviorState,
        context: &ContextSnapshot,
        elapsed: Duration,
        _reader: &dyn StateReader,
        rng: &mut SimRng,
    ) -> Option<TickOutcome> {
        let minutes = elapsed.num_seconds() as f64 / 60.0;
        let occupancy = context.occupancy_likelihood;

        if snapshot.state == "off" {
            // Lights come on in occupied dark hours
            let mut rate = Self::TOGGLE_RATE_PER_MIN * occupancy * 3.0;
            if context.daylight {
                rate *= 0.25;
            }
            if rng.chance((rate * minutes).min(1.0)) {
                let mut outcome = TickOutcome::new("on");
                if spec.brightness {
                    outcome = outcome
                        .with_attr("brightness", json!(rng.uniform_usize(128, 255) as u64));
                }
                return Some(outcome);
            }
        } else {
            // Lights go out as the home empties or sleeps
            let rate = Self::TOGGLE_RATE_PER_MIN * (1.2 - occupancy).max(0.1) * 4.0;
            if rng.chance((rate * minutes).min(1.0)) {
                return Some(TickOutcome::new("off"));
            }
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
            "turn_on" => Self::turn_on_outcome(snapshot, call),
            "turn_off" => Ok(TickOutcome::new("off")),
            "toggle" => {
                if snapshot.state == "on" {
                    Ok(TickOutcome::new("off"))
                } else {
                    Self::turn_on_outcome(snapshot, call)
                }
            }
            _ => Err(ServiceError::UnknownService {
                domain: Domain::Light,
                service: call.service.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{context_at, snapshot_for};
    use homesim_core::EntityId;

    fn light_spec() -> EntitySpec {
        let id = EntityId::new(Domain::Light, "home_kitchen_light_0").unwrap();
        let mut spec = EntitySpec::new(id, "home");
        spec.brightness = true;
        spec
    }

    #[test]
    fn test_initial_state_off_with_brightness() {
        let (outcome, state) = LightBehavior.initial_state(&light_spec(), &mut SimRng::new(1));
        assert_eq!(outcome.state, "off");
        assert!(outcome.attribute_delta.contains_key("brightness"));
        assert_eq!(state, BehaviorState::Stateless);
    }

    #[test]
    fn test_turn_on_with_brightness_param() {
        let spec = light_spec();
        let (initial, mut state) = LightBehavior.initial_state(&spec, &mut SimRng::new(1));
        let snapshot = snapshot_for(&spec, &initial);
        let call = ServiceCall::new(Domain::Light, "turn_on", spec.entity_id.clone())
            .with_param("brightness", json!(200));
        let outcome = LightBehavior.apply_service(&snapshot, &mut state, &call).unwrap();
        assert_eq!(outcome.state, "on");
        assert_eq!(outcome.attribute_delta["brightness"], json!(200));
    }

    #[test]
    fn test_invalid_brightness_rejected() {
        let spec = light_spec();
        let (initial, mut state) = LightBehavior.initial_state(&spec, &mut SimRng::new(1));
        let snapshot = snapshot_for(&spec, &initial);
        let call = ServiceCall::new(Domain::Light, "turn_on", spec.entity_id.clone())
            .with_param("brightness", json!(999));
        assert!(matches!(
            LightBehavior.apply_service(&snapshot, &mut state, &call),
            Err(ServiceError::InvalidParam { .. })
        ));
    }

    #[test]
    fn test_unknown_service() {
        let spec = light_spec();
        let (initial, mut state) = LightBehavior.initial_state(&spec, &mut SimRng::new(1));
        let snapshot = snapshot_for(&spec, &initial);
        let call = ServiceCall::new(Domain::Light, "flash", spec.entity_id.clone());
        assert!(matches!(
            LightBehavior.apply_service(&snapshot, &mut state, &call),
            Err(ServiceError::UnknownService { .. })
        ));
    }

    #[test]
    fn test_tick_states_stay_legal() {
        let spec = light_spec();
        let (initial, mut state) = LightBehavior.initial_state(&spec, &mut SimRng::new(1));
        let mut snapshot = snapshot_for(&spec, &initial);
        let context = context_at("2025-01-06T20:00:00Z");
        let mut rng = SimRng::new(42);
        for _ in 0..200 {
            if let Some(outcome) = LightBehavior.tick(
                &snapshot,
                &spec,
                &mut state,
                &context,
                Duration::minutes(5),
                &crate::engine::NullReader,
                &mut rng,
            ) {
                assert!(Domain::Light.is_legal_state(&outcome.state));
                snapshot.state = outcome.state;
            }
        }
    }
}
