//! Cover engine: position tracking at a bounded motor rate
//!
//! The exact boundary states "open"/"closed" appear only at position
//! 100/0; anything mid-travel reports "opening"/"closing", and a stop
//! mid-travel reads "open".

use chrono::Duration;
use homesim_context::{ContextSnapshot, SimRng};
use homesim_core::{Domain, ServiceCall, ServiceError, Snapshot};
use homesim_homes::EntitySpec;
use serde_json::json;

use crate::engine::{Behavior, BehaviorState, StateReader, TickOutcome};

pub struct CoverBehavior;

impl CoverBehavior {
    /// Motor travel rate, position units per minute
    const RATE_PER_MIN: f64 = 40.0;

    fn outcome_for(position: f64, target: f64) -> TickOutcome {
        let state = if position <= 0.0 {
            "closed"
        } else if position >= 100.0 {
            "open"
        } else if target > position {
            "opening"
        } else if target < position {
            "closing"
        } else {
            "open"
        };
        TickOutcome::new(state).with_attr("current_position", json!(position.round() as u64))
    }
}

impl Behavior for CoverBehavior {
    fn domain(&self) -> Domain {
        Domain::Cover
    }

    fn initial_state(&self, spec: &EntitySpec, _rng: &mut SimRng) -> (TickOutcome, BehaviorState) {
        let mut outcome = TickOutcome::new("closed").with_attr("current_position", json!(0));
        if let Some(device_class) = &spec.device_class {
            outcome = outcome.with_attr("device_class", json!(device_class));
        }
        (
            outcome,
            BehaviorState::Cover {
                position: 0.0,
                target: 0.0,
            },
        )
    }

    fn tick(
        &self,
        snapshot: &Snapshot,
        _spec: &EntitySpec,
        state: &mut BehaviorState,
        context: &ContextSnapshot,
        elapsed: Duration,
        _reader: &dyn StateReader,
        rng: &mut SimRng,
    ) -> Option<TickOutcome> {
        let BehaviorState::Cover { position, target } = state else {
            return None;
        };
        let minutes = elapsed.num_seconds() as f64 / 60.0;
        let hour = chrono::Timelike::hour(&context.timestamp);

        // Morning open / evening close nudges, occupancy permitting
        if (*position - *target).abs() < f64::EPSILON {
            if (6..8).contains(&hour) && *position < 100.0 {
                if rng.chance((0.05 * context.occupancy_likelihood * minutes).min(1.0)) {
                    *target = 100.0;
                }
            } else if (17..19).contains(&hour) && *position > 0.0 {
                if rng.chance((0.05 * context.occupancy_likelihood * minutes).min(1.0)) {
                    *target = 0.0;
                }
            }
        }

        if (*position - *target).abs() < f64::EPSILON {
            return None;
        }

        let step = (Self::RATE_PER_MIN * minutes).min((*target - *position).abs());
        *position += step * (*target - *position).signum();
        *position = position.clamp(0.0, 100.0);

        let outcome = Self::outcome_for(*position, *target);
        if outcome.state == snapshot.state
            && snapshot.attribute_f64("current_position") == Some(position.round())
        {
            return None;
        }
        Some(outcome)
    }

    fn apply_service(
        &self,
        snapshot: &Snapshot,
        state: &mut BehaviorState,
        call: &ServiceCall,
    ) -> Result<TickOutcome, ServiceError> {
        let BehaviorState::Cover { position, target } = state else {
            return Err(ServiceError::EntityNotFound(snapshot.entity_id.to_string()));
        };
        match call.service.as_str() {
            "open_cover" => {
                *target = 100.0;
                Ok(Self::outcome_for(*position, *target))
            }
            "close_cover" => {
                *target = 0.0;
                Ok(Self::outcome_for(*position, *target))
            }
            "stop_cover" => {
                *target = *position;
                Ok(Self::outcome_for(*position, *target))
            }
            "set_cover_position" => {
                let requested =
                    call.param_f64("position")
                        .ok_or_else(|| ServiceError::InvalidParam {
                            param: "position".into(),
                            reason: "missing or not a number".into(),
                        })?;
                if !(0.0..=100.0).contains(&requested) {
                    return Err(ServiceError::InvalidParam {
                        param: "position".into(),
                        reason: format!("{requested} outside 0..=100"),
                    });
                }
                *target = requested;
                Ok(Self::outcome_for(*position, *target))
            }
            _ => Err(ServiceError::UnknownService {
                domain: Domain::Cover,
                service: call.service.clone(),
            }),
        }
    }
}
