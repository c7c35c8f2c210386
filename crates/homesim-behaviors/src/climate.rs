//! Climate engine: thermostat with bounded-rate setpoint tracking
//!
//! The public state is the active sub-mode: "heat" while heating, "cool"
//! while cooling, the configured mode while idle. Mutually exclusive
//! active modes never follow each other directly; the engine passes
//! through the idle check (deadband around the setpoint) every tick
//! before re-selecting.

use chrono::Duration;
use homesim_context::{ContextSnapshot, SimRng};
use homesim_core::{Domain, ServiceCall, ServiceError, Snapshot};
use homesim_homes::EntitySpec;
use serde_json::json;

use crate::engine::{Behavior, BehaviorState, StateReader, TickOutcome};

pub struct ClimateBehavior;

impl ClimateBehavior {
    const MIN_TEMP: f64 = 10.0;
    const MAX_TEMP: f64 = 35.0;
    /// Half-width of the idle band around the setpoint
    const DEADBAND: f64 = 0.5;
    /// Indoor drift toward outdoor temperature, fraction per minute
    const DRIFT_RATE: f64 = 0.002;
    /// HVAC heating/cooling power, degrees per minute
    const HVAC_RATE: f64 = 0.3;

    fn round1(v: f64) -> f64 {
        (v * 10.0).round() / 10.0
    }

    /// Configured mode recorded in attributes; the state string shows the
    /// active sub-mode
    fn configured_mode(snapshot: &Snapshot) -> String {
        snapshot
            .attribute::<String>("hvac_mode")
            .unwrap_or_else(|| "off".to_string())
    }
}

impl Behavior for ClimateBehavior {
    fn domain(&self) -> Domain {
        Domain::Climate
    }

    fn initial_state(&self, _spec: &EntitySpec, rng: &mut SimRng) -> (TickOutcome, BehaviorState) {
        let current = rng.uniform(19.0, 22.0);
        let outcome = TickOutcome::new("off")
            .with_attr("hvac_mode", json!("off"))
            .with_attr("current_temperature", json!(Self::round1(current)))
            .with_attr("temperature", json!(21.0))
            .with_attr("min_temp", json!(Self::MIN_TEMP))
            .with_attr("max_temp", json!(Self::MAX_TEMP));
        (
            outcome,
            BehaviorState::Climate {
                current_temp: current,
                target_temp: 21.0,
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
        let BehaviorState::Climate {
            current_temp,
            target_temp,
        } = state
        else {
            return None;
        };
        let minutes = elapsed.num_seconds() as f64 / 60.0;
        let mode = Self::configured_mode(snapshot);

        // Thermal drift toward outdoors happens regardless of mode
        let drift = (context.outdoor_temp_c - *current_temp)
            * (Self::DRIFT_RATE * minutes).min(1.0);

        let gap = *target_temp - *current_temp;

        // An active sub-mode either continues or returns to the configured
        // (idle) mode; re-arming happens from idle on the next tick, so
        // heat and cool never follow each other directly
        let next_state = if mode == "off" {
            "off".to_string()
        } else if snapshot.state == "heat" {
            if gap > 0.0 { "heat".to_string() } else { mode.clone() }
        } else if snapshot.state == "cool" {
            if gap < 0.0 { "cool".to_string() } else { mode.clone() }
        } else {
            match mode.as_str() {
                "heat" if gap > Self::DEADBAND => "heat".to_string(),
                "cool" if gap < -Self::DEADBAND => "cool".to_string(),
                "heat_cool" | "auto" if gap > Self::DEADBAND => "heat".to_string(),
                "heat_cool" | "auto" if gap < -Self::DEADBAND => "cool".to_string(),
                _ => mode.clone(),
            }
        };

        // Conditioning runs only while the gap points the right way
        let hvac_effect = match next_state.as_str() {
            "heat" if gap > 0.0 => Self::HVAC_RATE * minutes,
            "cool" if gap < 0.0 => -Self::HVAC_RATE * minutes,
            _ => 0.0,
        };

        *current_temp += drift + hvac_effect + rng.normal(0.0, 0.05);
        let rounded = Self::round1(*current_temp);

        if next_state == snapshot.state
            && snapshot.attribute_f64("current_temperature") == Some(rounded)
        {
            return None;
        }
        Some(
            TickOutcome::new(next_state).with_attr("current_temperature", json!(rounded)),
        )
    }

    fn apply_service(
        &self,
        snapshot: &Snapshot,
        state: &mut BehaviorState,
        call: &ServiceCall,
    ) -> Result<TickOutcome, ServiceError> {
        let BehaviorState::Climate { target_temp, .. } = state else {
            return Err(ServiceError::EntityNotFound(snapshot.entity_id.to_string()));
        };
        match call.service.as_str() {
            "set_temperature" => {
                let temp = call
                    .param_f64("temperature")
                    .ok_or_else(|| ServiceError::InvalidParam {
                        param: "temperature".into(),
                        reason: "missing or not a number".into(),
                    })?;
                let clamped = temp.clamp(Self::MIN_TEMP, Self::MAX_TEMP);
                let mut outcome = TickOutcome::new(snapshot.state.clone())
                    .with_attr("temperature", json!(clamped));
                if let Some(mode) = call.param_str("hvac_mode") {
                    if !Domain::Climate.is_legal_state(mode) {
                        return Err(ServiceError::InvalidParam {
                            param: "hvac_mode".into(),
                            reason: format!("'{mode}' is not a climate mode"),
                        });
                    }
                    outcome = outcome.with_attr("hvac_mode", json!(mode));
                    outcome.state = mode.to_string();
                }
                *target_temp = clamped;
                Ok(outcome)
            }
            "set_hvac_mode" => {
                let mode = call
                    .param_str("hvac_mode")
                    .ok_or_else(|| ServiceError::InvalidParam {
                        param: "hvac_mode".into(),
                        reason: "missing".into(),
                    })?;
                if !Domain::Climate.is_legal_state(mode) {
                    return Err(ServiceError::InvalidParam {
                        param: "hvac_mode".into(),
                        reason: format!("'{mode}' is not a climate mode"),
                    });
                }
                Ok(TickOutcome::new(mode).with_attr("hvac_mode", json!(mode)))
            }
            _ => Err(ServiceError::UnknownService {
                domain: Domain::Climate,
                service: call.service.clone(),
            }),
        }
    }
}
