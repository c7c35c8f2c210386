//! Sensor engine: continuous-valued telemetry
//!
//! Outdoor-linked temperature/humidity track the weather context with
//! smoothing; power sensors read their monitored entity through the
//! store; energy integrates the linked power sensor; battery decreases
//! monotonically except on rare recharge.

use chrono::Duration;
use homesim_context::{ContextSnapshot, SimRng};
use homesim_core::{Domain, ServiceCall, ServiceError, Snapshot};
use homesim_homes::EntitySpec;
use serde_json::json;

use crate::engine::{readonly_service, Behavior, BehaviorState, StateReader, TickOutcome};

pub struct SensorBehavior;

impl SensorBehavior {
    fn unit_for(device_class: &str) -> Option<&'static str> {
        match device_class {
            "temperature" => Some("°C"),
            "humidity" => Some("%"),
            "battery" => Some("%"),
            "power" => Some("W"),
            "energy" => Some("kWh"),
            "illuminance" => Some("lx"),
            "pm25" => Some("µg/m³"),
            "co2" => Some("ppm"),
            _ => None,
        }
    }

    fn initial_value(device_class: &str) -> f64 {
        match device_class {
            "temperature" => 20.0,
            "humidity" => 50.0,
            "battery" => 100.0,
            "illuminance" => 10.0,
            "pm25" => 5.0,
            "co2" => 400.0,
            _ => 0.0,
        }
    }

    fn round1(v: f64) -> f64 {
        (v * 10.0).round() / 10.0
    }
}

impl Behavior for SensorBehavior {
    fn domain(&self) -> Domain {
        Domain::Sensor
    }

    fn initial_state(&self, spec: &EntitySpec, rng: &mut SimRng) -> (TickOutcome, BehaviorState) {
        let device_class = spec.device_class.as_deref().unwrap_or("template");
        let value = Self::initial_value(device_class);
        let battery = if spec.battery_powered {
            rng.uniform(80.0, 100.0)
        } else {
            100.0
        };

        let mut outcome = TickOutcome::new(format!("{value}"));
        outcome = outcome.with_attr("device_class", json!(device_class));
        if let Some(unit) = Self::unit_for(device_class) {
            outcome = outcome.with_attr("unit_of_measurement", json!(unit));
        }
        if device_class == "energy" {
            outcome = outcome.with_attr("state_class", json!("total_increasing"));
        } else if device_class != "template" {
            outcome = outcome.with_attr("state_class", json!("measurement"));
        }

        (outcome, BehaviorState::Sensor { value, battery })
    }

    fn tick(
        &self,
        snapshot: &Snapshot,
        spec: &EntitySpec,
        state: &mut BehaviorState,
        context: &ContextSnapshot,
        elapsed: Duration,
        reader: &dyn StateReader,
        rng: &mut SimRng,
    ) -> Option<TickOutcome> {
        let BehaviorState::Sensor { value, battery: _ } = state else {
            return None;
        };
        let hours = elapsed.num_seconds() as f64 / 3600.0;
        let device_class = spec.device_class.as_deref().unwrap_or("template");

        let new_value = match device_class {
            "temperature" => {
                let target = if spec.outdoor {
                    context.outdoor_temp_c
                } else {
                    21.0 + rng.normal(0.0, 0.5)
                };
                Self::round1(*value + (target - *value) * 0.1 + rng.normal(0.0, 0.1))
            }
            "humidity" => {
                let target = if spec.outdoor {
                    context.rel_humidity
                } else {
                    45.0 + rng.normal(0.0, 5.0)
                };
                Self::round1((*value + (target - *value) * 0.1 + rng.normal(0.0, 1.0)).clamp(0.0, 100.0))
            }
            "illuminance" => {
                let target = if context.daylight {
                    (context.solar_elevation.max(0.0) / 90.0) * 1200.0
                } else {
                    10.0
                };
                (*value + (target - *value) * 0.2 + rng.normal(0.0, 20.0)).max(0.0).round()
            }
            "battery" => {
                // Monotonic drain with a rare recharge
                if rng.chance(0.0005) {
                    100.0
                } else {
                    Self::round1((*value - rng.uniform(0.0, 0.2) * hours).max(0.0))
                }
            }
            "pm25" => Self::round1((5.0 + rng.normal(0.0, 2.0)).max(0.0)),
            "co2" => {
                let drift = rng.normal(0.0, 20.0) + context.occupancy_likelihood * 15.0;
                (*value + drift).clamp(400.0, 2000.0).round()
            }
            "power" => {
                let monitored_on = spec
                    .linked_entity
                    .as_ref()
                    .and_then(|id| reader.read(id))
                    .map(|s| s.state == "on")
                    .unwrap_or(false);
                if monitored_on {
                    let rated = spec.rated_power_w.unwrap_or(10.0);
                    Self::round1(rated * rng.uniform(0.9, 1.1))
                } else {
                    // Phantom load
                    Self::round1(rng.uniform(0.0, 0.5))
                }
            }
            "energy" => {
                let watts = spec
                    .power_sensor
                    .as_ref()
                    .and_then(|id| reader.read(id))
                    .and_then(|s| s.state.parse::<f64>().ok())
                    .unwrap_or(0.0);
                let kwh = *value + watts * hours / 1000.0;
                (kwh * 1000.0).round() / 1000.0
            }
            _ => Self::round1(*value + rng.normal(0.0, 0.05)),
        };

        *value = new_value;
        let rendered = format!("{new_value}");
        if rendered == snapshot.state {
            return None;
        }
        Some(TickOutcome::new(rendered))
    }

    fn apply_service(
        &self,
        _snapshot: &Snapshot,
        _state: &mut BehaviorState,
        _call: &ServiceCall,
    ) -> Result<TickOutcome, ServiceError> {
        readonly_service(Domain::Sensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NullReader;
    use crate::testutil::{context_at, snapshot_for};
    use homesim_core::EntityId;
    use std::collections::HashMap;

    fn sensor_spec(device_class: &str) -> EntitySpec {
        let id = EntityId::new(
            Domain::Sensor,
            format!("home_room_{device_class}_0"),
        )
        .unwrap();
        EntitySpec::new(id, "home").with_device_class(device_class)
    }

    struct FixedReader(Snapshot);

    impl StateReader for FixedReader {
        fn read(&self, entity_id: &EntityId) -> Option<Snapshot> {
            (self.0.entity_id == *entity_id).then(|| self.0.clone())
        }
    }

    #[test]
    fn test_outdoor_temperature_tracks_weather() {
        let mut spec = sensor_spec("temperature");
        spec.outdoor = true;
        let (initial, mut state) = SensorBehavior.initial_state(&spec, &mut SimRng::new(1));
        let mut snapshot = snapshot_for(&spec, &initial);
        let mut context = context_at("2025-01-06T12:00:00Z");
        context.outdoor_temp_c = -5.0;
        let mut rng = SimRng::new(42);
        for _ in 0..100 {
            if let Some(outcome) = SensorBehavior.tick(
                &snapshot,
                &spec,
                &mut state,
                &context,
                Duration::minutes(1),
                &NullReader,
                &mut rng,
            ) {
                snapshot.state = outcome.state;
            }
        }
        let value: f64 = snapshot.state.parse().unwrap();
        assert!((value - (-5.0)).abs() < 3.0, "value {value} did not converge");
    }

    #[test]
    fn test_power_follows_monitored_entity() {
        let plug_id = EntityId::new(Domain::Switch, "home_room_plug_0").unwrap();
        let mut spec = sensor_spec("power");
        spec.linked_entity = Some(plug_id.clone());
        spec.rated_power_w = Some(100.0);

        let (initial, mut state) = SensorBehavior.initial_state(&spec, &mut SimRng::new(1));
        let snapshot = snapshot_for(&spec, &initial);
        let context = context_at("2025-01-06T12:00:00Z");
        let mut rng = SimRng::new(42);

        let on_plug = Snapshot::new(
            plug_id.clone(),
            "on",
            HashMap::new(),
            context.timestamp,
            "home",
        );
        let outcome = SensorBehavior
            .tick(
                &snapshot,
                &spec,
                &mut state,
                &context,
                Duration::seconds(10),
                &FixedReader(on_plug),
                &mut rng,
            )
            .unwrap();
        let watts: f64 = outcome.state.parse().unwrap();
        assert!((90.0..=110.0).contains(&watts));

        let off_plug = Snapshot::new(plug_id, "off", HashMap::new(), context.timestamp, "home");
        let outcome = SensorBehavior
            .tick(
                &snapshot,
                &spec,
                &mut state,
                &context,
                Duration::seconds(10),
                &FixedReader(off_plug),
                &mut rng,
            )
            .unwrap();
        let watts: f64 = outcome.state.parse().unwrap();
        assert!(watts < 1.0, "phantom load was {watts}");
    }

    #[test]
    fn test_energy_integrates_power() {
        let power_id = EntityId::new(Domain::Sensor, "home_room_plug_0_power").unwrap();
        let mut spec = sensor_spec("energy");
        spec.power_sensor = Some(power_id.clone());

        let (initial, mut state) = SensorBehavior.initial_state(&spec, &mut SimRng::new(1));
        let snapshot = snapshot_for(&spec, &initial);
        let context = context_at("2025-01-06T12:00:00Z");
        let mut rng = SimRng::new(42);
        let power = Snapshot::new(power_id, "1000", HashMap::new(), context.timestamp, "home");

        let outcome = SensorBehavior
            .tick(
                &snapshot,
                &spec,
                &mut state,
                &context,
                Duration::hours(2),
                &FixedReader(power),
                &mut rng,
            )
            .unwrap();
        // 1000 W for 2 h = 2 kWh
        assert_eq!(outcome.state, "2");
    }

    #[test]
    fn test_battery_monotonic_without_recharge() {
        let spec = sensor_spec("battery");
        let (initial, mut state) = SensorBehavior.initial_state(&spec, &mut SimRng::new(1));
        let mut snapshot = snapshot_for(&spec, &initial);
        let context = context_at("2025-01-06T12:00:00Z");
        let mut rng = SimRng::new(42);
        let mut last = 100.0;
        for _ in 0..50 {
            if let Some(outcome) = SensorBehavior.tick(
                &snapshot,
                &spec,
                &mut state,
                &context,
                Duration::hours(1),
                &NullReader,
                &mut rng,
            ) {
                let value: f64 = outcome.state.parse().unwrap();
                assert!(value <= last || value == 100.0);
                last = value;
                snapshot.state = outcome.state;
            }
        }
    }
}
