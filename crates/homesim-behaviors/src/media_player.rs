//! Media player engine: off/idle/playing/paused with playback tracking

use chrono::{Duration, Timelike};
use homesim_context::{ContextSnapshot, SimRng};
use homesim_core::{Domain, ServiceCall, ServiceError, Snapshot};
use homesim_homes::EntitySpec;
use serde_json::json;

use crate::engine::{Behavior, BehaviorState, StateReader, TickOutcome};

const SOURCES: &[&str] = &["Spotify", "YouTube", "Netflix", "Plex", "HDMI 1"];

pub struct MediaPlayerBehavior;

impl MediaPlayerBehavior {
    fn usage_probability(hour: u32) -> f64 {
        match hour {
            6..=8 => 0.2,
            12..=13 => 0.15,
            17..=22 => 0.6,
            _ => 0.05,
        }
    }
}

impl Behavior for MediaPlayerBehavior {
    fn domain(&self) -> Domain {
        Domain::MediaPlayer
    }

    fn initial_state(&self, _spec: &EntitySpec, _rng: &mut SimRng) -> (TickOutcome, BehaviorState) {
        let outcome = TickOutcome::new("off")
            .with_attr("volume_level", json!(0.3))
            .with_attr("source_list", json!(SOURCES))
            .with_attr("source", json!(SOURCES[0]));
        (
            outcome,
            BehaviorState::Media {
                position_s: 0.0,
                duration_s: 0.0,
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
        let BehaviorState::Media {
            position_s,
            duration_s,
        } = state
        else {
            return None;
        };
        let minutes = elapsed.num_seconds() as f64 / 60.0;
        let usage = Self::usage_probability(context.timestamp.hour())
            * context.occupancy_likelihood;

        match snapshot.state.as_str() {
            "off" | "idle" => {
                if rng.chance((usage * 0.01 * minutes).min(1.0)) {
                    *duration_s = rng.uniform(180.0, 7200.0);
                    *position_s = 0.0;
                    let source = SOURCES[rng.uniform_usize(0, SOURCES.len() - 1)];
                    return Some(
                        TickOutcome::new("playing")
                            .with_attr("source", json!(source))
                            .with_attr("media_duration", json!(duration_s.round() as u64))
                            .with_attr("media_position", json!(0)),
                    );
                }
            }
            "playing" => {
                *position_s += elapsed.num_seconds() as f64;
                if *position_s >= *duration_s {
                    // Finished
                    *position_s = 0.0;
                    *duration_s = 0.0;
                    return Some(TickOutcome::new("idle"));
                }
                if rng.chance((0.01 * minutes).min(1.0)) {
                    return Some(
                        TickOutcome::new("paused")
                            .with_attr("media_position", json!(position_s.round() as u64)),
                    );
                }
                return Some(
                    TickOutcome::new("playing")
                        .with_attr("media_position", json!(position_s.round() as u64)),
                );
            }
            "paused" => {
                if rng.chance((0.02 * minutes).min(1.0)) {
                    return Some(TickOutcome::new("playing"));
                }
                if rng.chance((0.01 * minutes).min(1.0)) {
                    return Some(TickOutcome::new("off"));
                }
            }
            _ => {}
        }
        None
    }

    fn apply_service(
        &self,
        snapshot: &Snapshot,
        state: &mut BehaviorState,
        call: &ServiceCall,
    ) -> Result<TickOutcome, ServiceError> {
        match call.service.as_str() {
            "turn_on" => Ok(TickOutcome::new("idle")),
            "turn_off" => Ok(TickOutcome::new("off")),
            "media_play" => {
                if let BehaviorState::Media { duration_s, .. } = state {
                    if *duration_s == 0.0 {
                        *duration_s = 1800.0;
                    }
                }
                Ok(TickOutcome::new("playing"))
            }
            "media_pause" => Ok(TickOutcome::new("paused")),
            "media_stop" => Ok(TickOutcome::new("idle")),
            "volume_set" => {
                let volume =
                    call.param_f64("volume_level")
                        .ok_or_else(|| ServiceError::InvalidParam {
                            param: "volume_level".into(),
                            reason: "missing or not a number".into(),
                        })?;
                if !(0.0..=1.0).contains(&volume) {
                    return Err(ServiceError::InvalidParam {
                        param: "volume_level".into(),
                        reason: format!("{volume} outside 0..=1"),
                    });
                }
                Ok(TickOutcome::new(snapshot.state.clone())
                    .with_attr("volume_level", json!(volume)))
            }
            "select_source" => {
                // Source is free-form, validated for type only
                let source =
                    call.param_str("source")
                        .ok_or_else(|| ServiceError::InvalidParam {
                            param: "source".into(),
                            reason: "missing or not a string".into(),
                        })?;
                Ok(TickOutcome::new(snapshot.state.clone()).with_attr("source", json!(source)))
            }
            _ => Err(ServiceError::UnknownService {
                domain: Domain::MediaPlayer,
                service: call.service.clone(),
            }),
        }
    }
}
