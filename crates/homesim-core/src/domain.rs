//! Domain catalog and per-domain legal-state sets
//!
//! Each simulated entity belongs to exactly one domain. Domains with a
//! discrete state machine expose their legal-state set; continuous-valued
//! domains (sensor) accept any state string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Functional category of a simulated entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Light,
    Switch,
    BinarySensor,
    Sensor,
    Climate,
    Cover,
    MediaPlayer,
}

/// All domains, in a fixed order used for deterministic iteration
pub const ALL_DOMAINS: &[Domain] = &[
    Domain::Light,
    Domain::Switch,
    Domain::BinarySensor,
    Domain::Sensor,
    Domain::Climate,
    Domain::Cover,
    Domain::MediaPlayer,
];

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Light => "light",
            Domain::Switch => "switch",
            Domain::BinarySensor => "binary_sensor",
            Domain::Sensor => "sensor",
            Domain::Climate => "climate",
            Domain::Cover => "cover",
            Domain::MediaPlayer => "media_player",
        }
    }

    /// The legal state values for this domain, or None if the domain is
    /// continuous-valued (any state string is accepted).
    pub fn legal_states(&self) -> Option<&'static [&'static str]> {
        match self {
            Domain::Light | Domain::Switch | Domain::BinarySensor => Some(&["on", "off"]),
            Domain::Sensor => None,
            Domain::Climate => Some(&["off", "heat", "cool", "heat_cool", "auto"]),
            Domain::Cover => Some(&["open", "closed", "opening", "closing"]),
            Domain::MediaPlayer => Some(&["off", "idle", "playing", "paused"]),
        }
    }

    /// Check whether a state value is legal for this domain
    pub fn is_legal_state(&self, state: &str) -> bool {
        match self.legal_states() {
            Some(states) => states.contains(&state),
            None => true,
        }
    }

    /// Whether the domain only reports state and accepts no service calls
    pub fn is_readonly(&self) -> bool {
        matches!(self, Domain::Sensor | Domain::BinarySensor)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Domain::Light),
            "switch" => Ok(Domain::Switch),
            "binary_sensor" => Ok(Domain::BinarySensor),
            "sensor" => Ok(Domain::Sensor),
            "climate" => Ok(Domain::Climate),
            "cover" => Ok(Domain::Cover),
            "media_player" => Ok(Domain::MediaPlayer),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_states() {
        assert!(Domain::Light.is_legal_state("on"));
        assert!(Domain::Light.is_legal_state("off"));
        assert!(!Domain::Light.is_legal_state("dimmed"));

        assert!(Domain::Climate.is_legal_state("heat_cool"));
        assert!(!Domain::Climate.is_legal_state("dry"));

        assert!(Domain::Cover.is_legal_state("closing"));
        assert!(!Domain::Cover.is_legal_state("stopped"));

        // Sensors are continuous-valued
        assert!(Domain::Sensor.is_legal_state("23.5"));
        assert!(Domain::Sensor.is_legal_state("anything"));
    }

    #[test]
    fn test_roundtrip() {
        for domain in ALL_DOMAINS {
            assert_eq!(domain.as_str().parse::<Domain>().unwrap(), *domain);
        }
    }

    #[test]
    fn test_readonly() {
        assert!(Domain::Sensor.is_readonly());
        assert!(Domain::BinarySensor.is_readonly());
        assert!(!Domain::Light.is_readonly());
        assert!(!Domain::Climate.is_readonly());
    }
}
