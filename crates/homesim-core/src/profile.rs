//! Home profiles, feature flags and occupancy profiles

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Size/complexity tier of a simulated home
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    Starter,
    Intermediate,
    Advanced,
    Power,
}

/// All profiles, in a fixed order used for deterministic iteration
pub const ALL_PROFILES: &[Profile] = &[
    Profile::Starter,
    Profile::Intermediate,
    Profile::Advanced,
    Profile::Power,
];

/// Per-profile entity/device count distribution parameters
///
/// Counts are drawn from a lognormal characterized by median and p90, then
/// clamped to `entity_range` so a home always falls within its tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub entity_median: f64,
    pub entity_p90: f64,
    pub device_median: f64,
    pub device_p90: f64,
    /// Hard bounds on total entity count for this tier
    pub entity_range: (usize, usize),
    /// Share of sensors that are virtual/template entities
    pub sensor_virtual_share: (f64, f64),
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Starter => "starter",
            Profile::Intermediate => "intermediate",
            Profile::Advanced => "advanced",
            Profile::Power => "power",
        }
    }

    /// Builtin configuration for this profile
    pub fn config(&self) -> ProfileConfig {
        match self {
            Profile::Starter => ProfileConfig {
                entity_median: 70.0,
                entity_p90: 110.0,
                device_median: 14.0,
                device_p90: 22.0,
                entity_range: (50, 140),
                sensor_virtual_share: (0.05, 0.15),
            },
            Profile::Intermediate => ProfileConfig {
                entity_median: 160.0,
                entity_p90: 240.0,
                device_median: 30.0,
                device_p90: 45.0,
                entity_range: (120, 300),
                sensor_virtual_share: (0.10, 0.25),
            },
            Profile::Advanced => ProfileConfig {
                entity_median: 350.0,
                entity_p90: 520.0,
                device_median: 65.0,
                device_p90: 95.0,
                entity_range: (260, 650),
                sensor_virtual_share: (0.15, 0.35),
            },
            Profile::Power => ProfileConfig {
                entity_median: 700.0,
                entity_p90: 1100.0,
                device_median: 130.0,
                device_p90: 200.0,
                entity_range: (520, 1400),
                sensor_virtual_share: (0.25, 0.45),
            },
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starter" => Ok(Profile::Starter),
            "intermediate" => Ok(Profile::Intermediate),
            "advanced" => Ok(Profile::Advanced),
            "power" => Ok(Profile::Power),
            _ => Err(()),
        }
    }
}

/// Optional capabilities a home may carry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub camera_integration: bool,
    pub solar: bool,
    pub irrigation: bool,
    pub energy_monitoring: bool,
}

/// Occupancy characteristics of a home's residents
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OccupancyProfile {
    /// Fraction of weekdays worked from home
    pub wfh_ratio: f64,
    pub has_kids: bool,
    pub shift_worker: bool,
}

impl Default for OccupancyProfile {
    fn default() -> Self {
        Self {
            wfh_ratio: 0.3,
            has_kids: false,
            shift_worker: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        for profile in ALL_PROFILES {
            assert_eq!(profile.as_str().parse::<Profile>().unwrap(), *profile);
        }
    }

    #[test]
    fn test_ranges_bracket_median() {
        for profile in ALL_PROFILES {
            let cfg = profile.config();
            assert!((cfg.entity_range.0 as f64) <= cfg.entity_median);
            assert!(cfg.entity_median < cfg.entity_p90);
            assert!((cfg.entity_range.1 as f64) >= cfg.entity_p90);
        }
    }
}
