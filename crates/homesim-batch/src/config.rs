//! Batch run configuration
//!
//! Loaded from YAML. Probabilities are validated to [0, 1] up front;
//! configuration errors are fatal at startup, nothing later re-checks
//! them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::BatchError;

/// Fault injection probabilities, independent per record
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FaultConfig {
    #[serde(default = "default_p_drop")]
    pub p_drop: f64,
    #[serde(default = "default_p_dup")]
    pub p_dup: f64,
    #[serde(default = "default_p_reorder")]
    pub p_reorder: f64,
    /// Device replacement; much rarer than the transport faults
    #[serde(default = "default_p_rename")]
    pub p_rename: f64,
}

fn default_p_drop() -> f64 {
    0.005
}
fn default_p_dup() -> f64 {
    0.003
}
fn default_p_reorder() -> f64 {
    0.001
}
fn default_p_rename() -> f64 {
    0.00002
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            p_drop: default_p_drop(),
            p_dup: default_p_dup(),
            p_reorder: default_p_reorder(),
            p_rename: default_p_rename(),
        }
    }
}

impl FaultConfig {
    pub fn validate(&self) -> Result<(), BatchError> {
        for (name, p) in [
            ("p_drop", self.p_drop),
            ("p_dup", self.p_dup),
            ("p_reorder", self.p_reorder),
            ("p_rename", self.p_rename),
        ] {
            if !(0.0..=1.0).contains(&p) || !p.is_finite() {
                return Err(BatchError::Config(format!(
                    "fault probability {name}={p} outside [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

/// Per-feature sampling probabilities
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureProbs {
    pub camera_integration: f64,
    pub solar: f64,
    pub irrigation: f64,
    pub energy_monitoring: f64,
}

impl Default for FeatureProbs {
    fn default() -> Self {
        Self {
            camera_integration: 0.3,
            solar: 0.2,
            irrigation: 0.15,
            energy_monitoring: 0.35,
        }
    }
}

/// Occupancy sampling ranges
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct OccupancyRanges {
    pub wfh_ratio: (f64, f64),
    pub has_kids_probability: f64,
    pub shift_worker_probability: f64,
}

impl Default for OccupancyRanges {
    fn default() -> Self {
        Self {
            wfh_ratio: (0.2, 0.5),
            has_kids_probability: 0.5,
            shift_worker_probability: 0.1,
        }
    }
}

/// Output sharding parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: PathBuf,
    #[serde(default = "default_shards_per_month")]
    pub shards_per_month: u32,
    #[serde(default = "default_max_rows")]
    pub max_rows_per_shard: usize,
}

fn default_shards_per_month() -> u32 {
    8
}
fn default_max_rows() -> usize {
    500_000
}

/// One batch run, fully described
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_year")]
    pub year: i32,

    /// Home counts keyed by profile name ("starter", "power"...)
    pub homes: BTreeMap<String, usize>,

    /// Region weights keyed by region name; empty means uniform
    #[serde(default)]
    pub region_mix: BTreeMap<String, f64>,

    #[serde(default)]
    pub feature_probs: FeatureProbs,

    #[serde(default)]
    pub occupancy: OccupancyRanges,

    #[serde(default)]
    pub faults: FaultConfig,

    pub output: OutputConfig,
}

fn default_seed() -> u64 {
    42
}
fn default_year() -> i32 {
    2025
}

impl BatchConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, BatchError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, BatchError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BatchError> {
        self.faults.validate()?;
        for (name, p) in [
            ("camera_integration", self.feature_probs.camera_integration),
            ("solar", self.feature_probs.solar),
            ("irrigation", self.feature_probs.irrigation),
            ("energy_monitoring", self.feature_probs.energy_monitoring),
            ("has_kids_probability", self.occupancy.has_kids_probability),
            (
                "shift_worker_probability",
                self.occupancy.shift_worker_probability,
            ),
        ] {
            if !(0.0..=1.0).contains(&p) || !p.is_finite() {
                return Err(BatchError::Config(format!("{name}={p} outside [0, 1]")));
            }
        }
        let (wfh_low, wfh_high) = self.occupancy.wfh_ratio;
        if !(0.0..=1.0).contains(&wfh_low) || !(0.0..=1.0).contains(&wfh_high) || wfh_low > wfh_high
        {
            return Err(BatchError::Config(format!(
                "wfh_ratio range ({wfh_low}, {wfh_high}) invalid"
            )));
        }
        for (profile, count) in &self.homes {
            if profile.parse::<homesim_core::Profile>().is_err() {
                return Err(BatchError::Config(format!("unknown profile '{profile}'")));
            }
            if *count == 0 {
                return Err(BatchError::Config(format!(
                    "profile '{profile}' has zero homes"
                )));
            }
        }
        for region in self.region_mix.keys() {
            if region.parse::<homesim_core::Region>().is_err() {
                return Err(BatchError::Config(format!("unknown region '{region}'")));
            }
        }
        if self.output.shards_per_month == 0 {
            return Err(BatchError::Config("shards_per_month must be > 0".into()));
        }
        if self.output.max_rows_per_shard == 0 {
            return Err(BatchError::Config("max_rows_per_shard must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
seed: 42
year: 2025
homes:
  starter: 2
output:
  path: out
"#;

    #[test]
    fn test_minimal_yaml_with_defaults() {
        let config = BatchConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.homes["starter"], 2);
        assert_eq!(config.output.shards_per_month, 8);
        assert!((config.faults.p_drop - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_probability_is_fatal() {
        let text = r#"
homes:
  starter: 1
faults:
  p_drop: 1.5
output:
  path: out
"#;
        assert!(matches!(
            BatchConfig::from_yaml(text),
            Err(BatchError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_profile_rejected() {
        let text = r#"
homes:
  mansion: 1
output:
  path: out
"#;
        assert!(matches!(
            BatchConfig::from_yaml(text),
            Err(BatchError::Config(_))
        ));
    }
}
