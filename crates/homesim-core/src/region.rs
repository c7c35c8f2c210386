//! Climate regions and their behavioral multipliers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Climate region of a simulated home
///
/// Each region carries a latitude band and a set of multipliers that shape
/// HVAC, lighting and irrigation activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    North,
    South,
    AridWest,
    MarineWest,
    EastMidwest,
}

/// All regions, in a fixed order used for deterministic iteration
pub const ALL_REGIONS: &[Region] = &[
    Region::North,
    Region::South,
    Region::AridWest,
    Region::MarineWest,
    Region::EastMidwest,
];

/// Per-region configuration: latitude band and activity multipliers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub lat_range: (f64, f64),
    pub hvac_mult: f64,
    pub dehum_mult: f64,
    pub lighting_winter_mult: f64,
    pub irrigation_mult: f64,
    pub solar_mult: f64,
    pub storm_burst_mult: f64,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::North => "north",
            Region::South => "south",
            Region::AridWest => "arid_west",
            Region::MarineWest => "marine_west",
            Region::EastMidwest => "east_midwest",
        }
    }

    /// Builtin configuration for this region
    pub fn config(&self) -> RegionConfig {
        match self {
            Region::North => RegionConfig {
                lat_range: (43.0, 49.0),
                hvac_mult: 1.25,
                dehum_mult: 0.8,
                lighting_winter_mult: 1.3,
                irrigation_mult: 0.7,
                solar_mult: 0.85,
                storm_burst_mult: 1.0,
            },
            Region::South => RegionConfig {
                lat_range: (26.0, 34.0),
                hvac_mult: 1.35,
                dehum_mult: 1.4,
                lighting_winter_mult: 0.9,
                irrigation_mult: 1.1,
                solar_mult: 1.15,
                storm_burst_mult: 1.3,
            },
            Region::AridWest => RegionConfig {
                lat_range: (32.0, 40.0),
                hvac_mult: 1.2,
                dehum_mult: 0.4,
                lighting_winter_mult: 0.95,
                irrigation_mult: 1.5,
                solar_mult: 1.3,
                storm_burst_mult: 0.6,
            },
            Region::MarineWest => RegionConfig {
                lat_range: (42.0, 48.5),
                hvac_mult: 0.9,
                dehum_mult: 1.2,
                lighting_winter_mult: 1.25,
                irrigation_mult: 0.6,
                solar_mult: 0.8,
                storm_burst_mult: 1.1,
            },
            Region::EastMidwest => RegionConfig {
                lat_range: (38.0, 45.0),
                hvac_mult: 1.3,
                dehum_mult: 1.1,
                lighting_winter_mult: 1.15,
                irrigation_mult: 0.9,
                solar_mult: 0.95,
                storm_burst_mult: 1.15,
            },
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "north" => Ok(Region::North),
            "south" => Ok(Region::South),
            "arid_west" => Ok(Region::AridWest),
            "marine_west" => Ok(Region::MarineWest),
            "east_midwest" => Ok(Region::EastMidwest),
            _ => Err(()),
        }
    }
}
