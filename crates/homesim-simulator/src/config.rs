//! Simulator configuration

use chrono::{DateTime, Duration, Utc};

/// Construction parameters for a `Simulator`
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Virtual time the clock starts at
    pub start_time: DateTime<Utc>,

    /// Initial virtual-time-per-real-time ratio
    pub speed: f64,

    /// Run seed; every engine and synthesis stream derives from it
    pub seed: u64,

    /// Virtual-time interval between behavior ticks of a home's domain
    pub tick_interval: Duration,

    /// Virtual-time interval between ambient context refreshes per home
    pub context_refresh_interval: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            start_time: Utc::now(),
            speed: 1.0,
            seed: 42,
            tick_interval: Duration::minutes(1),
            context_refresh_interval: Duration::minutes(15),
        }
    }
}

impl SimConfig {
    pub fn new(start_time: DateTime<Utc>, speed: f64, seed: u64) -> Self {
        Self {
            start_time,
            speed,
            seed,
            ..Self::default()
        }
    }
}
