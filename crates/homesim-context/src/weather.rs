//! Synthetic regional weather
//!
//! Outdoor temperature follows an annual seasonal sine between per-region
//! winter/summer anchors, with a smaller daily cycle and seeded per-hour
//! noise. Humidity sits on a regional base; precipitation is a per-hour
//! regional probability. Everything is a pure function of (region, hour
//! bucket, seed), so batch runs reproduce bit-for-bit.

use chrono::{DateTime, Datelike, Timelike, Utc};
use homesim_core::Region;
use serde::{Deserialize, Serialize};

use crate::SimRng;

/// One hourly weather observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    pub temp_c: f64,
    /// Relative humidity in percent
    pub rel_humidity: f64,
    pub precip: bool,
}

/// Deterministic weather model for one run seed
#[derive(Debug, Clone, Copy)]
pub struct WeatherModel {
    seed: u64,
}

impl WeatherModel {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Mean winter/summer temperature anchors per region, in Celsius
    fn anchors(region: Region) -> (f64, f64) {
        match region {
            Region::North => (5.0, 18.0),
            Region::South => (12.0, 33.0),
            Region::AridWest => (7.0, 35.0),
            Region::MarineWest => (8.0, 22.0),
            Region::EastMidwest => (4.0, 30.0),
        }
    }

    /// Base relative humidity per region, in percent
    fn humidity_base(region: Region) -> f64 {
        match region {
            Region::North => 55.0,
            Region::South => 70.0,
            Region::AridWest => 30.0,
            Region::MarineWest => 75.0,
            Region::EastMidwest => 60.0,
        }
    }

    /// Hourly precipitation probability per region
    fn precip_probability(region: Region) -> f64 {
        match region {
            Region::North => 0.05,
            Region::South => 0.08,
            Region::AridWest => 0.02,
            Region::MarineWest => 0.07,
            Region::EastMidwest => 0.06,
        }
    }

    /// Weather at the hour bucket containing `ts`
    pub fn sample(&self, region: Region, ts: DateTime<Utc>) -> WeatherSample {
        let hour_bucket = ts.timestamp().div_euclid(3600);
        let region_tag = region as u64 + 1;
        let mut rng = SimRng::new(self.seed)
            .derive(region_tag)
            .derive(hour_bucket as u64);

        let doy = ts.ordinal() as f64;
        let hour = ts.hour() as f64;

        let (winter, summer) = Self::anchors(region);
        // Annual curve peaks near day 172 (late June)
        let seasonal = (winter + summer) / 2.0
            + ((summer - winter) / 2.0)
                * (std::f64::consts::TAU * (doy - 172.0) / 365.0).sin();
        // Daily cycle peaks mid-afternoon
        let daily = 3.0 * (std::f64::consts::TAU * (hour - 15.0) / 24.0).cos();
        let temp_c = seasonal + daily + rng.normal(0.0, 2.5);

        let rel_humidity = (Self::humidity_base(region) + rng.normal(0.0, 5.0)).clamp(15.0, 95.0);
        let precip = rng.chance(Self::precip_probability(region));

        WeatherSample {
            temp_c,
            rel_humidity,
            precip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_deterministic_per_hour() {
        let model = WeatherModel::new(42);
        let a = model.sample(Region::North, at("2025-06-20T14:10:00Z"));
        let b = model.sample(Region::North, at("2025-06-20T14:55:00Z"));
        // Same hour bucket, same observation
        assert_eq!(a, b);

        let other_seed = WeatherModel::new(43).sample(Region::North, at("2025-06-20T14:10:00Z"));
        assert_ne!(a, other_seed);
    }

    #[test]
    fn test_summer_warmer_than_winter() {
        let model = WeatherModel::new(42);
        let mut summer = 0.0;
        let mut winter = 0.0;
        for day in 0..20 {
            let s = at("2025-06-15T14:00:00Z") + chrono::Duration::days(day);
            let w = at("2025-01-05T14:00:00Z") + chrono::Duration::days(day);
            summer += model.sample(Region::EastMidwest, s).temp_c;
            winter += model.sample(Region::EastMidwest, w).temp_c;
        }
        assert!(summer / 20.0 > winter / 20.0 + 10.0);
    }

    #[test]
    fn test_arid_west_is_dry() {
        let model = WeatherModel::new(42);
        let mut arid = 0.0;
        let mut marine = 0.0;
        for h in 0..100 {
            let ts = at("2025-04-01T00:00:00Z") + chrono::Duration::hours(h);
            arid += model.sample(Region::AridWest, ts).rel_humidity;
            marine += model.sample(Region::MarineWest, ts).rel_humidity;
        }
        assert!(arid / 100.0 + 20.0 < marine / 100.0);
    }
}
