//! Approximate daylight model
//!
//! Day length varies sinusoidally around 12 hours with a latitude factor;
//! solar elevation is a half-sine over the daylight span. Not astronomy
//! grade, good enough for cadence shaping.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

/// Daylight calculator for a fixed latitude
#[derive(Debug, Clone, Copy)]
pub struct Daylight {
    pub latitude: f64,
}

impl Daylight {
    pub fn new(latitude: f64) -> Self {
        Self { latitude }
    }

    /// Daylight hours on the given date
    pub fn daylight_hours(&self, date: NaiveDate) -> f64 {
        let doy = date.ordinal() as f64;
        let lat_factor = (self.latitude.abs() / 60.0).clamp(0.2, 1.2);
        let hours =
            12.0 + 4.0 * (std::f64::consts::TAU * (doy - 80.0) / 365.0).sin() * lat_factor;
        hours.clamp(7.0, 17.0)
    }

    /// Sunrise and sunset instants (UTC) for the given date
    pub fn sunrise_sunset(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let hours = self.daylight_hours(date);
        let mid = Utc
            .from_utc_datetime(&date.and_hms_opt(12, 0, 0).expect("valid time"));
        let half = chrono::Duration::seconds((hours * 1800.0) as i64);
        (mid - half, mid + half)
    }

    /// Whether `ts` falls between sunrise and sunset
    pub fn is_daylight(&self, ts: DateTime<Utc>) -> bool {
        let (sunrise, sunset) = self.sunrise_sunset(ts.date_naive());
        ts >= sunrise && ts <= sunset
    }

    /// Solar elevation proxy in degrees: 0 at sunrise/sunset, peak at noon,
    /// negative at night.
    pub fn solar_elevation(&self, ts: DateTime<Utc>) -> f64 {
        let (sunrise, sunset) = self.sunrise_sunset(ts.date_naive());
        let span = (sunset - sunrise).num_seconds() as f64;
        let offset = (ts - sunrise).num_seconds() as f64;
        let peak = 90.0 - (self.latitude.abs() - 23.0).max(0.0);
        if offset < 0.0 || offset > span {
            return -10.0;
        }
        peak * (std::f64::consts::PI * offset / span).sin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summer_days_are_longer() {
        let daylight = Daylight::new(47.0);
        let june = NaiveDate::from_ymd_opt(2025, 6, 21).unwrap();
        let december = NaiveDate::from_ymd_opt(2025, 12, 21).unwrap();
        assert!(daylight.daylight_hours(june) > daylight.daylight_hours(december) + 3.0);
    }

    #[test]
    fn test_bounds() {
        let daylight = Daylight::new(65.0);
        for doy in 0..365 {
            let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + chrono::Duration::days(doy);
            let hours = daylight.daylight_hours(date);
            assert!((7.0..=17.0).contains(&hours));
        }
    }

    #[test]
    fn test_noon_is_daylight_midnight_is_not() {
        let daylight = Daylight::new(40.0);
        assert!(daylight.is_daylight("2025-06-21T12:00:00Z".parse().unwrap()));
        assert!(!daylight.is_daylight("2025-06-21T00:30:00Z".parse().unwrap()));
    }

    #[test]
    fn test_solar_elevation_shape() {
        let daylight = Daylight::new(40.0);
        let noon = daylight.solar_elevation("2025-06-21T12:00:00Z".parse().unwrap());
        let morning = daylight.solar_elevation("2025-06-21T08:00:00Z".parse().unwrap());
        let night = daylight.solar_elevation("2025-06-21T01:00:00Z".parse().unwrap());
        assert!(noon > morning);
        assert!(morning > 0.0);
        assert!(night < 0.0);
    }
}
