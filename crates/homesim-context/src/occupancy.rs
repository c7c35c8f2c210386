//! Occupancy likelihood by time of day
//!
//! A piecewise daily routine: asleep before 06:30 and after 22:30, a
//! commute dip on weekdays, full presence evenings and weekends. The
//! occupancy profile shifts the curve rather than replacing it.

use chrono::{DateTime, Datelike, Timelike, Utc};
use homesim_core::OccupancyProfile;

/// Probability that someone is home and active at `ts`
pub fn occupancy_likelihood(ts: DateTime<Utc>, profile: &OccupancyProfile) -> f64 {
    let hour = ts.hour() as f64 + ts.minute() as f64 / 60.0;
    let weekday = ts.weekday().num_days_from_monday() < 5;

    let mut likelihood = base_curve(hour, weekday, profile.wfh_ratio);

    if profile.has_kids {
        // School pickup and early-evening activity bump
        if (15.0..20.0).contains(&hour) {
            likelihood += 0.15;
        }
    }

    if profile.shift_worker {
        // Inverted schedule: nights at work, mornings asleep at home
        likelihood = match hour {
            h if h < 6.0 => 0.2,
            h if h < 14.0 => 0.85,
            h if h < 22.0 => 0.5,
            _ => 0.2,
        };
    }

    likelihood.clamp(0.0, 1.0)
}

fn base_curve(hour: f64, weekday: bool, wfh_ratio: f64) -> f64 {
    // Sleep hours: present but inactive
    if !(6.5..22.5).contains(&hour) {
        return 0.15;
    }
    if !weekday {
        // Weekend: home most of the day with afternoon errands
        return match hour {
            h if h < 9.0 => 0.7,
            h if h < 13.0 => 0.8,
            h if h < 17.0 => 0.6,
            _ => 0.9,
        };
    }
    match hour {
        // Morning routine
        h if h < 8.0 => 0.9,
        // Work hours: away unless working from home
        h if h < 17.5 => 0.1 + 0.8 * wfh_ratio,
        // Evening at home
        _ => 0.95,
    }
}
