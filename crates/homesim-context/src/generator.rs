//! Per-home context snapshots
//!
//! Composes weather, daylight, calendar and occupancy into one value the
//! behavior engines read each tick. Snapshots are cached per 15-minute
//! simulated bucket so a tick pass over hundreds of entities recomputes
//! the context once per home.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use homesim_core::{HomeId, OccupancyProfile, Region};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    occupancy_likelihood, CalendarTable, Daylight, VacationWindow, WeatherModel,
};

const BUCKET_SECONDS: i64 = 15 * 60;

/// Static per-home inputs to context generation
#[derive(Debug, Clone)]
pub struct HomeContextParams {
    pub region: Region,
    pub latitude: f64,
    pub occupancy: OccupancyProfile,
    pub vacations: Vec<VacationWindow>,
}

/// The ambient context a behavior engine sees on one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub timestamp: DateTime<Utc>,
    pub outdoor_temp_c: f64,
    /// Relative humidity in percent
    pub rel_humidity: f64,
    pub precip: bool,
    pub daylight: bool,
    pub solar_elevation: f64,
    pub holiday: bool,
    pub weekend: bool,
    pub dst_transition: bool,
    pub vacation_active: bool,
    pub occupancy_likelihood: f64,
}

/// Shared context generator for all homes in a run
pub struct ContextGenerator {
    weather: WeatherModel,
    homes: DashMap<HomeId, HomeContextParams>,
    cache: DashMap<(HomeId, i64), ContextSnapshot>,
}

impl ContextGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            weather: WeatherModel::new(seed),
            homes: DashMap::new(),
            cache: DashMap::new(),
        }
    }

    /// Register a home's static parameters; replaces any prior entry
    pub fn register_home(&self, home_id: impl Into<HomeId>, params: HomeContextParams) {
        let home_id = home_id.into();
        debug!(home_id = %home_id, region = ?params.region, "registering home context");
        self.homes.insert(home_id, params);
    }

    pub fn remove_home(&self, home_id: &str) {
        self.homes.remove(home_id);
        self.cache.retain(|(id, _), _| id != home_id);
    }

    /// Context for a home at `now`; None if the home is unknown.
    ///
    /// Cached per 15-minute bucket; two calls inside the same bucket return
    /// the same snapshot.
    pub fn snapshot(&self, home_id: &str, now: DateTime<Utc>) -> Option<ContextSnapshot> {
        let bucket = now.timestamp().div_euclid(BUCKET_SECONDS);
        let key = (home_id.to_string(), bucket);
        if let Some(cached) = self.cache.get(&key) {
            return Some(cached.clone());
        }
        let params = self.homes.get(home_id)?;
        let snapshot = self.compute(&params, now);
        self.cache.insert(key, snapshot.clone());
        Some(snapshot)
    }

    /// Drop cached buckets older than `horizon`
    pub fn evict_before(&self, horizon: DateTime<Utc>) {
        let min_bucket = horizon.timestamp().div_euclid(BUCKET_SECONDS);
        self.cache.retain(|(_, bucket), _| *bucket >= min_bucket);
    }

    pub fn home_count(&self) -> usize {
        self.homes.len()
    }

    fn compute(&self, params: &HomeContextParams, now: DateTime<Utc>) -> ContextSnapshot {
        let weather = self.weather.sample(params.region, now);
        let daylight = Daylight::new(params.latitude);
        let date = now.date_naive();

        let vacation_active = CalendarTable::vacation_active(&params.vacations, now);
        let mut occupancy = occupancy_likelihood(now, &params.occupancy);
        if vacation_active {
            occupancy = 0.02;
        }

        ContextSnapshot {
            timestamp: now,
            outdoor_temp_c: weather.temp_c,
            rel_humidity: weather.rel_humidity,
            precip: weather.precip,
            daylight: daylight.is_daylight(now),
            solar_elevation: daylight.solar_elevation(now),
            holiday: CalendarTable::is_holiday(date),
            weekend: CalendarTable::is_weekend(date),
            dst_transition: CalendarTable::is_dst_transition(date),
            vacation_active,
            occupancy_likelihood: occupancy,
        }
    }
}
