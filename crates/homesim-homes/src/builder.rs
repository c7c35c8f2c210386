//! Deterministic home synthesis
//!
//! Every draw flows from the run seed through a per-home substream, so
//! home N of a run is identical across processes. Counts come from a
//! lognormal parameterized by the profile's median/p90, clamped to the
//! profile's hard range; devices split into category shares and explode
//! into entity specs.

use chrono::Datelike;
use homesim_context::{CalendarTable, SimRng, VacationWindow};
use homesim_core::{
    Domain, EntityId, EntityIdError, FeatureFlags, HomeId, OccupancyProfile, Profile, Region,
    ALL_REGIONS,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{DeviceCategory, EntitySpec, ALL_DEVICE_CATEGORIES};

const ROOMS: &[&str] = &[
    "living_room",
    "kitchen",
    "bedroom",
    "bathroom",
    "office",
    "hallway",
    "garage",
    "basement",
];

/// A synthesized home record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Home {
    pub home_id: HomeId,
    pub profile: Profile,
    pub region: Region,
    pub latitude: f64,
    pub features: FeatureFlags,
    pub occupancy: OccupancyProfile,
    pub vacations: Vec<VacationWindow>,
    pub total_entities: usize,
    pub total_devices: usize,
}

/// Builds one home and its entity specs from the run seed
pub struct HomeBuilder {
    seed: u64,
    index: usize,
    year: i32,
    profile: Option<Profile>,
    region: Option<Region>,
    features: Option<FeatureFlags>,
    occupancy: Option<OccupancyProfile>,
}

impl HomeBuilder {
    pub fn new(seed: u64, index: usize) -> Self {
        Self {
            seed,
            index,
            year: chrono::Utc::now().year(),
            profile: None,
            region: None,
            features: None,
            occupancy: None,
        }
    }

    pub fn profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Year vacation windows are drawn for
    pub fn year(mut self, year: i32) -> Self {
        self.year = year;
        self
    }

    /// Pin feature flags instead of drawing them
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = Some(features);
        self
    }

    /// Pin the occupancy profile instead of drawing it
    pub fn occupancy(mut self, occupancy: OccupancyProfile) -> Self {
        self.occupancy = Some(occupancy);
        self
    }

    pub fn build(self) -> Result<(Home, Vec<EntitySpec>), EntityIdError> {
        let root = SimRng::new(self.seed).derive(self.index as u64 + 1);
        let mut rng = root.derive_str("synthesis");

        let profile = self
            .profile
            .unwrap_or_else(|| match rng.weighted_index(&[0.35, 0.35, 0.2, 0.1]) {
                0 => Profile::Starter,
                1 => Profile::Intermediate,
                2 => Profile::Advanced,
                _ => Profile::Power,
            });
        let region = self
            .region
            .unwrap_or_else(|| ALL_REGIONS[rng.uniform_usize(0, ALL_REGIONS.len() - 1)]);
        let region_cfg = region.config();
        let latitude = rng.uniform(region_cfg.lat_range.0, region_cfg.lat_range.1);

        let home_id = format!("{}_{}_{:03}", &profile.as_str()[..3], region, self.index);

        let features = self.features.unwrap_or_else(|| FeatureFlags {
            camera_integration: rng.chance(0.3),
            solar: rng.chance((0.2 * region_cfg.solar_mult).min(1.0)),
            irrigation: rng.chance((0.15 * region_cfg.irrigation_mult).min(1.0)),
            energy_monitoring: rng.chance(0.35),
        });
        let occupancy = self.occupancy.unwrap_or_else(|| OccupancyProfile {
            wfh_ratio: rng.uniform(0.0, 0.6),
            has_kids: rng.chance(0.4),
            shift_worker: rng.chance(0.1),
        });
        let vacations = CalendarTable::draw_vacations(&mut root.derive_str("vacation"), self.year);

        let cfg = profile.config();
        let entity_target = (rng
            .lognormal_by_median_p90(cfg.entity_median, cfg.entity_p90)
            .round() as usize)
            .clamp(cfg.entity_range.0, cfg.entity_range.1);
        let virtual_share = rng.uniform(cfg.sensor_virtual_share.0, cfg.sensor_virtual_share.1);

        // The device draw is reconciled with what the categories actually
        // yield, or realized entity counts undershoot the tier range
        let epd = expected_entities_per_device(&features, virtual_share);
        let implied = entity_target as f64 / epd;
        let mut devices = rng
            .lognormal_by_median_p90(cfg.device_median, cfg.device_p90)
            .clamp(implied * 0.9, implied * 1.1)
            .round()
            .max(1.0) as usize;

        let category_counts = split_devices(devices, &features);
        let mut specs = Vec::with_capacity(entity_target + 16);

        for category in ALL_DEVICE_CATEGORIES {
            let count = category_counts[category_index(*category)];
            emit_category(
                &mut specs,
                &home_id,
                *category,
                0,
                count,
                &features,
                virtual_share,
                &mut rng,
            )?;
        }

        // Clamp to the profile's range: trim overshoot, make up shortfall
        // with extra sensor devices so the filler keeps the drawn
        // device-class mix
        specs.truncate(cfg.entity_range.1);
        let mut filler = category_counts[category_index(DeviceCategory::Sensors)];
        while specs.len() < cfg.entity_range.0 {
            emit_category(
                &mut specs,
                &home_id,
                DeviceCategory::Sensors,
                filler,
                1,
                &features,
                virtual_share,
                &mut rng,
            )?;
            filler += 1;
            devices += 1;
        }
        specs.truncate(cfg.entity_range.1);

        let home = Home {
            home_id: home_id.clone(),
            profile,
            region,
            latitude,
            features,
            occupancy,
            vacations,
            total_entities: specs.len(),
            total_devices: devices,
        };
        debug!(
            home_id = %home.home_id,
            profile = %profile,
            region = %region,
            entities = specs.len(),
            devices,
            "synthesized home"
        );
        Ok((home, specs))
    }
}

fn category_index(category: DeviceCategory) -> usize {
    ALL_DEVICE_CATEGORIES
        .iter()
        .position(|c| *c == category)
        .unwrap_or(0)
}

/// Device-count share per category, adjusted for features
fn category_shares(features: &FeatureFlags) -> [f64; 8] {
    let mut shares = [0.35, 0.20, 0.15, 0.10, 0.06, 0.03, 0.06, 0.05];
    if features.camera_integration {
        shares[4] += 0.03;
        shares[0] -= 0.02;
    }
    if features.energy_monitoring {
        shares[3] += 0.02;
        shares[0] += 0.01;
    }
    shares
}

/// Share-weighted mean of what each category yields per device
fn expected_entities_per_device(features: &FeatureFlags, virtual_share: f64) -> f64 {
    let shares = category_shares(features);
    let yields = [
        2.5 * (1.0 + virtual_share),
        1.2,
        1.5,
        if features.energy_monitoring { 3.0 } else { 2.0 },
        if features.camera_integration { 18.0 } else { 8.0 },
        6.0,
        2.0,
        1.5,
    ];
    let weighted: f64 = shares.iter().zip(yields).map(|(s, y)| s * y).sum();
    weighted / shares.iter().sum::<f64>()
}

/// Split a device budget into category counts
fn split_devices(total: usize, features: &FeatureFlags) -> Vec<usize> {
    let shares = category_shares(features);
    let sum: f64 = shares.iter().sum();
    let mut counts: Vec<usize> = shares
        .iter()
        .map(|s| (total as f64 * s / sum) as usize)
        .collect();
    let allocated: usize = counts.iter().sum();
    // Remainder lands in "other"
    counts[7] += total - allocated.min(total);
    counts
}

fn emit_category(
    specs: &mut Vec<EntitySpec>,
    home_id: &str,
    category: DeviceCategory,
    start: usize,
    devices: usize,
    features: &FeatureFlags,
    virtual_share: f64,
    rng: &mut SimRng,
) -> Result<(), EntityIdError> {
    for n in start..start + devices {
        let room = ROOMS[rng.uniform_usize(0, ROOMS.len() - 1)];
        match category {
            DeviceCategory::Lights => {
                let entity_id =
                    EntityId::new(Domain::Light, format!("{home_id}_{room}_light_{n}"))?;
                let mut spec = EntitySpec::new(entity_id.clone(), home_id);
                spec.brightness = rng.chance(0.8);
                spec.color_temp = spec.brightness && rng.chance(0.3);
                specs.push(spec);

                if rng.chance(0.2) {
                    let power_id = EntityId::new(
                        Domain::Sensor,
                        format!("{home_id}_{room}_light_{n}_power"),
                    )?;
                    let mut power =
                        EntitySpec::new(power_id, home_id).with_device_class("power");
                    power.linked_entity = Some(entity_id);
                    power.rated_power_w = Some(rng.uniform(5.0, 15.0));
                    specs.push(power);
                }
            }
            DeviceCategory::Switches => {
                let entity_id =
                    EntityId::new(Domain::Switch, format!("{home_id}_{room}_switch_{n}"))?;
                let mut spec = EntitySpec::new(entity_id.clone(), home_id);
                let rated = rng.uniform(5.0, 120.0);
                spec.rated_power_w = Some(rated);
                specs.push(spec);

                if rng.chance(0.5) {
                    let power_id = EntityId::new(
                        Domain::Sensor,
                        format!("{home_id}_{room}_switch_{n}_power"),
                    )?;
                    let mut power =
                        EntitySpec::new(power_id, home_id).with_device_class("power");
                    power.linked_entity = Some(entity_id);
                    power.rated_power_w = Some(rated);
                    specs.push(power);
                }
            }
            DeviceCategory::Plugs => {
                let plug_id =
                    EntityId::new(Domain::Switch, format!("{home_id}_{room}_plug_{n}"))?;
                let mut plug = EntitySpec::new(plug_id.clone(), home_id);
                let rated = rng.uniform(2.0, 1500.0);
                plug.rated_power_w = Some(rated);
                specs.push(plug);

                let power_id =
                    EntityId::new(Domain::Sensor, format!("{home_id}_{room}_plug_{n}_power"))?;
                let mut power = EntitySpec::new(power_id.clone(), home_id)
                    .with_device_class("power");
                power.linked_entity = Some(plug_id);
                power.rated_power_w = Some(rated);
                specs.push(power);

                if features.energy_monitoring {
                    let energy_id = EntityId::new(
                        Domain::Sensor,
                        format!("{home_id}_{room}_plug_{n}_energy"),
                    )?;
                    let mut energy = EntitySpec::new(energy_id, home_id)
                        .with_device_class("energy");
                    energy.power_sensor = Some(power_id);
                    specs.push(energy);
                }
            }
            DeviceCategory::Sensors => {
                // 2-3 physical entities per device, plus virtual/template
                // entities at the drawn share
                let per_device = if rng.chance(0.5) { 3 } else { 2 };
                for e in 0..per_device {
                    let class_idx = rng.weighted_index(&[3.0, 2.0, 1.5, 1.0, 0.5, 0.5]);
                    let device_class = ["temperature", "humidity", "illuminance", "battery", "pm25", "co2"]
                        [class_idx];
                    let entity_id = EntityId::new(
                        Domain::Sensor,
                        format!("{home_id}_{room}_{device_class}_{n}_{e}"),
                    )?;
                    let mut spec =
                        EntitySpec::new(entity_id, home_id).with_device_class(device_class);
                    spec.outdoor = matches!(device_class, "temperature" | "humidity")
                        && rng.chance(0.2);
                    spec.battery_powered = rng.chance(0.6);
                    specs.push(spec);

                    if rng.chance(virtual_share) {
                        let template_id = EntityId::new(
                            Domain::Sensor,
                            format!("{home_id}_{room}_template_{n}_{e}"),
                        )?;
                        specs.push(
                            EntitySpec::new(template_id, home_id).with_device_class("template"),
                        );
                    }
                }
            }
            DeviceCategory::Cameras => {
                // Per-zone detections; camera integration unlocks more zones
                let zones = if features.camera_integration { 8 } else { 3 };
                for z in 0..zones {
                    let motion_id = EntityId::new(
                        Domain::BinarySensor,
                        format!("{home_id}_{room}_camera_{n}_motion_{z}"),
                    )?;
                    specs.push(
                        EntitySpec::new(motion_id, home_id).with_device_class("motion"),
                    );
                    let person_id = EntityId::new(
                        Domain::BinarySensor,
                        format!("{home_id}_{room}_camera_{n}_person_{z}"),
                    )?;
                    specs.push(
                        EntitySpec::new(person_id, home_id).with_device_class("occupancy"),
                    );
                }
                let lux_id = EntityId::new(
                    Domain::Sensor,
                    format!("{home_id}_{room}_camera_{n}_illuminance"),
                )?;
                specs.push(
                    EntitySpec::new(lux_id, home_id).with_device_class("illuminance"),
                );
                let presence_id = EntityId::new(
                    Domain::BinarySensor,
                    format!("{home_id}_{room}_camera_{n}_occupancy"),
                )?;
                specs.push(
                    EntitySpec::new(presence_id, home_id).with_device_class("occupancy"),
                );
            }
            DeviceCategory::Thermostats => {
                let entity_id =
                    EntityId::new(Domain::Climate, format!("{home_id}_{room}_thermostat_{n}"))?;
                specs.push(EntitySpec::new(entity_id, home_id));

                for device_class in ["temperature", "humidity", "battery", "co2"] {
                    let sensor_id = EntityId::new(
                        Domain::Sensor,
                        format!("{home_id}_{room}_thermostat_{n}_{device_class}"),
                    )?;
                    let mut spec =
                        EntitySpec::new(sensor_id, home_id).with_device_class(device_class);
                    spec.battery_powered = device_class == "battery";
                    specs.push(spec);
                }
                let occupancy_id = EntityId::new(
                    Domain::BinarySensor,
                    format!("{home_id}_{room}_thermostat_{n}_occupancy"),
                )?;
                specs.push(
                    EntitySpec::new(occupancy_id, home_id).with_device_class("occupancy"),
                );
            }
            DeviceCategory::Media => {
                let entity_id =
                    EntityId::new(Domain::MediaPlayer, format!("{home_id}_{room}_media_{n}"))?;
                specs.push(EntitySpec::new(entity_id, home_id));
                let group_id = EntityId::new(
                    Domain::MediaPlayer,
                    format!("{home_id}_{room}_media_{n}_group"),
                )?;
                specs.push(EntitySpec::new(group_id, home_id));
            }
            DeviceCategory::Other => {
                let device_class = if rng.chance(0.6) { "door" } else { "window" };
                let entity_id = EntityId::new(
                    Domain::BinarySensor,
                    format!("{home_id}_{room}_{device_class}_{n}"),
                )?;
                let mut spec =
                    EntitySpec::new(entity_id, home_id).with_device_class(device_class);
                spec.battery_powered = true;
                specs.push(spec);

                if rng.chance(0.5) {
                    let battery_id = EntityId::new(
                        Domain::Sensor,
                        format!("{home_id}_{room}_{device_class}_{n}_battery"),
                    )?;
                    let mut battery =
                        EntitySpec::new(battery_id, home_id).with_device_class("battery");
                    battery.battery_powered = true;
                    specs.push(battery);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_deterministic_for_seed_and_index() {
        let (home_a, specs_a) = HomeBuilder::new(42, 3).year(2025).build().unwrap();
        let (home_b, specs_b) = HomeBuilder::new(42, 3).year(2025).build().unwrap();
        assert_eq!(home_a, home_b);
        assert_eq!(specs_a, specs_b);

        let (home_c, _) = HomeBuilder::new(43, 3).year(2025).build().unwrap();
        assert_ne!(home_a, home_c);
    }

    #[test]
    fn test_entity_count_within_profile_range() {
        for index in 0..20 {
            let (home, specs) = HomeBuilder::new(7, index)
                .profile(Profile::Starter)
                .year(2025)
                .build()
                .unwrap();
            let range = Profile::Starter.config().entity_range;
            assert!(
                (range.0..=range.1).contains(&specs.len()),
                "{} entities outside {:?}",
                specs.len(),
                range
            );
            assert_eq!(home.total_entities, specs.len());
        }
    }

    #[test]
    fn test_template_share_stays_bounded() {
        for profile in [Profile::Starter, Profile::Intermediate] {
            for index in 0..4 {
                let (_, specs) = HomeBuilder::new(42, index)
                    .profile(profile)
                    .year(2025)
                    .build()
                    .unwrap();
                let sensors = specs
                    .iter()
                    .filter(|s| s.entity_id.domain() == Domain::Sensor)
                    .count();
                let templates = specs
                    .iter()
                    .filter(|s| s.device_class_is("template"))
                    .count();
                let (_, share_high) = profile.config().sensor_virtual_share;
                assert!(
                    templates as f64 <= sensors as f64 * (share_high + 0.05),
                    "{profile}: {templates} templates out of {sensors} sensors"
                );
                assert!(
                    (templates as f64) < specs.len() as f64 * 0.25,
                    "{profile}: templates dominate ({templates} of {})",
                    specs.len()
                );
            }
        }
    }

    #[test]
    fn test_home_id_format() {
        let (home, _) = HomeBuilder::new(42, 3)
            .profile(Profile::Starter)
            .region(Region::North)
            .year(2025)
            .build()
            .unwrap();
        assert_eq!(home.home_id, "sta_north_003");
    }

    #[test]
    fn test_entity_ids_unique_and_scoped() {
        let (home, specs) = HomeBuilder::new(42, 0).year(2025).build().unwrap();
        let mut seen = HashSet::new();
        for spec in &specs {
            assert!(seen.insert(spec.entity_id.to_string()), "duplicate id");
            assert!(spec.entity_id.object_id().starts_with(&home.home_id));
            assert_eq!(spec.home_id, home.home_id);
        }
    }

    #[test]
    fn test_power_links_resolve() {
        let (_, specs) = HomeBuilder::new(42, 1)
            .profile(Profile::Power)
            .year(2025)
            .build()
            .unwrap();
        let ids: HashSet<String> = specs.iter().map(|s| s.entity_id.to_string()).collect();
        // Link targets are emitted before their dependents, so trimming the
        // tail never orphans a link
        for spec in &specs {
            if let Some(linked) = &spec.linked_entity {
                assert!(ids.contains(&linked.to_string()));
            }
            if let Some(power) = &spec.power_sensor {
                assert!(ids.contains(&power.to_string()));
            }
        }
    }

    #[test]
    fn test_latitude_within_region_band() {
        let (home, _) = HomeBuilder::new(42, 5)
            .region(Region::AridWest)
            .year(2025)
            .build()
            .unwrap();
        let (low, high) = Region::AridWest.config().lat_range;
        assert!((low..=high).contains(&home.latitude));
    }
}
