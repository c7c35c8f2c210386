//! One-day scenario: a minimal starter home driven through a full
//! simulated day with stepped virtual time.

use chrono::{DateTime, Duration, Utc};
use homesim_core::{Domain, EntityId, FeatureFlags, OccupancyProfile, Profile, Region};
use homesim_homes::{EntitySpec, Home};
use homesim_simulator::{HomeSetup, SimConfig, Simulator};

fn day_start() -> DateTime<Utc> {
    "2025-01-01T00:00:00Z".parse().unwrap()
}

fn starter_home() -> (Home, Vec<EntitySpec>) {
    let home_id = "sta_north_000".to_string();
    let mut bedroom =
        EntitySpec::new("light.sta_north_000_bedroom_light_0".parse::<EntityId>().unwrap(), home_id.clone());
    bedroom.brightness = true;
    let kitchen = EntitySpec::new(
        "light.sta_north_000_kitchen_light_0".parse::<EntityId>().unwrap(),
        home_id.clone(),
    );
    let motion = EntitySpec::new(
        "binary_sensor.sta_north_000_hallway_motion_0".parse::<EntityId>().unwrap(),
        home_id.clone(),
    )
    .with_device_class("motion");

    let home = Home {
        home_id,
        profile: Profile::Starter,
        region: Region::North,
        latitude: 45.0,
        features: FeatureFlags::default(),
        occupancy: OccupancyProfile::default(),
        vacations: Vec::new(),
        total_entities: 3,
        total_devices: 3,
    };
    (home, vec![bedroom, kitchen, motion])
}

#[tokio::test]
async fn test_one_day_starter_home() {
    let start = day_start();
    let end = start + Duration::days(1);

    let sim = Simulator::new(SimConfig::new(start, 100.0, 42)).unwrap();
    sim.pause();
    let (_sub, mut rx) = sim.subscribe_with_capacity(8192);

    let (home, specs) = starter_home();
    let home_id = sim.add_home(HomeSetup::explicit(home, specs)).unwrap();

    // Step through the day in 5-minute increments, stopping just short of
    // midnight so every fire time stays inside the day
    let mut target = start + Duration::minutes(5);
    while target < end {
        sim.advance_to(target).unwrap();
        sim.run_pending().await;
        target += Duration::minutes(5);
    }

    let stats = sim.stats();
    assert_eq!(stats.homes, 1);
    assert_eq!(stats.entities, 3);
    assert!(stats.ticks_executed > 0);

    let mut records = Vec::new();
    while let Ok(record) = rx.try_recv() {
        records.push(record);
    }
    assert!(!records.is_empty());

    for record in &records {
        assert_eq!(record.home_id, home_id);
        assert!(
            record.timestamp >= start && record.timestamp < end,
            "timestamp {} outside the simulated day",
            record.timestamp
        );
        if record.entity_id.domain() == Domain::Light {
            assert!(
                ["on", "off"].contains(&record.new_state.as_str()),
                "light state '{}'",
                record.new_state
            );
        }
    }

    for light in sim.list_states(Some(Domain::Light), Some(&home_id)) {
        assert!(["on", "off"].contains(&light.state.as_str()));
    }
}
