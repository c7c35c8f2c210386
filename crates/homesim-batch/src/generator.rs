//! Headless dataset generation
//!
//! Builds the configured home population from the run seed, walks each
//! simulated day in 5-minute steps, synthesizes per-domain event
//! cadences from the ambient context, routes every row through the
//! fault injector and shards the result by a (home, day) hash. A run
//! leaves behind month shards, the device and entity registries,
//! per-home labels and a manifest.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use homesim_context::{ContextGenerator, ContextSnapshot, HomeContextParams, SimRng};
use homesim_core::{Domain, FeatureFlags, OccupancyProfile, Profile, Region};
use homesim_homes::{EntitySpec, Home, HomeBuilder};
use serde_json::json;
use tracing::{debug, info};

use crate::{BatchConfig, BatchError, EventRow, FaultInjector, Manifest, ShardWriter};

const STEP_MINUTES: i64 = 5;
const STEPS_PER_DAY: i64 = 24 * 60 / STEP_MINUTES;

/// Per-step toggle probability for one light after dark
const LIGHT_RATE_DARK: f64 = 0.002;
/// Per-step toggle probability for one light in daylight
const LIGHT_RATE_DAY: f64 = 0.0007;
/// Per-step update probability for one virtual sensor
const TEMPLATE_RATE: f64 = 0.0025;
/// Cooling degree-day base, Celsius
const CDD_BASE: f64 = 22.0;
/// Heating degree-day base, Celsius
const HDD_BASE: f64 = 20.0;

pub struct Generator {
    config: BatchConfig,
}

/// Mutable per-home stream state carried across the year
struct HomeStream {
    home: Home,
    lights: Vec<EntitySpec>,
    climates: Vec<EntitySpec>,
    templates: Vec<EntitySpec>,
    light_on: Vec<bool>,
    climate_active: Vec<bool>,
    template_value: Vec<f64>,
    rng: SimRng,
    injector: FaultInjector,
}

impl Generator {
    pub fn new(config: BatchConfig) -> Result<Self, BatchError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Produce the full dataset and its manifest
    pub fn run(&self) -> Result<Manifest, BatchError> {
        let started = Instant::now();
        let config = &self.config;
        let out_dir: PathBuf = config.output.path.join(format!("{:04}", config.year));
        fs::create_dir_all(&out_dir)?;

        let population = self.build_population()?;
        info!(
            homes = population.len(),
            year = config.year,
            seed = config.seed,
            "generating dataset"
        );

        let context = ContextGenerator::new(config.seed);
        for (home, _) in &population {
            context.register_home(
                home.home_id.clone(),
                HomeContextParams {
                    region: home.region,
                    latitude: home.latitude,
                    occupancy: home.occupancy,
                    vacations: home.vacations.clone(),
                },
            );
        }

        self.write_registries(&out_dir, &population)?;

        // Shard writers keyed by (month, shard index) stay open across
        // homes; rows stream straight to disk in population order, so
        // memory stays flat in homes x days
        let mut writers: BTreeMap<(u32, u32), ShardWriter> = BTreeMap::new();
        for (home, specs) in population {
            let mut stream = self.open_stream(home, specs)?;
            self.synthesize_year(&mut stream, &context, &out_dir, &mut writers)?;
        }

        let mut entries = Vec::with_capacity(writers.len());
        for (_, writer) in writers {
            entries.push(writer.finish()?);
        }

        let manifest = Manifest::build(
            &out_dir,
            config.seed,
            config.year,
            entries,
            started.elapsed().as_secs_f64(),
        )?;
        manifest.write(&out_dir)?;
        info!(
            shards = manifest.shards.len(),
            records = manifest.total_records,
            hash = %manifest.content_hash,
            "dataset complete"
        );
        Ok(manifest)
    }

    /// Synthesize homes per the configured profile counts and region mix
    fn build_population(&self) -> Result<Vec<(Home, Vec<EntitySpec>)>, BatchError> {
        let config = &self.config;
        let root = SimRng::new(config.seed);
        let mut region_rng = root.derive_str("region_mix");

        let regions: Vec<Region> = config
            .region_mix
            .keys()
            .filter_map(|name| name.parse().ok())
            .collect();
        let weights: Vec<f64> = config.region_mix.values().copied().collect();

        let mut population = Vec::new();
        let mut index = 0usize;
        for (profile_name, count) in &config.homes {
            let profile: Profile = profile_name
                .parse()
                .map_err(|_| BatchError::Config(format!("unknown profile '{profile_name}'")))?;
            for _ in 0..*count {
                let mut home_rng = root.derive(index as u64 + 1).derive_str("config");
                let features = FeatureFlags {
                    camera_integration: home_rng.chance(config.feature_probs.camera_integration),
                    solar: home_rng.chance(config.feature_probs.solar),
                    irrigation: home_rng.chance(config.feature_probs.irrigation),
                    energy_monitoring: home_rng.chance(config.feature_probs.energy_monitoring),
                };
                let occupancy = OccupancyProfile {
                    wfh_ratio: home_rng
                        .uniform(config.occupancy.wfh_ratio.0, config.occupancy.wfh_ratio.1),
                    has_kids: home_rng.chance(config.occupancy.has_kids_probability),
                    shift_worker: home_rng.chance(config.occupancy.shift_worker_probability),
                };

                let mut builder = HomeBuilder::new(config.seed, index)
                    .profile(profile)
                    .year(config.year)
                    .features(features)
                    .occupancy(occupancy);
                if !regions.is_empty() {
                    builder = builder.region(regions[region_rng.weighted_index(&weights)]);
                }
                population.push(builder.build()?);
                index += 1;
            }
        }
        Ok(population)
    }

    fn write_registries(
        &self,
        out_dir: &std::path::Path,
        population: &[(Home, Vec<EntitySpec>)],
    ) -> Result<(), BatchError> {
        let devices: Vec<_> = population
            .iter()
            .map(|(home, _)| {
                json!({
                    "home_id": home.home_id,
                    "profile": home.profile,
                    "region": home.region,
                    "total_devices": home.total_devices,
                    "total_entities": home.total_entities,
                    "features": home.features,
                })
            })
            .collect();
        fs::write(
            out_dir.join("device_registry.json"),
            serde_json::to_string_pretty(&devices)?,
        )?;

        let entities: Vec<&EntitySpec> = population
            .iter()
            .flat_map(|(_, specs)| specs.iter())
            .collect();
        fs::write(
            out_dir.join("entity_registry.json"),
            serde_json::to_string_pretty(&entities)?,
        )?;

        let labels: Vec<_> = population
            .iter()
            .map(|(home, _)| {
                json!({
                    "home_id": home.home_id,
                    "year": self.config.year,
                    "has_kids": home.occupancy.has_kids,
                    "wfh_ratio": home.occupancy.wfh_ratio,
                })
            })
            .collect();
        fs::write(
            out_dir.join("labels.json"),
            serde_json::to_string_pretty(&labels)?,
        )?;
        Ok(())
    }

    fn open_stream(&self, home: Home, specs: Vec<EntitySpec>) -> Result<HomeStream, BatchError> {
        let home_root = SimRng::new(self.config.seed).derive_str(&home.home_id);
        let injector = FaultInjector::new(home_root.seed(), self.config.faults)?;

        let lights: Vec<EntitySpec> = specs
            .iter()
            .filter(|s| s.domain() == Domain::Light)
            .cloned()
            .collect();
        let climates: Vec<EntitySpec> = specs
            .iter()
            .filter(|s| s.domain() == Domain::Climate)
            .cloned()
            .collect();
        let templates: Vec<EntitySpec> = specs
            .iter()
            .filter(|s| s.device_class_is("template"))
            .cloned()
            .collect();

        let light_on = vec![false; lights.len()];
        let climate_active = vec![false; climates.len()];
        let template_value = vec![50.0; templates.len()];
        Ok(HomeStream {
            home,
            lights,
            climates,
            templates,
            light_on,
            climate_active,
            template_value,
            rng: home_root.derive_str("events"),
            injector,
        })
    }

    /// Walk one home through the year, streaming faulted rows to shards
    fn synthesize_year(
        &self,
        stream: &mut HomeStream,
        context: &ContextGenerator,
        out_dir: &Path,
        writers: &mut BTreeMap<(u32, u32), ShardWriter>,
    ) -> Result<(), BatchError> {
        let config = &self.config;
        let first = NaiveDate::from_ymd_opt(config.year, 1, 1)
            .ok_or_else(|| BatchError::Config(format!("invalid year {}", config.year)))?;
        let shards = config.output.shards_per_month;

        let mut date = first;
        let mut raw = 0u64;
        while date.year() == config.year {
            let key = (date.month(), shard_index(&stream.home.home_id, date, shards));
            let writer = writer_for(writers, out_dir, config.year, key)?;
            let midnight = date.and_time(NaiveTime::MIN).and_utc();

            for step in 0..STEPS_PER_DAY {
                let ts = midnight + Duration::minutes(step * STEP_MINUTES);
                let Some(snapshot) = context.snapshot(&stream.home.home_id, ts) else {
                    continue;
                };
                raw += self.step(stream, &snapshot, ts, writer)?;
            }
            // Context buckets behind the walked day are never read again
            context.evict_before(midnight);

            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }

        // Rows still held for reordering land in the final shard
        let last = (12, shard_index(&stream.home.home_id, date.pred_opt().unwrap_or(first), shards));
        let writer = writer_for(writers, out_dir, config.year, last)?;
        for row in stream.injector.drain() {
            writer.append(&row)?;
        }

        debug!(
            home_id = %stream.home.home_id,
            raw,
            dropped = stream.injector.dropped_count(),
            "home stream complete"
        );
        Ok(())
    }

    /// Emit one 5-minute step's events for a home; returns raw rows produced
    fn step(
        &self,
        stream: &mut HomeStream,
        snapshot: &ContextSnapshot,
        ts: DateTime<Utc>,
        out: &mut ShardWriter,
    ) -> Result<u64, BatchError> {
        let region_cfg = stream.home.region.config();
        let mut raw = 0u64;

        // Lighting follows daylight; winter evenings are busier
        let winter = matches!(ts.month(), 11 | 12 | 1 | 2);
        let light_rate = if snapshot.daylight {
            LIGHT_RATE_DAY
        } else if winter {
            LIGHT_RATE_DARK * region_cfg.lighting_winter_mult
        } else {
            LIGHT_RATE_DARK
        };
        for idx in 0..stream.lights.len() {
            if !stream.rng.chance(light_rate * snapshot.occupancy_likelihood.max(0.1)) {
                continue;
            }
            stream.light_on[idx] = !stream.light_on[idx];
            let spec = &stream.lights[idx];
            let attributes = (stream.light_on[idx] && spec.brightness)
                .then(|| json!({ "brightness": stream.rng.uniform_usize(128, 255) }));
            raw += self.emit(
                stream_row(
                    &stream.home.home_id,
                    spec,
                    ts,
                    &mut stream.rng,
                    if stream.light_on[idx] { "on" } else { "off" },
                    attributes,
                ),
                &mut stream.injector,
                out,
            )?;
        }

        // HVAC cadence scales with heating/cooling degree-days
        let cdd = (snapshot.outdoor_temp_c - CDD_BASE).max(0.0);
        let hdd = (HDD_BASE - snapshot.outdoor_temp_c).max(0.0);
        let hvac_daily = (0.02 * cdd + 0.03 * hdd) * region_cfg.hvac_mult;
        let hvac_rate = hvac_daily / STEPS_PER_DAY as f64;
        for idx in 0..stream.climates.len() {
            if !stream.rng.chance(hvac_rate) {
                continue;
            }
            stream.climate_active[idx] = !stream.climate_active[idx];
            let state = if !stream.climate_active[idx] {
                "off"
            } else if cdd > hdd {
                "cool"
            } else {
                "heat"
            };
            let spec = &stream.climates[idx];
            raw += self.emit(
                stream_row(&stream.home.home_id, spec, ts, &mut stream.rng, state, None),
                &mut stream.injector,
                out,
            )?;
        }

        // Virtual sensors drift at a slow flat cadence
        for idx in 0..stream.templates.len() {
            if !stream.rng.chance(TEMPLATE_RATE) {
                continue;
            }
            stream.template_value[idx] += stream.rng.normal(0.0, 0.4);
            let state = format!("{:.2}", stream.template_value[idx]);
            let spec = &stream.templates[idx];
            raw += self.emit(
                stream_row(&stream.home.home_id, spec, ts, &mut stream.rng, &state, None),
                &mut stream.injector,
                out,
            )?;
        }

        Ok(raw)
    }

    fn emit(
        &self,
        row: EventRow,
        injector: &mut FaultInjector,
        out: &mut ShardWriter,
    ) -> Result<u64, BatchError> {
        for survivor in injector.push(row) {
            out.append(&survivor)?;
        }
        Ok(1)
    }
}

/// Open (or reuse) the writer for one (month, shard index) slot
fn writer_for<'a>(
    writers: &'a mut BTreeMap<(u32, u32), ShardWriter>,
    out_dir: &Path,
    year: i32,
    key: (u32, u32),
) -> Result<&'a mut ShardWriter, BatchError> {
    match writers.entry(key) {
        Entry::Occupied(e) => Ok(e.into_mut()),
        Entry::Vacant(v) => Ok(v.insert(ShardWriter::create(out_dir, year, key.0, key.1)?)),
    }
}

fn stream_row(
    home_id: &str,
    spec: &EntitySpec,
    step_ts: DateTime<Utc>,
    rng: &mut SimRng,
    state: &str,
    attributes: Option<serde_json::Value>,
) -> EventRow {
    // Jitter inside the step so rows are not quantized to 5-minute marks
    let jitter_ms = rng.uniform_usize(0, (STEP_MINUTES * 60_000 - 1) as usize) as i64;
    EventRow {
        ts: step_ts.timestamp_millis() + jitter_ms,
        home_id: home_id.to_string(),
        entity_id: spec.entity_id.to_string(),
        domain: spec.domain().as_str().to_string(),
        state: state.to_string(),
        attributes,
    }
}

/// FNV-1a over (home_id, date), reduced to a shard index
fn shard_index(home_id: &str, date: NaiveDate, shards_per_month: u32) -> u32 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in home_id.as_bytes() {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    for b in date.ordinal().to_le_bytes() {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % u64::from(shards_per_month)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn config(dir: &Path, seed: u64) -> BatchConfig {
        BatchConfig::from_yaml(&format!(
            r#"
seed: {seed}
year: 2025
homes:
  starter: 2
region_mix:
  north: 0.7
  south: 0.3
output:
  path: {}
  shards_per_month: 4
"#,
            dir.display()
        ))
        .unwrap()
    }

    #[test]
    fn test_same_seed_same_content_hash() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let manifest_a = Generator::new(config(dir_a.path(), 42)).unwrap().run().unwrap();
        let manifest_b = Generator::new(config(dir_b.path(), 42)).unwrap().run().unwrap();
        assert_eq!(manifest_a.content_hash, manifest_b.content_hash);
        assert_eq!(manifest_a.total_records, manifest_b.total_records);
        assert!(manifest_a.total_records > 0);

        let dir_c = tempfile::tempdir().unwrap();
        let manifest_c = Generator::new(config(dir_c.path(), 7)).unwrap().run().unwrap();
        assert_ne!(manifest_a.content_hash, manifest_c.content_hash);
    }

    #[test]
    fn test_run_passes_validation() {
        let dir = tempfile::tempdir().unwrap();
        Generator::new(config(dir.path(), 42)).unwrap().run().unwrap();
        Manifest::validate(&dir.path().join("2025")).unwrap();
    }

    #[test]
    fn test_output_layout() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Generator::new(config(dir.path(), 42)).unwrap().run().unwrap();
        let out = dir.path().join("2025");
        for name in ["device_registry.json", "entity_registry.json", "labels.json", "manifest.json"] {
            assert!(out.join(name).exists(), "{name} missing");
        }

        let labels: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join("labels.json")).unwrap()).unwrap();
        assert_eq!(labels.as_array().unwrap().len(), 2);
        assert_eq!(labels[0]["year"], 2025);
        assert!(labels[0]["wfh_ratio"].as_f64().unwrap() <= 0.5);

        for shard in &manifest.shards {
            assert!(shard.index < 4, "shard index {} out of range", shard.index);
            assert!((1..=12).contains(&shard.month));
        }
    }

    #[test]
    fn test_exported_states_are_domain_legal() {
        let dir = tempfile::tempdir().unwrap();
        // An advanced home carries thermostats, so climate rows appear
        let config = BatchConfig::from_yaml(&format!(
            r#"
seed: 42
year: 2025
homes:
  advanced: 1
output:
  path: {}
  shards_per_month: 2
"#,
            dir.path().display()
        ))
        .unwrap();
        let manifest = Generator::new(config).unwrap().run().unwrap();
        let out = dir.path().join("2025");

        let mut climate_rows = 0usize;
        for shard in &manifest.shards {
            let content = fs::read_to_string(out.join(&shard.path)).unwrap();
            for line in content.lines() {
                let row: EventRow = serde_json::from_str(line).unwrap();
                let domain: Domain = row.domain.parse().unwrap();
                assert!(
                    domain.is_legal_state(&row.state),
                    "{} carries illegal state '{}'",
                    row.entity_id,
                    row.state
                );
                if domain == Domain::Climate {
                    climate_rows += 1;
                }
            }
        }
        assert!(climate_rows > 0, "no climate rows to check");
    }

    #[test]
    fn test_rows_scoped_to_their_shard_month() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Generator::new(config(dir.path(), 42)).unwrap().run().unwrap();
        let out = dir.path().join("2025");
        let shard = &manifest.shards[0];
        let content = fs::read_to_string(out.join(&shard.path)).unwrap();
        for line in content.lines().take(50) {
            let row: EventRow = serde_json::from_str(line).unwrap();
            let ts = DateTime::<Utc>::from_timestamp_millis(row.ts).unwrap();
            // Reorder/duplicate jitter never crosses a month in practice for
            // the first shard's sample
            assert_eq!(ts.year(), 2025);
            assert!(row.entity_id.starts_with("light.")
                || row.entity_id.starts_with("climate.")
                || row.entity_id.starts_with("sensor."));
        }
    }
}
