//! Batch generation pipeline for homesim
//!
//! Headless, fully seeded: homes are synthesized from the run seed, each
//! simulated day produces per-domain event cadences, rows pass through
//! the fault injector and land in month shards, and the manifest records
//! counts plus a content hash that is the reproducibility contract.

mod config;
mod error;
mod faults;
mod generator;
mod manifest;
mod recorder;
mod row;

pub use config::{BatchConfig, FaultConfig, FeatureProbs, OccupancyRanges, OutputConfig};
pub use error::BatchError;
pub use faults::FaultInjector;
pub use generator::Generator;
pub use manifest::{Manifest, ShardEntry, ShardMismatch, SCHEMA_VERSION};
pub use recorder::{BatchRecorder, ShardWriter};
pub use row::EventRow;
