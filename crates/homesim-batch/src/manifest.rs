//! Manifest building and validation
//!
//! Each shard entry records its row count and sha256; the run-level
//! content hash is sha256 over shard bytes in (month, shard index)
//! order. Identical seed and configuration must reproduce the content
//! hash exactly.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::BatchError;

pub const SCHEMA_VERSION: &str = "1.0.0";

pub const MANIFEST_FILE: &str = "manifest.json";

/// One shard as recorded in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardEntry {
    pub month: u32,
    pub index: u32,
    /// Relative to the manifest's directory
    pub path: String,
    pub records: u64,
    /// Filled in when the manifest is built; empty until then
    #[serde(default)]
    pub sha256: String,
}

/// A validation-time discrepancy, localized to one shard or the run hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardMismatch {
    pub path: String,
    pub field: &'static str,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: String,
    pub seed: u64,
    pub year: i32,
    pub shards: Vec<ShardEntry>,
    pub total_records: u64,
    /// sha256 over shard bytes in (month, index) order
    pub content_hash: String,
    /// Generation wall-clock duration in seconds
    pub generation_secs: f64,
}

impl Manifest {
    /// Build from shard entries, hashing the files on disk
    pub fn build(
        dir: &Path,
        seed: u64,
        year: i32,
        mut shards: Vec<ShardEntry>,
        generation_secs: f64,
    ) -> Result<Self, BatchError> {
        shards.sort_by_key(|s| (s.month, s.index));
        let mut run_hasher = Sha256::new();
        for shard in &mut shards {
            let bytes = fs::read(dir.join(&shard.path))?;
            shard.sha256 = hex_sha256(&bytes);
            run_hasher.update(&bytes);
        }
        let total_records = shards.iter().map(|s| s.records).sum();
        Ok(Self {
            schema_version: SCHEMA_VERSION.to_string(),
            seed,
            year,
            shards,
            total_records,
            content_hash: hex_digest(run_hasher),
            generation_secs,
        })
    }

    pub fn write(&self, dir: &Path) -> Result<(), BatchError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(MANIFEST_FILE), json)?;
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self, BatchError> {
        let text = fs::read_to_string(dir.join(MANIFEST_FILE))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Recompute per-shard counts and hashes from disk and compare with
    /// the recorded values; every discrepancy is reported with its shard
    pub fn validate(dir: &Path) -> Result<(), BatchError> {
        let manifest = Self::load(dir)?;
        let mut mismatches = Vec::new();

        let mut shards = manifest.shards.clone();
        shards.sort_by_key(|s| (s.month, s.index));

        let mut run_hasher = Sha256::new();
        for shard in &shards {
            let bytes = fs::read(dir.join(&shard.path))?;
            run_hasher.update(&bytes);

            let records = bytes.split(|b| *b == b'\n').filter(|l| !l.is_empty()).count() as u64;
            if records != shard.records {
                mismatches.push(ShardMismatch {
                    path: shard.path.clone(),
                    field: "records",
                    expected: shard.records.to_string(),
                    actual: records.to_string(),
                });
            }
            let sha256 = hex_sha256(&bytes);
            if sha256 != shard.sha256 {
                mismatches.push(ShardMismatch {
                    path: shard.path.clone(),
                    field: "sha256",
                    expected: shard.sha256.clone(),
                    actual: sha256,
                });
            }
        }

        let content_hash = hex_digest(run_hasher);
        if content_hash != manifest.content_hash {
            mismatches.push(ShardMismatch {
                path: MANIFEST_FILE.to_string(),
                field: "content_hash",
                expected: manifest.content_hash.clone(),
                actual: content_hash,
            });
        }

        if mismatches.is_empty() {
            info!(
                shards = shards.len(),
                total = manifest.total_records,
                "manifest verified"
            );
            Ok(())
        } else {
            Err(BatchError::Mismatch(mismatches))
        }
    }
}

fn hex_sha256(bytes: &[u8]) -> String {
    hex_digest(Sha256::new_with_prefix(bytes))
}

fn hex_digest(hasher: Sha256) -> String {
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BatchRecorder, EventRow};
    use chrono::{DateTime, Utc};

    fn row(ts: &str, state: &str) -> EventRow {
        let ts: DateTime<Utc> = ts.parse().unwrap();
        EventRow {
            ts: ts.timestamp_millis(),
            home_id: "sta_north_000".into(),
            entity_id: "light.sta_north_000_light_0".into(),
            domain: "light".into(),
            state: state.into(),
            attributes: None,
        }
    }

    fn write_dataset(dir: &Path) -> Manifest {
        let mut recorder = BatchRecorder::new(dir, 2025, 3);
        for n in 0..8 {
            let ts = if n < 5 {
                "2025-01-10T00:00:00Z"
            } else {
                "2025-02-10T00:00:00Z"
            };
            recorder.append(&row(ts, if n % 2 == 0 { "on" } else { "off" })).unwrap();
        }
        let entries = recorder.finish().unwrap();
        let manifest = Manifest::build(dir, 42, 2025, entries, 0.5).unwrap();
        manifest.write(dir).unwrap();
        manifest
    }

    #[test]
    fn test_validate_clean_dataset() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path());
        Manifest::validate(dir.path()).unwrap();
    }

    #[test]
    fn test_rebuild_reproduces_hash() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_dataset(dir.path());
        let rebuilt =
            Manifest::build(dir.path(), 42, 2025, manifest.shards.clone(), 9.9).unwrap();
        assert_eq!(rebuilt.content_hash, manifest.content_hash);
        assert_eq!(rebuilt.total_records, 8);
    }

    #[test]
    fn test_tamper_localized_to_shard() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_dataset(dir.path());
        let victim = &manifest.shards[1];

        // Flip one record's state without changing the line count
        let path = dir.path().join(&victim.path);
        let tampered = fs::read_to_string(&path).unwrap().replace("\"on\"", "\"off\"");
        fs::write(&path, tampered).unwrap();

        let err = Manifest::validate(dir.path()).unwrap_err();
        let BatchError::Mismatch(mismatches) = err else {
            panic!("expected mismatch error");
        };
        assert!(mismatches.iter().any(|m| m.path == victim.path && m.field == "sha256"));
        assert!(mismatches.iter().any(|m| m.field == "content_hash"));
        // Untouched shards are not implicated
        for other in manifest.shards.iter().filter(|s| s.path != victim.path) {
            assert!(!mismatches.iter().any(|m| m.path == other.path));
        }
    }

    #[test]
    fn test_missing_rows_reported_with_counts() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_dataset(dir.path());
        let victim = &manifest.shards[0];
        let path = dir.path().join(&victim.path);
        let mut lines: Vec<String> =
            fs::read_to_string(&path).unwrap().lines().map(String::from).collect();
        lines.pop();
        fs::write(&path, lines.join("\n") + "\n").unwrap();

        let BatchError::Mismatch(mismatches) = Manifest::validate(dir.path()).unwrap_err() else {
            panic!("expected mismatch error");
        };
        let records = mismatches
            .iter()
            .find(|m| m.path == victim.path && m.field == "records")
            .unwrap();
        assert_eq!(records.expected, victim.records.to_string());
        assert_eq!(records.actual, (victim.records - 1).to_string());
    }
}
