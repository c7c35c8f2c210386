//! Seeded fault injection over an event-row stream
//!
//! Each record independently risks drop, duplicate (timestamp-jittered
//! copy), reorder (held and released after a bounded number of later
//! records) and, far more rarely, an entity-id rename that persists from
//! its rename point onward. For a fixed seed and input stream the output
//! is byte-identical across runs.

use std::collections::HashMap;

use homesim_context::SimRng;
use tracing::debug;

use crate::{BatchError, EventRow, FaultConfig};

/// Maximum records a reordered row is held behind
const REORDER_HOLD_MAX: usize = 5;

pub struct FaultInjector {
    rng: SimRng,
    config: FaultConfig,
    /// Held rows with their remaining release countdown
    held: Vec<(EventRow, usize)>,
    renames: HashMap<String, String>,
    rename_counter: u64,
    seen: u64,
    dropped: u64,
}

impl FaultInjector {
    pub fn new(seed: u64, config: FaultConfig) -> Result<Self, BatchError> {
        config.validate()?;
        Ok(Self {
            rng: SimRng::new(seed).derive_str("faults"),
            config,
            held: Vec::new(),
            renames: HashMap::new(),
            rename_counter: 0,
            seen: 0,
            dropped: 0,
        })
    }

    /// Feed one record; returns the rows emitted at this point
    pub fn push(&mut self, mut row: EventRow) -> Vec<EventRow> {
        self.seen += 1;
        let mut out = Vec::new();

        // Renames are sticky from their first occurrence
        if self.renames.contains_key(&row.entity_id) {
            row.entity_id = self.renames[&row.entity_id].clone();
        } else if self.rng.chance(self.config.p_rename) {
            self.rename_counter += 1;
            let replacement = format!("{}.replaced_{:06}", row.domain, self.rename_counter);
            debug!(old = %row.entity_id, new = %replacement, "entity renamed");
            self.renames.insert(row.entity_id.clone(), replacement.clone());
            row.entity_id = replacement;
        }

        if self.rng.chance(self.config.p_drop) {
            self.dropped += 1;
        } else if self.rng.chance(self.config.p_reorder) {
            let hold = self.rng.uniform_usize(1, REORDER_HOLD_MAX);
            self.held.push((row, hold));
        } else {
            out.push(row.clone());
            if self.rng.chance(self.config.p_dup) {
                let mut copy = row;
                copy.ts += self.rng.uniform_usize(1, 500) as i64;
                out.push(copy);
            }
        }

        // A record has passed; release held rows whose countdown expired
        let mut released = Vec::new();
        self.held.retain_mut(|(held_row, remaining)| {
            if *remaining <= 1 {
                released.push(held_row.clone());
                false
            } else {
                *remaining -= 1;
                true
            }
        });
        out.extend(released);
        out
    }

    /// Flush rows still held for reordering; call at end of stream
    pub fn drain(&mut self) -> Vec<EventRow> {
        self.held.drain(..).map(|(row, _)| row).collect()
    }

    pub fn seen_count(&self) -> u64 {
        self.seen
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}
