//! Entity state storage for homesim
//!
//! The EntityStore is the single source of truth for entity state. It is
//! keyed by entity id; each entry carries its own lock so applies on
//! different entities proceed in parallel while applies on the same entity
//! serialize. Every accepted transition gets the next global sequence number
//! and is published on the event bus while the entry lock is held, which
//! gives subscribers per-entity in-order delivery.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use homesim_core::{ChangeRecord, Domain, EntityId, HomeId, Snapshot};
use homesim_event_bus::EventBus;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors from entity store operations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("entity '{0}' not found")]
    NotFound(String),

    #[error("entity '{0}' already registered")]
    AlreadyRegistered(String),

    #[error("state '{state}' is not legal for domain '{domain}'")]
    IllegalTransition { domain: Domain, state: String },
}

/// A requested state transition
///
/// `attributes` holds only the keys that change; unchanged attributes are
/// carried over from the current snapshot.
#[derive(Debug, Clone, Default)]
pub struct Transition {
    pub state: String,
    pub attributes: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl Transition {
    pub fn new(state: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            state: state.into(),
            attributes: HashMap::new(),
            timestamp,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_attributes(mut self, attrs: HashMap<String, serde_json::Value>) -> Self {
        self.attributes.extend(attrs);
        self
    }
}

/// The concurrency-safe entity store
pub struct EntityStore {
    /// Entity entries keyed by entity-id string; the per-entry Mutex
    /// serializes applies on the same entity.
    entities: DashMap<String, Arc<Mutex<Snapshot>>>,
    /// Entity ids in registration order, for stable unfiltered listing
    insertion_order: Mutex<Vec<String>>,
    /// Global sequence counter for change records
    sequence: AtomicU64,
    /// Bus that receives every accepted change
    event_bus: Arc<EventBus>,
}

impl EntityStore {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            entities: DashMap::new(),
            insertion_order: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(1),
            event_bus,
        }
    }

    /// Register a new entity with its initial snapshot
    ///
    /// Publishes a registration record (old state None).
    pub fn register(&self, snapshot: Snapshot) -> Result<ChangeRecord, StoreError> {
        let key = snapshot.entity_id.to_string();
        if !snapshot.entity_id.domain().is_legal_state(&snapshot.state) {
            return Err(StoreError::IllegalTransition {
                domain: snapshot.entity_id.domain(),
                state: snapshot.state,
            });
        }
        let entry = match self.entities.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(StoreError::AlreadyRegistered(key))
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => vacant,
        };

        let record = ChangeRecord {
            entity_id: snapshot.entity_id.clone(),
            home_id: snapshot.home_id.clone(),
            old_state: None,
            new_state: snapshot.state.clone(),
            attribute_delta: snapshot.attributes.clone(),
            timestamp: snapshot.last_changed,
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
        };

        entry.insert(Arc::new(Mutex::new(snapshot)));
        self.insertion_order.lock().unwrap().push(key.clone());
        trace!(entity_id = %key, "Entity registered");
        self.event_bus.publish(&record);
        Ok(record)
    }

    /// Get the current snapshot of an entity
    pub fn get(&self, entity_id: &str) -> Result<Snapshot, StoreError> {
        let entry = self
            .entities
            .get(entity_id)
            .ok_or_else(|| StoreError::NotFound(entity_id.to_string()))?;
        let snapshot = entry.lock().unwrap().clone();
        Ok(snapshot)
    }

    /// Atomically apply a transition to an entity
    ///
    /// Validates domain legality, updates state/attributes/timestamp,
    /// assigns the next global sequence number and publishes the resulting
    /// ChangeRecord. Returns `IllegalTransition` (prior state intact) if the
    /// new state is outside the domain's legal set.
    pub fn apply(&self, entity_id: &str, transition: Transition) -> Result<ChangeRecord, StoreError> {
        let entry = self
            .entities
            .get(entity_id)
            .ok_or_else(|| StoreError::NotFound(entity_id.to_string()))?
            .clone();

        // Entry lock held through publish: applies on this entity serialize
        // and subscribers see its records in sequence order.
        let mut snapshot = entry.lock().unwrap();

        if !snapshot.entity_id.domain().is_legal_state(&transition.state) {
            return Err(StoreError::IllegalTransition {
                domain: snapshot.entity_id.domain(),
                state: transition.state,
            });
        }

        let old_state = snapshot.state.clone();
        let state_changed = old_state != transition.state;

        snapshot.state = transition.state.clone();
        for (key, value) in &transition.attributes {
            snapshot.attributes.insert(key.clone(), value.clone());
        }
        if state_changed {
            snapshot.last_changed = transition.timestamp;
        }

        let record = ChangeRecord {
            entity_id: snapshot.entity_id.clone(),
            home_id: snapshot.home_id.clone(),
            old_state: Some(old_state),
            new_state: transition.state,
            attribute_delta: transition.attributes,
            timestamp: transition.timestamp,
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
        };

        debug!(
            entity_id = %record.entity_id,
            state = %record.new_state,
            changed = state_changed,
            seq = record.sequence,
            "Applied transition"
        );
        self.event_bus.publish(&record);
        Ok(record)
    }

    /// Remove an entity; returns its final snapshot
    pub fn remove(&self, entity_id: &str) -> Result<Snapshot, StoreError> {
        let (_, entry) = self
            .entities
            .remove(entity_id)
            .ok_or_else(|| StoreError::NotFound(entity_id.to_string()))?;
        self.insertion_order
            .lock()
            .unwrap()
            .retain(|id| id != entity_id);
        let snapshot = entry.lock().unwrap().clone();
        trace!(entity_id, "Entity removed");
        Ok(snapshot)
    }

    /// Restartable iteration over current snapshots
    ///
    /// Unfiltered listing preserves registration order. Entities removed
    /// between `list` and consumption are skipped.
    pub fn list(
        &self,
        domain_filter: Option<Domain>,
        home_filter: Option<&str>,
    ) -> impl Iterator<Item = Snapshot> + '_ {
        let ids: Vec<String> = self.insertion_order.lock().unwrap().clone();
        let home_filter = home_filter.map(|h| h.to_string());
        ids.into_iter().filter_map(move |id| {
            let snapshot = self.get(&id).ok()?;
            if let Some(domain) = domain_filter {
                if snapshot.entity_id.domain() != domain {
                    return None;
                }
            }
            if let Some(home) = &home_filter {
                if &snapshot.home_id != home {
                    return None;
                }
            }
            Some(snapshot)
        })
    }

    /// All entity ids of a home
    pub fn home_entity_ids(&self, home_id: &HomeId) -> Vec<EntityId> {
        self.list(None, Some(home_id))
            .map(|s| s.entity_id)
            .collect()
    }

    /// Total number of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Highest sequence number assigned so far
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst).saturating_sub(1)
    }
}

/// Thread-safe wrapper for EntityStore
pub type SharedEntityStore = Arc<EntityStore>;
