//! Immutable record of one accepted state transition

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EntityId, HomeId};

/// Description of one entity state transition
///
/// Records are assigned a globally monotonic sequence number by the entity
/// store and are immutable once published to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// The entity that changed
    pub entity_id: EntityId,

    /// The home the entity belongs to
    pub home_id: HomeId,

    /// State before the transition (None for the initial registration)
    pub old_state: Option<String>,

    /// State after the transition
    pub new_state: String,

    /// Attributes that changed in this transition (key -> new value)
    #[serde(default)]
    pub attribute_delta: HashMap<String, serde_json::Value>,

    /// Virtual time of the transition
    pub timestamp: DateTime<Utc>,

    /// Globally monotonic sequence number
    pub sequence: u64,
}

impl ChangeRecord {
    /// Whether the public state value actually changed
    pub fn state_changed(&self) -> bool {
        self.old_state.as_deref() != Some(self.new_state.as_str())
    }
}
