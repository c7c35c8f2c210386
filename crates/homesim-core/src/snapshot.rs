//! Snapshot type representing an entity's current state

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EntityId, HomeId};

/// The state of an entity at a point in virtual time
///
/// A snapshot carries the public state value (as a string), the attribute
/// map, the virtual timestamp of the last accepted change and the owning
/// home. Per-entity hidden behavior state is not part of the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// The entity this snapshot belongs to
    pub entity_id: EntityId,

    /// The state value (e.g., "on", "off", "23.5", "heat")
    pub state: String,

    /// Additional attributes associated with the state
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// Virtual time of the last accepted state change
    pub last_changed: DateTime<Utc>,

    /// The home this entity belongs to
    pub home_id: HomeId,
}

impl Snapshot {
    /// Create a new snapshot
    pub fn new(
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        last_changed: DateTime<Utc>,
        home_id: impl Into<HomeId>,
    ) -> Self {
        Self {
            entity_id,
            state: state.into(),
            attributes,
            last_changed,
            home_id: home_id.into(),
        }
    }

    /// Get an attribute value by key, deserialized to the requested type
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get an attribute as an f64, accepting integer JSON values too
    pub fn attribute_f64(&self, key: &str) -> Option<f64> {
        self.attributes.get(key).and_then(|v| v.as_f64())
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        // Timestamps are not compared
        self.entity_id == other.entity_id
            && self.state == other.state
            && self.attributes == other.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Domain;
    use serde_json::json;

    #[test]
    fn test_attribute_access() {
        let mut attrs = HashMap::new();
        attrs.insert("brightness".to_string(), json!(200));
        attrs.insert("friendly_name".to_string(), json!("Kitchen Light"));

        let snap = Snapshot::new(
            EntityId::new(Domain::Light, "kitchen").unwrap(),
            "on",
            attrs,
            Utc::now(),
            "home_001",
        );

        assert_eq!(snap.attribute_f64("brightness"), Some(200.0));
        assert_eq!(
            snap.attribute::<String>("friendly_name").as_deref(),
            Some("Kitchen Light")
        );
        assert_eq!(snap.attribute_f64("missing"), None);
    }
}
