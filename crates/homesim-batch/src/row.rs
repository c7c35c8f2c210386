//! Event row schema and canonical JSON serialization

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One telemetry row as written to a shard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    /// Virtual timestamp, epoch milliseconds
    pub ts: i64,
    pub home_id: String,
    pub entity_id: String,
    pub domain: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Value>,
}

impl EventRow {
    /// One JSON line with recursively sorted object keys, so shard bytes
    /// (and therefore the manifest hash) are stable across runs
    pub fn canonical_line(&self) -> Result<String, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        serde_json::to_string(&canonicalize(value))
    }
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(String, Value)> = map.into_iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = serde_json::Map::new();
            for (key, inner) in sorted {
                out.insert(key, canonicalize(inner));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_line_sorts_keys() {
        let row = EventRow {
            ts: 1735689600000,
            home_id: "sta_north_000".into(),
            entity_id: "light.sta_north_000_kitchen_light_0".into(),
            domain: "light".into(),
            state: "on".into(),
            attributes: Some(json!({"zeta": 1, "alpha": {"b": 2, "a": 1}})),
        };
        let line = row.canonical_line().unwrap();
        assert!(line.find("\"alpha\"").unwrap() < line.find("\"zeta\"").unwrap());
        assert!(line.find("\"domain\"").unwrap() < line.find("\"ts\"").unwrap());

        let parsed: EventRow = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, row);
    }

    #[test]
    fn test_absent_attributes_omitted() {
        let row = EventRow {
            ts: 0,
            home_id: "h".into(),
            entity_id: "sensor.h_x".into(),
            domain: "sensor".into(),
            state: "1".into(),
            attributes: None,
        };
        assert!(!row.canonical_line().unwrap().contains("attributes"));
    }
}
