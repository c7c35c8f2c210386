//! Service call type and error for external control of entities

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Domain, EntityId};

/// A request from the API layer to change an entity's target state
///
/// Service calls are translated by each domain's behavior engine into a
/// state transition (e.g. `light.turn_on` with `brightness: 200`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCall {
    /// Domain the service belongs to
    pub domain: Domain,

    /// Service name (e.g. "turn_on", "set_temperature")
    pub service: String,

    /// Target entity
    pub entity_id: EntityId,

    /// Service parameters
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

impl ServiceCall {
    pub fn new(domain: Domain, service: impl Into<String>, entity_id: EntityId) -> Self {
        Self {
            domain,
            service: service.into(),
            entity_id,
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Get a numeric parameter
    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(|v| v.as_f64())
    }

    /// Get a string parameter
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }
}

/// Error for malformed or unsupported service calls
///
/// Surfaced to the caller; no state is mutated when a service call fails.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("unknown service '{domain}.{service}'")]
    UnknownService { domain: Domain, service: String },

    #[error("domain '{0}' is read-only and accepts no service calls")]
    ReadonlyDomain(Domain),

    #[error("entity '{0}' not found")]
    EntityNotFound(String),

    #[error("service call targets domain '{expected}' but entity belongs to '{actual}'")]
    DomainMismatch { expected: Domain, actual: Domain },

    #[error("invalid parameter '{param}': {reason}")]
    InvalidParam { param: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params() {
        let call = ServiceCall::new(
            Domain::Light,
            "turn_on",
            "light.kitchen".parse().unwrap(),
        )
        .with_param("brightness", json!(200));

        assert_eq!(call.param_f64("brightness"), Some(200.0));
        assert_eq!(call.param_str("brightness"), None);
        assert_eq!(call.param_f64("color_temp"), None);
    }
}
