//! Batch pipeline error type

use thiserror::Error;

use crate::ShardMismatch;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("entity synthesis error: {0}")]
    EntityId(#[from] homesim_core::EntityIdError),

    /// Validation-time discrepancy; carries shard-level detail and is
    /// non-fatal to the process
    #[error("manifest mismatch: {0:?}")]
    Mismatch(Vec<ShardMismatch>),
}
