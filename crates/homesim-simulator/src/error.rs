//! Simulator-level error type

use homesim_core::EntityIdError;
use homesim_runtime::ClockError;
use homesim_state_store::StoreError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimulatorError {
    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    EntityId(#[from] EntityIdError),

    #[error("home '{0}' is already registered")]
    HomeExists(String),

    #[error("home '{0}' not found")]
    HomeNotFound(String),
}
