//! Error kinds raised by the wind engine
//!
//! `InvalidState` and `NumericalFailure` are produced inside a single
//! streamline step and end up recorded as its stall reason.
//! `Configuration` is raised before any integration work starts.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WindError {
    /// Degenerate or non-physical input to the force field
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Non-finite value produced mid-integration
    #[error("numerical failure: {0}")]
    NumericalFailure(String),

    /// Grid or global parameter outside its valid range
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl WindError {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn numerical(msg: impl Into<String>) -> Self {
        Self::NumericalFailure(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, WindError>;
