//! Error types for the planner.
//!
//! The derivation engine only ever fails with [`PlannerError::Validation`];
//! numeric edge cases such as zero sales are absorbed by the engine
//! itself.  The remaining variants belong to the scenario and profile
//! stores and to the session layer.

use thiserror::Error;

/// Result type alias for planner operations.
pub type Result<T> = std::result::Result<T, PlannerError>;

#[derive(Debug, Error)]
pub enum PlannerError {
    /// The input snapshot is malformed: a missing or unknown category
    /// key, a non-finite number, or a negative value where the input
    /// model requires non-negative amounts.
    #[error("validation error: {0}")]
    Validation(String),

    /// Saving a new scenario would exceed the per-owner limit.
    #[error("owner {owner} already has {limit} scenarios; delete or overwrite one")]
    CapacityExceeded { owner: String, limit: usize },

    #[error("scenario {name:?} not found for owner {owner}")]
    NotFound { owner: String, name: String },

    /// The persistence backend could not be reached.  Computation never
    /// depends on the store, so callers may keep working in memory.
    #[error("scenario store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("scenario {0:?} is currently active and cannot be deleted")]
    ScenarioActive(String),

    #[error("access denied for owner {0}")]
    Unauthorized(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PlannerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    pub fn not_found(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            owner: owner.into(),
            name: name.into(),
        }
    }
}
