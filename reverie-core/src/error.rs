//! Error types for the cognition core.

use reverie_llm::LlmError;
use thiserror::Error;

use crate::planning::{PlanId, PlanStatus};

/// Top-level error type for all cognition operations.
///
/// Malformed model output is never an error here: it is defaulted or
/// dropped where it is parsed. What reaches this type is either an upstream
/// service failure or a genuine misuse of the API.
#[derive(Error, Debug)]
pub enum CognitionError {
    /// The text-generation or embedding service failed.
    #[error("Upstream service failed: {0}")]
    Upstream(#[from] LlmError),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A plan was asked to move along an edge the state machine forbids.
    #[error("Illegal plan transition for {plan}: {from:?} -> {to:?}")]
    IllegalTransition {
        /// The plan concerned.
        plan: PlanId,
        /// Its current status.
        from: PlanStatus,
        /// The requested status.
        to: PlanStatus,
    },

    /// No plan with this id is scheduled for the agent.
    #[error("Plan not found: {0}")]
    PlanNotFound(PlanId),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for CognitionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, CognitionError>;
