//! Error types for environment interaction.

use reverie_core::CognitionError;
use reverie_llm::LlmError;
use thiserror::Error;

/// Errors from perceiving or acting on the forum.
///
/// A missing object is not an error: interaction reports it through
/// [`InteractionOutcome`](crate::InteractionOutcome).
#[derive(Error, Debug)]
pub enum ForumError {
    /// The memory stream or a model call failed.
    #[error("Cognition error: {0}")]
    Cognition(#[from] CognitionError),

    /// The forum source could not produce a snapshot.
    #[error("Forum source error: {0}")]
    Source(String),
}

impl From<LlmError> for ForumError {
    fn from(err: LlmError) -> Self {
        Self::Cognition(CognitionError::Upstream(err))
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, ForumError>;
