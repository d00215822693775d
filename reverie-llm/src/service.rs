//! The two service contracts the cognition core calls.
//!
//! Both are single-shot and may take arbitrarily long. The core never
//! retries, times out or cancels a call; adapters such as
//! [`LlmClient`](crate::LlmClient) own those concerns.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LlmError;

/// Free-text completion: one prompt in, one string out.
#[async_trait]
pub trait TextGenerationService: Send + Sync {
    /// Complete `prompt` and return the raw model text.
    ///
    /// # Errors
    ///
    /// Any backend failure. Callers in the core propagate it unchanged.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Dense text embeddings.
///
/// Every vector returned by one implementation must have the same
/// dimensionality, otherwise cosine similarity is meaningless.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed `text`.
    ///
    /// # Errors
    ///
    /// Any backend failure.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

#[async_trait]
impl<T: TextGenerationService + ?Sized> TextGenerationService for Arc<T> {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        (**self).complete(prompt).await
    }
}

#[async_trait]
impl<T: EmbeddingService + ?Sized> EmbeddingService for Arc<T> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        (**self).embed(text).await
    }
}
