//! # reverie-llm: generative backend boundary
//!
//! The cognition core talks to exactly two remote functions:
//!   - [`TextGenerationService::complete`]: prompt in, text out
//!   - [`EmbeddingService::embed`]: text in, dense vector out
//!
//! This crate defines those contracts, the prompt templates whose answer
//! formats the core parses, an HTTP [`LlmClient`] for Ollama and
//! OpenAI-compatible servers, and scripted doubles in [`testing`].
//!
//! ```text
//! core ──complete()──▶ LlmClient ──HTTP──▶ /api/generate | /v1/chat/completions
//!      ──embed()─────▶ LlmClient ──HTTP──▶ /api/embeddings | /v1/embeddings
//! ```
//!
//! Timeouts and retries are configured on the client, never in the core.

pub mod client;
pub mod error;
pub mod prompt;
pub mod service;
pub mod testing;
pub mod types;

pub use client::{LlmClient, LlmProvider};
pub use error::LlmError;
pub use service::{EmbeddingService, TextGenerationService};
pub use types::{LlmRequest, LlmResponse};
