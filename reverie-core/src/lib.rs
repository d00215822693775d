//! # Reverie Core
//!
//! Cognition for simulated characters: every character owns a memory
//! stream of observations, reflections and plans, ranked for retrieval by
//!
//! ```text
//! score = w_recency · 0.995^hours_since_access
//!       + w_relevance · cosine(query, memory)
//!       + w_importance · importance / 10
//! ```
//!
//! On top of the stream sit three engines:
//!
//! - [`ReflectionEngine`]: turns enough important observations into cited
//!   higher-level insights
//! - [`PlanningEngine`]: daily schedules, minute-scale behaviors and the
//!   `Pending → InProgress → Completed | Cancelled` state machine
//! - [`CognitionOrchestrator`]: the front door for new observations, plus
//!   focus topics and character summaries
//!
//! All model access goes through the two service traits in `reverie_llm`.
//! The core never times out, retries or cancels a call.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod cognition;
pub mod config;
pub mod error;
pub mod memory;
pub mod parse;
pub mod planning;
pub mod reflection;
pub mod retrieval;
pub mod store;
pub mod telemetry;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cognition::{Character, CognitionOrchestrator, CognitionState, ObservationOutcome};
pub use config::CognitionConfig;
pub use error::{CognitionError, Result};
pub use memory::{MemoryKind, MemoryMetadata, MemoryRecord, MemoryStream};
pub use planning::{Plan, PlanId, PlanStatus, PlanTick, PlanningEngine};
pub use reflection::ReflectionEngine;
pub use retrieval::{RetrievalOptions, ScoredMemory};
pub use store::{InMemoryStore, MemoryStore, SqliteStore};
pub use types::{AgentId, Embedding, Importance, MemoryId};
