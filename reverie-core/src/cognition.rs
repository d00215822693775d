//! The cognition orchestrator: front door for new observations.
//!
//! ```text
//! observation ──▶ MemoryStream::add_memory
//!                      │
//!                      ▼
//!          ReflectionEngine::should_generate_reflection ──yes──▶ generate_reflection
//!                      │
//!                      ▼
//!               focus topics recomputed
//! ```

use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reverie_llm::prompt::{CHARACTER_SUMMARY, FOCUS_TOPICS, render_template};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{CognitionConfig, FocusConfig, SummaryConfig};
use crate::error::Result;
use crate::memory::{MemoryKind, MemoryMetadata, MemoryRecord, MemoryStream};
use crate::parse;
use crate::reflection::ReflectionEngine;
use crate::retrieval::RetrievalOptions;
use crate::types::AgentId;

/// Per-character cognitive bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CognitionState {
    /// Themes the character is currently interested in.
    pub focus_topics: Vec<String>,
    /// End of the last successful reflection pass.
    pub last_reflection_time: Option<DateTime<Utc>>,
    /// When the last daily plan was generated.
    pub last_planning_time: Option<DateTime<Utc>>,
    /// Importance sum that triggers reflection.
    pub reflection_threshold: u32,
}

impl CognitionState {
    /// Fresh state with the given reflection threshold.
    #[must_use]
    pub fn new(reflection_threshold: u32) -> Self {
        Self {
            focus_topics: Vec::new(),
            last_reflection_time: None,
            last_planning_time: None,
            reflection_threshold,
        }
    }
}

/// A simulated character. Owns exactly one memory partition, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// Partition key.
    pub id: AgentId,
    /// Display name used in prompts.
    pub name: String,
    /// Free-text description fed to prompts.
    pub persona: String,
    /// Cognitive state.
    pub cognition: CognitionState,
}

impl Character {
    /// A new character with a random id.
    #[must_use]
    pub fn new(name: impl Into<String>, persona: impl Into<String>, reflection_threshold: u32) -> Self {
        Self {
            id: AgentId::new(),
            name: name.into(),
            persona: persona.into(),
            cognition: CognitionState::new(reflection_threshold),
        }
    }

    /// Use an existing id.
    #[must_use]
    pub fn with_id(mut self, id: AgentId) -> Self {
        self.id = id;
        self
    }
}

/// Result of [`CognitionOrchestrator::process_new_observation`].
#[derive(Debug, Clone)]
pub struct ObservationOutcome {
    /// The stored observation.
    pub memory: MemoryRecord,
    /// Reflections produced by this observation, if any.
    pub reflections: Vec<MemoryRecord>,
    /// Focus topics after the update.
    pub focus_topics: Vec<String>,
}

/// Wires the memory stream, reflection and focus maintenance together.
#[derive(Debug)]
pub struct CognitionOrchestrator {
    stream: Arc<MemoryStream>,
    reflection: ReflectionEngine,
    focus: FocusConfig,
    summary: SummaryConfig,
}

impl CognitionOrchestrator {
    /// Build an orchestrator over `stream`.
    #[must_use]
    pub fn new(stream: Arc<MemoryStream>, config: &CognitionConfig) -> Self {
        Self {
            reflection: ReflectionEngine::new(Arc::clone(&stream), config.reflection.clone()),
            stream,
            focus: config.focus.clone(),
            summary: config.summary.clone(),
        }
    }

    /// The underlying stream.
    #[must_use]
    pub fn stream(&self) -> &Arc<MemoryStream> {
        &self.stream
    }

    /// The reflection engine.
    #[must_use]
    pub fn reflection(&self) -> &ReflectionEngine {
        &self.reflection
    }

    /// Store an observation, reflect if due, and refresh focus topics.
    ///
    /// # Errors
    /// Upstream and store failures from any step. Work done by earlier
    /// steps is kept.
    pub async fn process_new_observation(
        &self,
        character: &mut Character,
        observation: &str,
        metadata: MemoryMetadata,
    ) -> Result<ObservationOutcome> {
        let memory = self
            .stream
            .add_memory(character.id, observation, MemoryKind::Observation, metadata)
            .await?;

        let reflections = if self.reflection.should_generate_reflection(character).await? {
            self.reflection.generate_reflection(character).await?
        } else {
            Vec::new()
        };

        let focus_topics = self.update_focus_topics(character).await?;
        Ok(ObservationOutcome {
            memory,
            reflections,
            focus_topics,
        })
    }

    /// Recompute focus topics from the most recent memories. An empty parse
    /// keeps the previous topics.
    ///
    /// # Errors
    /// Upstream and store failures.
    pub async fn update_focus_topics(&self, character: &mut Character) -> Result<Vec<String>> {
        let recent = self
            .stream
            .retrieve_memories(
                character.id,
                "current interests",
                &RetrievalOptions::recency_only(self.focus.window),
            )
            .await?;

        let prompt = render_template(FOCUS_TOPICS, &[
            ("name", character.name.as_str()),
            ("memories", bulleted(&recent).as_str()),
        ]);
        let response = self.stream.generator().complete(&prompt).await?;
        let topics = parse::parse_list_lines(&response, self.focus.max_topics);
        if topics.is_empty() {
            debug!(agent = %character.id, "No focus topics parsed, keeping previous");
        } else {
            character.cognition.focus_topics = topics;
        }
        Ok(character.cognition.focus_topics.clone())
    }

    /// A third-person summary built from the character's most important
    /// reflections and observations.
    ///
    /// # Errors
    /// Upstream and store failures.
    pub async fn get_character_summary(&self, character: &Character) -> Result<String> {
        let per_kind = self.summary.per_kind;
        let mut memories = self
            .stream
            .retrieve_memories(
                character.id,
                &character.name,
                &RetrievalOptions::importance_only(per_kind).with_kinds([MemoryKind::Reflection]),
            )
            .await?;
        memories.extend(
            self.stream
                .retrieve_memories(
                    character.id,
                    &character.name,
                    &RetrievalOptions::importance_only(per_kind).with_kinds([MemoryKind::Observation]),
                )
                .await?,
        );
        memories.sort_by_key(|m| Reverse(m.importance));
        memories.truncate(self.summary.keep);

        let listing = if memories.is_empty() {
            "(no memories yet)".to_string()
        } else {
            bulleted(&memories)
        };
        let prompt = render_template(CHARACTER_SUMMARY, &[
            ("name", character.name.as_str()),
            ("persona", character.persona.as_str()),
            ("memories", listing.as_str()),
        ]);
        Ok(self.stream.generator().complete(&prompt).await?.trim().to_string())
    }
}

/// `- [kind] content` lines.
pub(crate) fn bulleted(memories: &[MemoryRecord]) -> String {
    memories
        .iter()
        .map(|m| format!("- {}", m.prompt_line()))
        .collect::<Vec<_>>()
        .join("\n")
}
