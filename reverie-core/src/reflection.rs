//! Reflection: synthesizing higher-order memories.
//!
//! A character reflects once the summed importance of its recent
//! observations reaches its threshold. A pass asks
//! the model for salient questions about recent memories, then for each
//! question gathers evidence by relevance, asks for cited insights and
//! topic tags, and stores one `Reflection` memory linked to the evidence.

use std::collections::BTreeSet;
use std::sync::Arc;

use reverie_llm::prompt::{REFLECTION_INSIGHTS, REFLECTION_QUESTIONS, REFLECTION_TOPICS, render_template};
use tracing::{debug, info};

use crate::cognition::Character;
use crate::config::ReflectionConfig;
use crate::error::Result;
use crate::memory::{MemoryKind, MemoryMetadata, MemoryRecord, MemoryStream};
use crate::parse;
use crate::retrieval::RetrievalOptions;
use crate::types::MemoryId;

/// Tags kept per reflection.
const MAX_TOPICS: usize = 5;

/// Decides when to reflect and runs reflection passes.
#[derive(Debug)]
pub struct ReflectionEngine {
    stream: Arc<MemoryStream>,
    config: ReflectionConfig,
}

impl ReflectionEngine {
    /// Create an engine writing into `stream`.
    #[must_use]
    pub fn new(stream: Arc<MemoryStream>, config: ReflectionConfig) -> Self {
        Self { stream, config }
    }

    /// True when the recent observations' importance sum reaches the
    /// character's threshold.
    ///
    /// Looks at up to `observation_window` observations by recency. With
    /// `count_since_last_reflection` set, only those created after the last
    /// reflection count.
    ///
    /// # Errors
    /// Upstream and store failures.
    pub async fn should_generate_reflection(&self, character: &Character) -> Result<bool> {
        let options = RetrievalOptions::recency_only(self.config.observation_window)
            .with_kinds([MemoryKind::Observation]);
        let recent = self
            .stream
            .retrieve_memories(character.id, "recent observations", &options)
            .await?;

        let since = character
            .cognition
            .last_reflection_time
            .filter(|_| self.config.count_since_last_reflection);
        let total: u32 = recent
            .iter()
            .filter(|m| since.is_none_or(|t| m.created_at > t))
            .map(|m| u32::from(m.importance.value()))
            .sum();

        let due = total >= character.cognition.reflection_threshold;
        debug!(
            agent = %character.id,
            total,
            threshold = character.cognition.reflection_threshold,
            due,
            "Reflection check"
        );
        Ok(due)
    }

    /// Run one reflection pass and return the stored reflections.
    ///
    /// Reflections stored before an upstream failure are kept; the last
    /// reflection time only moves when the whole pass succeeds.
    ///
    /// # Errors
    /// Upstream and store failures.
    pub async fn generate_reflection(&self, character: &mut Character) -> Result<Vec<MemoryRecord>> {
        let agent = character.id;
        let recent = self
            .stream
            .retrieve_memories(
                agent,
                "recent events",
                &RetrievalOptions::recency_only(self.config.question_context),
            )
            .await?;
        if recent.is_empty() {
            debug!(agent = %agent, "Nothing to reflect on");
            return Ok(Vec::new());
        }

        let prompt = render_template(REFLECTION_QUESTIONS, &[
            ("name", character.name.as_str()),
            ("memories", numbered(&recent).as_str()),
        ]);
        let response = self.stream.generator().complete(&prompt).await?;
        let questions = parse::parse_questions(&response, self.config.question_count);

        let mut reflections = Vec::with_capacity(questions.len());
        for question in &questions {
            if let Some(record) = self.reflect_on(character, question).await? {
                reflections.push(record);
            }
        }

        character.cognition.last_reflection_time = Some(self.stream.now());
        info!(agent = %agent, reflections = reflections.len(), "Reflection pass complete");
        Ok(reflections)
    }

    async fn reflect_on(&self, character: &Character, question: &str) -> Result<Option<MemoryRecord>> {
        let evidence = self
            .stream
            .retrieve_memories(
                character.id,
                question,
                &RetrievalOptions::relevance_only(self.config.evidence_per_question),
            )
            .await?;

        let prompt = render_template(REFLECTION_INSIGHTS, &[
            ("name", character.name.as_str()),
            ("question", question),
            ("memories", numbered(&evidence).as_str()),
        ]);
        let response = self.stream.generator().complete(&prompt).await?;
        let insights = parse::parse_insights(&response, evidence.len());
        if insights.is_empty() {
            debug!(question, "No insights parsed, skipping question");
            return Ok(None);
        }

        let mut related: BTreeSet<MemoryId> = insights
            .iter()
            .flat_map(|i| i.citations.iter().map(|&idx| evidence[idx].id))
            .collect();
        if related.is_empty() {
            related = evidence.iter().map(|m| m.id).collect();
        }

        let content = insights.iter().map(|i| i.text.as_str()).collect::<Vec<_>>().join(" ");
        let prompt = render_template(REFLECTION_TOPICS, &[("insights", content.as_str())]);
        let topics = parse::parse_topics(&self.stream.generator().complete(&prompt).await?, MAX_TOPICS);

        let metadata = MemoryMetadata::default()
            .with_topics(topics)
            .with_extra("question", serde_json::Value::String(question.to_string()));
        let record = self
            .stream
            .add_linked_memory(character.id, content, MemoryKind::Reflection, metadata, related)
            .await?;
        Ok(Some(record))
    }
}

/// `1. [kind] content` lines, numbered from 1 so citations can refer back.
pub(crate) fn numbered(memories: &[MemoryRecord]) -> String {
    memories
        .iter()
        .enumerate()
        .map(|(i, m)| format!("{}. {}", i + 1, m.prompt_line()))
        .collect::<Vec<_>>()
        .join("\n")
}
