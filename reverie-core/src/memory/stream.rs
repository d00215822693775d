//! The memory stream: rated, embedded, per-agent memory partitions.
//!
//! Writers for one agent pass through a FIFO gate (`tokio::sync::Mutex`
//! queues waiters in order). The model calls that rate and embed a new
//! memory happen before the gate is taken, so a slow backend never holds
//! up other writers; stamping, insertion, scoring and the access refresh
//! happen inside it.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reverie_llm::prompt::{IMPORTANCE_RATING, render_template};
use reverie_llm::{EmbeddingService, TextGenerationService};
use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::PersistenceConfig;
use crate::error::Result;
use crate::memory::{MemoryKind, MemoryMetadata, MemoryRecord};
use crate::parse;
use crate::retrieval::{RetrievalOptions, ScoredMemory, rank};
use crate::store::{MemoryStore, open_store};
use crate::types::{AgentId, Embedding, Importance, MemoryId};

/// Per-agent memory partitions with weighted retrieval.
pub struct MemoryStream {
    store: Arc<dyn MemoryStore>,
    generator: Arc<dyn TextGenerationService>,
    embedder: Arc<dyn EmbeddingService>,
    clock: Arc<dyn Clock>,
    gates: DashMap<AgentId, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for MemoryStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStream")
            .field("gated_agents", &self.gates.len())
            .finish_non_exhaustive()
    }
}

impl MemoryStream {
    /// Assemble a stream from its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn MemoryStore>,
        generator: Arc<dyn TextGenerationService>,
        embedder: Arc<dyn EmbeddingService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            generator,
            embedder,
            clock,
            gates: DashMap::new(),
        }
    }

    /// Open the configured store and run on the system clock.
    ///
    /// # Errors
    /// Store open failures.
    pub fn open(
        persistence: &PersistenceConfig,
        generator: Arc<dyn TextGenerationService>,
        embedder: Arc<dyn EmbeddingService>,
    ) -> Result<Self> {
        let store = open_store(persistence)?;
        Ok(Self::new(store, generator, embedder, Arc::new(SystemClock)))
    }

    /// The text-generation service this stream rates memories with.
    #[must_use]
    pub fn generator(&self) -> &Arc<dyn TextGenerationService> {
        &self.generator
    }

    /// The stream's clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Current time on the stream's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn gate(&self, agent: AgentId) -> Arc<Mutex<()>> {
        self.gates.entry(agent).or_default().value().clone()
    }

    /// Rate, embed and store a new memory.
    ///
    /// # Errors
    /// Upstream service failures and store failures. An unreadable rating
    /// is not an error: it becomes [`Importance::DEFAULT`].
    pub async fn add_memory(
        &self,
        agent: AgentId,
        content: impl Into<String>,
        kind: MemoryKind,
        metadata: MemoryMetadata,
    ) -> Result<MemoryRecord> {
        self.add_linked_memory(agent, content, kind, metadata, BTreeSet::new()).await
    }

    /// [`Self::add_memory`] with back-references to source memories.
    ///
    /// # Errors
    /// See [`Self::add_memory`].
    pub async fn add_linked_memory(
        &self,
        agent: AgentId,
        content: impl Into<String>,
        kind: MemoryKind,
        metadata: MemoryMetadata,
        related: BTreeSet<MemoryId>,
    ) -> Result<MemoryRecord> {
        let content = content.into();
        let importance = self.rate_importance(&content).await?;
        let vector = self.embedder.embed(&content).await?;

        let gate = self.gate(agent);
        let _guard = gate.lock().await;
        let record = MemoryRecord::new(content, kind, importance, self.clock.now())
            .with_embedding(vector)
            .with_metadata(metadata)
            .with_related(related);
        self.store.insert(agent, &record)?;

        debug!(
            agent = %agent,
            memory = %record.id,
            kind = %record.kind,
            importance = record.importance.value(),
            "Memory added"
        );
        Ok(record)
    }

    async fn rate_importance(&self, content: &str) -> Result<Importance> {
        let prompt = render_template(IMPORTANCE_RATING, &[("memory", content)]);
        let response = self.generator.complete(&prompt).await?;
        Ok(parse::parse_importance(&response).unwrap_or_else(|| {
            debug!(response = %response.trim(), "Unreadable importance rating, using default");
            Importance::DEFAULT
        }))
    }

    /// Top memories for `query`, with their access times refreshed.
    ///
    /// # Errors
    /// Upstream embedding failures and store failures.
    pub async fn retrieve_memories(
        &self,
        agent: AgentId,
        query: &str,
        options: &RetrievalOptions,
    ) -> Result<Vec<MemoryRecord>> {
        Ok(self
            .retrieve_scored(agent, query, options)
            .await?
            .into_iter()
            .map(|scored| scored.memory)
            .collect())
    }

    /// [`Self::retrieve_memories`] with per-factor score breakdowns.
    ///
    /// # Errors
    /// Upstream embedding failures and store failures.
    pub async fn retrieve_scored(
        &self,
        agent: AgentId,
        query: &str,
        options: &RetrievalOptions,
    ) -> Result<Vec<ScoredMemory>> {
        if self.store.len(agent)? == 0 {
            return Ok(Vec::new());
        }
        let query = Embedding(self.embedder.embed(query).await?);

        let gate = self.gate(agent);
        let _guard = gate.lock().await;
        let Some(memories) = self.store.load(agent)? else {
            return Ok(Vec::new());
        };

        let now = self.clock.now();
        let mut scored = rank(&memories, Some(&query), now, options);
        let ids: Vec<MemoryId> = scored.iter().map(|s| s.memory.id).collect();
        self.store.touch(agent, &ids, now)?;
        for s in &mut scored {
            s.memory.last_accessed = now;
        }
        Ok(scored)
    }

    /// Every memory of `agent` in insertion order. Does not refresh access.
    ///
    /// # Errors
    /// Store failures.
    pub fn memories(&self, agent: AgentId) -> Result<Vec<MemoryRecord>> {
        Ok(self.store.load(agent)?.unwrap_or_default())
    }

    /// Memories created in `[from, to)`, in insertion order.
    ///
    /// # Errors
    /// Store failures.
    pub fn memories_between(
        &self,
        agent: AgentId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MemoryRecord>> {
        let mut memories = self.memories(agent)?;
        memories.retain(|m| m.created_at >= from && m.created_at < to);
        Ok(memories)
    }

    /// Number of memories `agent` owns.
    ///
    /// # Errors
    /// Store failures.
    pub fn partition_len(&self, agent: AgentId) -> Result<usize> {
        self.store.len(agent)
    }
}
