//! The memory record: one entry in an agent's stream.
//!
//! Observations, reflections and plans share one record shape; the
//! [`MemoryKind`] tag says which, and plan-only fields live in
//! [`PlanMetadata`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::planning::{PlanId, PlanStatus};
use crate::types::{AgentId, Embedding, Importance, MemoryId};

/// What kind of memory a record is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Something perceived or experienced.
    Observation,
    /// A synthesized higher-order insight.
    Reflection,
    /// A scheduled activity.
    Plan,
}

impl MemoryKind {
    /// Lowercase label used in prompts and storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Observation => "observation",
            Self::Reflection => "reflection",
            Self::Plan => "plan",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plan fields carried by `Plan`-kind records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMetadata {
    /// The plan this record persists.
    pub plan_id: PlanId,
    /// Window start.
    pub start: DateTime<Utc>,
    /// Window end.
    pub end: DateTime<Utc>,
    /// Where the plan takes place.
    #[serde(default)]
    pub location: Option<String>,
    /// Priority in `[1, 10]`.
    pub priority: u8,
    /// Status at the time the record was written.
    pub status: PlanStatus,
    /// Parent plan, for persisted sub-plans.
    #[serde(default)]
    pub parent: Option<PlanId>,
}

/// Open key/value bag attached to every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    /// Where the memory happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Other agents involved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub involved_agents: Vec<AgentId>,
    /// Topic tags (reflections).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    /// Plan fields (plan records).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanMetadata>,
    /// Anything else an integrator wants to keep.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl MemoryMetadata {
    /// Metadata with only a location.
    #[must_use]
    pub fn at(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            ..Self::default()
        }
    }

    /// Add involved agents.
    #[must_use]
    pub fn with_agents(mut self, agents: impl IntoIterator<Item = AgentId>) -> Self {
        self.involved_agents.extend(agents);
        self
    }

    /// Set topic tags.
    #[must_use]
    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }

    /// Attach an arbitrary value.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A single timestamped, scored memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier within the agent's partition.
    pub id: MemoryId,
    /// Natural-language content.
    pub content: String,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
    /// When the record was last returned by retrieval.
    pub last_accessed: DateTime<Utc>,
    /// Observation, reflection or plan.
    pub kind: MemoryKind,
    /// Poignancy in `[1, 10]`, assigned once.
    pub importance: Importance,
    /// Content embedding. `None` scores zero relevance.
    #[serde(default)]
    pub embedding: Option<Embedding>,
    /// Back-references to the memories this one was derived from.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub related: BTreeSet<MemoryId>,
    /// Location, agents, topics, plan fields, extras.
    #[serde(default)]
    pub metadata: MemoryMetadata,
}

impl MemoryRecord {
    /// Create a record stamped at `now`.
    #[must_use]
    pub fn new(
        content: impl Into<String>,
        kind: MemoryKind,
        importance: Importance,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MemoryId::new(),
            content: content.into(),
            created_at: now,
            last_accessed: now,
            kind,
            importance,
            embedding: None,
            related: BTreeSet::new(),
            metadata: MemoryMetadata::default(),
        }
    }

    /// Attach an embedding; an empty vector counts as none.
    #[must_use]
    pub fn with_embedding(mut self, vector: Vec<f32>) -> Self {
        self.embedding = (!vector.is_empty()).then(|| Embedding(vector));
        self
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: MemoryMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach back-references.
    #[must_use]
    pub fn with_related(mut self, related: BTreeSet<MemoryId>) -> Self {
        self.related = related;
        self
    }

    /// One-line rendering used inside prompts.
    #[must_use]
    pub fn prompt_line(&self) -> String {
        format!("[{}] {}", self.kind, self.content)
    }
}
