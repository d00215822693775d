//! Storage backends for memory partitions.
//!
//! The stream talks to storage only through [`MemoryStore`]. Backends are
//! plain key-value repositories: they do not order concurrent writers,
//! that is the stream's per-agent gate.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::PersistenceConfig;
use crate::error::{CognitionError, Result};
use crate::memory::MemoryRecord;
use crate::types::{AgentId, MemoryId};

/// A per-agent partitioned record store.
pub trait MemoryStore: Send + Sync {
    /// Append `record` to `agent`'s partition, creating it if needed.
    ///
    /// # Errors
    /// Backend failures.
    fn insert(&self, agent: AgentId, record: &MemoryRecord) -> Result<()>;

    /// Every record of `agent` in insertion order, or `None` if the agent
    /// has no partition.
    ///
    /// # Errors
    /// Backend failures.
    fn load(&self, agent: AgentId) -> Result<Option<Vec<MemoryRecord>>>;

    /// Set `last_accessed = at` on the given records. Unknown ids are ignored.
    ///
    /// # Errors
    /// Backend failures.
    fn touch(&self, agent: AgentId, ids: &[MemoryId], at: DateTime<Utc>) -> Result<()>;

    /// Agents that own a partition.
    ///
    /// # Errors
    /// Backend failures.
    fn agents(&self) -> Result<Vec<AgentId>>;

    /// Number of records in `agent`'s partition (0 if none).
    ///
    /// # Errors
    /// Backend failures.
    fn len(&self, agent: AgentId) -> Result<usize> {
        Ok(self.load(agent)?.map_or(0, |records| records.len()))
    }
}

/// Open the backend named by `config.backend`.
///
/// # Errors
/// `CognitionError::Config` for an unknown backend, or the backend's own
/// open error.
pub fn open_store(config: &PersistenceConfig) -> Result<Arc<dyn MemoryStore>> {
    match config.backend.to_ascii_lowercase().as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        "sqlite" => Ok(Arc::new(SqliteStore::open(&config.sqlite_path, config)?)),
        other => Err(CognitionError::Config(format!("unknown storage backend '{other}'"))),
    }
}
