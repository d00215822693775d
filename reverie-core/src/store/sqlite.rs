//! SQLite persistence for memory partitions.
//!
//! One row per record, JSON inside a BLOB column so the schema survives
//! record-shape changes:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS memories (
//!     seq           INTEGER PRIMARY KEY AUTOINCREMENT,
//!     agent_id      TEXT NOT NULL,
//!     memory_id     TEXT NOT NULL,
//!     kind          TEXT NOT NULL,
//!     created_at    TEXT NOT NULL,
//!     last_accessed TEXT NOT NULL,
//!     data          BLOB NOT NULL,
//!     UNIQUE (agent_id, memory_id)
//! );
//! ```
//!
//! `seq` preserves insertion order. `last_accessed` is kept in its own column
//! so an access refresh never rewrites the blob; the column wins on load.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, params};
use tracing::{debug, info};
use uuid::Uuid;

use super::MemoryStore;
use crate::config::PersistenceConfig;
use crate::error::{CognitionError, Result};
use crate::memory::MemoryRecord;
use crate::types::{AgentId, MemoryId};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS memories (
        seq           INTEGER PRIMARY KEY AUTOINCREMENT,
        agent_id      TEXT NOT NULL,
        memory_id     TEXT NOT NULL,
        kind          TEXT NOT NULL,
        created_at    TEXT NOT NULL,
        last_accessed TEXT NOT NULL,
        data          BLOB NOT NULL,
        UNIQUE (agent_id, memory_id)
    );
    CREATE INDEX IF NOT EXISTS idx_memories_agent ON memories (agent_id, seq);";

/// Handle to an SQLite database holding every agent's partition.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) a database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CognitionError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;
        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "Memory store opened"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`CognitionError::Database`] on SQLite failures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.db_path
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CognitionError::Serialization(format!("bad timestamp '{raw}': {e}")))
}

impl MemoryStore for SqliteStore {
    fn insert(&self, agent: AgentId, record: &MemoryRecord) -> Result<()> {
        let json = serde_json::to_vec(record)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO memories (agent_id, memory_id, kind, created_at, last_accessed, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                agent.0.to_string(),
                record.id.0.to_string(),
                record.kind.as_str(),
                record.created_at.to_rfc3339(),
                record.last_accessed.to_rfc3339(),
                json,
            ],
        )?;
        debug!(agent = %agent, memory = %record.id, bytes = json.len(), "Stored memory");
        Ok(())
    }

    fn load(&self, agent: AgentId) -> Result<Option<Vec<MemoryRecord>>> {
        let start = Instant::now();
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT data, last_accessed FROM memories WHERE agent_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![agent.0.to_string()], |row| {
            Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (data, last_accessed) = row?;
            let mut record: MemoryRecord = serde_json::from_slice(&data)?;
            record.last_accessed = parse_time(&last_accessed)?;
            records.push(record);
        }

        debug!(
            agent = %agent,
            memories = records.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Loaded partition"
        );

        Ok((!records.is_empty()).then_some(records))
    }

    fn touch(&self, agent: AgentId, ids: &[MemoryId], at: DateTime<Utc>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "UPDATE memories SET last_accessed = ?1 WHERE agent_id = ?2 AND memory_id = ?3",
            )?;
            let at = at.to_rfc3339();
            let agent = agent.0.to_string();
            for id in ids {
                stmt.execute(params![at, agent, id.0.to_string()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn agents(&self) -> Result<Vec<AgentId>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT DISTINCT agent_id FROM memories")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut agents = Vec::new();
        for row in rows {
            let raw = row?;
            let uuid = Uuid::parse_str(&raw)
                .map_err(|e| CognitionError::Serialization(format!("bad agent id '{raw}': {e}")))?;
            agents.push(AgentId(uuid));
        }
        Ok(agents)
    }

    fn len(&self, agent: AgentId) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memories WHERE agent_id = ?1",
            params![agent.0.to_string()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryKind, MemoryMetadata};
    use crate::types::Importance;
    use chrono::{Duration, TimeZone};

    fn sample(content: &str) -> MemoryRecord {
        let t = Utc.with_ymd_and_hms(2024, 2, 13, 9, 30, 0).unwrap();
        MemoryRecord::new(content, MemoryKind::Observation, Importance::new(6), t)
            .with_embedding(vec![0.1, 0.2, 0.3])
            .with_metadata(MemoryMetadata::at("Library"))
    }

    #[test]
    fn insert_then_load_preserves_order_and_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        let agent = AgentId::new();
        let a = sample("first");
        let b = sample("second");
        store.insert(agent, &a).unwrap();
        store.insert(agent, &b).unwrap();

        let loaded = store.load(agent).unwrap().unwrap();
        assert_eq!(loaded, vec![a, b]);
        assert_eq!(store.len(agent).unwrap(), 2);
        assert_eq!(store.agents().unwrap(), vec![agent]);
    }

    #[test]
    fn unknown_agent_has_no_partition() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.load(AgentId::new()).unwrap().is_none());
    }

    #[test]
    fn touch_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("memories.db");
        let agent = AgentId::new();
        let record = sample("kept");
        let later = record.last_accessed + Duration::hours(4);

        {
            let store = SqliteStore::open(&path, &PersistenceConfig::default()).unwrap();
            store.insert(agent, &record).unwrap();
            store.touch(agent, &[record.id], later).unwrap();
        }

        let store = SqliteStore::open(&path, &PersistenceConfig::default()).unwrap();
        let loaded = store.load(agent).unwrap().unwrap();
        assert_eq!(loaded[0].last_accessed, later);
        assert_eq!(loaded[0].created_at, record.created_at);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let agent = AgentId::new();
        let record = sample("dup");
        store.insert(agent, &record).unwrap();
        assert!(matches!(store.insert(agent, &record), Err(CognitionError::Database(_))));
    }
}
