//! In-process store: one `Vec` per agent in a sharded map.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::MemoryStore;
use crate::error::Result;
use crate::memory::MemoryRecord;
use crate::types::{AgentId, MemoryId};

/// Volatile store; partitions live as long as the value.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    partitions: DashMap<AgentId, Vec<MemoryRecord>>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryStore for InMemoryStore {
    fn insert(&self, agent: AgentId, record: &MemoryRecord) -> Result<()> {
        self.partitions.entry(agent).or_default().push(record.clone());
        Ok(())
    }

    fn load(&self, agent: AgentId) -> Result<Option<Vec<MemoryRecord>>> {
        Ok(self.partitions.get(&agent).map(|p| p.value().clone()))
    }

    fn touch(&self, agent: AgentId, ids: &[MemoryId], at: DateTime<Utc>) -> Result<()> {
        if let Some(mut partition) = self.partitions.get_mut(&agent) {
            for record in partition.iter_mut().filter(|r| ids.contains(&r.id)) {
                record.last_accessed = at;
            }
        }
        Ok(())
    }

    fn agents(&self) -> Result<Vec<AgentId>> {
        Ok(self.partitions.iter().map(|e| *e.key()).collect())
    }

    fn len(&self, agent: AgentId) -> Result<usize> {
        Ok(self.partitions.get(&agent).map_or(0, |p| p.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryKind;
    use crate::types::Importance;
    use chrono::Duration;

    #[test]
    fn partitions_are_independent() {
        let store = InMemoryStore::new();
        let (a, b) = (AgentId::new(), AgentId::new());
        let now = Utc::now();
        store
            .insert(a, &MemoryRecord::new("a1", MemoryKind::Observation, Importance::DEFAULT, now))
            .unwrap();
        assert_eq!(store.len(a).unwrap(), 1);
        assert_eq!(store.len(b).unwrap(), 0);
        assert!(store.load(b).unwrap().is_none());
    }

    #[test]
    fn touch_updates_only_named_records() {
        let store = InMemoryStore::new();
        let agent = AgentId::new();
        let now = Utc::now();
        let first = MemoryRecord::new("one", MemoryKind::Observation, Importance::DEFAULT, now);
        let second = MemoryRecord::new("two", MemoryKind::Observation, Importance::DEFAULT, now);
        store.insert(agent, &first).unwrap();
        store.insert(agent, &second).unwrap();

        let later = now + Duration::hours(3);
        store.touch(agent, &[second.id], later).unwrap();

        let loaded = store.load(agent).unwrap().unwrap();
        assert_eq!(loaded[0].last_accessed, now);
        assert_eq!(loaded[1].last_accessed, later);
    }
}
