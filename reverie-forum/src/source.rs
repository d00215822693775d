//! Where forum snapshots come from.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::types::ForumSnapshot;

/// A provider of forum state: a game server, a chat backend, a fixture.
#[async_trait]
pub trait ForumSource: Send + Sync {
    /// The current state of the whole forum.
    ///
    /// # Errors
    /// [`ForumError::Source`](crate::ForumError::Source) when the state
    /// cannot be fetched.
    async fn snapshot(&self) -> Result<ForumSnapshot>;
}

/// A source serving a snapshot held in memory.
#[derive(Debug, Default)]
pub struct StaticForumSource {
    snapshot: RwLock<ForumSnapshot>,
}

impl StaticForumSource {
    /// Serve `snapshot`.
    #[must_use]
    pub fn new(snapshot: ForumSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Replace the served snapshot.
    pub fn replace(&self, snapshot: ForumSnapshot) {
        *self.snapshot.write() = snapshot;
    }

    /// Edit the served snapshot in place.
    pub fn update(&self, f: impl FnOnce(&mut ForumSnapshot)) {
        f(&mut self.snapshot.write());
    }
}

#[async_trait]
impl ForumSource for StaticForumSource {
    async fn snapshot(&self) -> Result<ForumSnapshot> {
        Ok(self.snapshot.read().clone())
    }
}
