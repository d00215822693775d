//! Forum entities as delivered by a [`ForumSource`](crate::ForumSource).

use std::collections::BTreeMap;

use reverie_core::{AgentId, MemoryRecord};
use serde::{Deserialize, Serialize};

/// A place in the forum. Locations form a shallow tree via `parent_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumLocation {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Enclosing location, if any.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Number of users currently present.
    #[serde(default)]
    pub active_users: u32,
    /// Arbitrary mutable properties.
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl ForumLocation {
    /// A location with no parent, users or properties.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            parent_id: None,
            active_users: 0,
            properties: BTreeMap::new(),
        }
    }

    /// Place inside `parent`.
    #[must_use]
    pub fn within(mut self, parent: impl Into<String>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    /// Set the active user count.
    #[must_use]
    pub fn with_active_users(mut self, n: u32) -> Self {
        self.active_users = n;
        self
    }
}

/// An object placed at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumObject {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Kind of object, e.g. "furniture".
    pub object_type: String,
    /// Location holding the object.
    pub location_id: String,
    /// Current status, e.g. "idle" or "brewing".
    #[serde(default)]
    pub status: String,
    /// Arbitrary mutable properties.
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl ForumObject {
    /// An object with the given status and no properties.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        object_type: impl Into<String>,
        location_id: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            object_type: object_type.into(),
            location_id: location_id.into(),
            status: status.into(),
            properties: BTreeMap::new(),
        }
    }
}

/// Someone present in the forum: another agent or a human user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumOccupant {
    /// Set when the occupant is a simulated agent.
    #[serde(default)]
    pub agent_id: Option<AgentId>,
    /// Display name.
    pub name: String,
    /// Where they are.
    pub location_id: String,
    /// What they are doing; empty when unremarkable.
    #[serde(default)]
    pub status: String,
}

impl ForumOccupant {
    /// An occupant with an unremarkable status.
    #[must_use]
    pub fn new(name: impl Into<String>, location_id: impl Into<String>) -> Self {
        Self {
            agent_id: None,
            name: name.into(),
            location_id: location_id.into(),
            status: String::new(),
        }
    }

    /// Mark as a simulated agent.
    #[must_use]
    pub fn agent(mut self, id: AgentId) -> Self {
        self.agent_id = Some(id);
        self
    }

    /// Set the status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }
}

/// Everything a source knows at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForumSnapshot {
    /// All locations.
    #[serde(default)]
    pub locations: Vec<ForumLocation>,
    /// All objects.
    #[serde(default)]
    pub objects: Vec<ForumObject>,
    /// Everyone present.
    #[serde(default)]
    pub occupants: Vec<ForumOccupant>,
}

/// What one perception pass saw and recorded.
#[derive(Debug, Clone, Default)]
pub struct Perception {
    /// The character's location, if one could be determined.
    pub location: Option<ForumLocation>,
    /// Observations written to the memory stream, in order.
    pub observations: Vec<MemoryRecord>,
}

/// Result of acting on an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionOutcome {
    /// False when the object is unknown.
    pub success: bool,
    /// Human-readable description of what happened.
    pub result: String,
    /// The object's status after the action, if the model gave one.
    pub new_status: Option<String>,
}
