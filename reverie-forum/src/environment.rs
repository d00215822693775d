//! Perception of, and action on, the shared forum.
//!
//! Each perception pass pulls a fresh snapshot, replaces the caches
//! wholesale, and writes what the character notices into its memory
//! stream. Verbosity is tiered:
//!
//! 1. arrival, when the character's location changed since its last pass
//! 2. every object and occupant with a remarkable status, individually
//! 3. the rest, individually while there are few of them, otherwise as one
//!    aggregate line per group

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use reverie_core::config::EnvironmentConfig;
use reverie_core::parse;
use reverie_core::{AgentId, Character, MemoryKind, MemoryMetadata, MemoryStream};
use reverie_llm::prompt::{LOCATION_SELECTION, OBJECT_INTERACTION, render_template};
use tracing::{debug, info};

use crate::cache::KeyedCache;
use crate::error::Result;
use crate::source::ForumSource;
use crate::types::{ForumLocation, ForumObject, ForumOccupant, InteractionOutcome, Perception};

/// Names listed in an aggregate observation.
const AGGREGATE_EXAMPLES: usize = 3;

/// Metadata key holding the location id next to the human-readable name.
const LOCATION_ID_KEY: &str = "location_id";

#[derive(Debug, Default)]
struct ForumState {
    locations: KeyedCache<ForumLocation>,
    objects: KeyedCache<ForumObject>,
    occupants: Vec<ForumOccupant>,
    current: HashMap<AgentId, String>,
}

/// A character's window onto the forum.
pub struct Environment {
    stream: Arc<MemoryStream>,
    source: Arc<dyn ForumSource>,
    config: EnvironmentConfig,
    state: RwLock<ForumState>,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Environment")
            .field("locations", &state.locations.len())
            .field("objects", &state.objects.len())
            .field("occupants", &state.occupants.len())
            .finish_non_exhaustive()
    }
}

impl Environment {
    /// Create an environment reading from `source` and remembering into
    /// `stream`.
    #[must_use]
    pub fn new(stream: Arc<MemoryStream>, source: Arc<dyn ForumSource>, config: EnvironmentConfig) -> Self {
        Self {
            stream,
            source,
            config,
            state: RwLock::new(ForumState::default()),
        }
    }

    /// Refresh the caches and record what `character` notices.
    ///
    /// # Errors
    /// Source failures, and upstream or store failures while recording.
    pub async fn perceive_environment(&self, character: &Character) -> Result<Perception> {
        let snapshot = self.source.snapshot().await?;

        let (location, previous, objects, occupants) = {
            let mut state = self.state.write();
            state.locations.replace_all(snapshot.locations);
            state.objects.replace_all(snapshot.objects);
            state.occupants = snapshot.occupants;

            let Some(location) = Self::locate(&state, character) else {
                debug!(agent = %character.id, "No current location could be determined");
                state.current.remove(&character.id);
                return Ok(Perception::default());
            };
            let previous = state.current.insert(character.id, location.id.clone());
            let objects: Vec<ForumObject> = state
                .objects
                .iter()
                .filter(|o| o.location_id == location.id)
                .cloned()
                .collect();
            let occupants: Vec<ForumOccupant> = state
                .occupants
                .iter()
                .filter(|o| o.location_id == location.id && !Self::is_self(o, character))
                .cloned()
                .collect();
            (location, previous, objects, occupants)
        };

        let mut notes: Vec<(String, Vec<AgentId>)> = Vec::new();
        if previous.as_deref() != Some(location.id.as_str()) {
            let mut arrival = format!("{} arrived at {}.", character.name, location.name);
            if !location.description.is_empty() {
                arrival.push(' ');
                arrival.push_str(&location.description);
            }
            notes.push((arrival, Vec::new()));
        }

        let (remarkable, ordinary): (Vec<_>, Vec<_>) =
            objects.iter().partition(|o| !self.config.is_normal_status(&o.status));
        for object in remarkable {
            notes.push((format!("The {} ({}) is {}.", object.name, object.object_type, object.status.trim()), Vec::new()));
        }
        if ordinary.len() <= self.config.individual_threshold {
            for object in &ordinary {
                notes.push((format!("There is a {} ({}) here.", object.name, object.object_type), Vec::new()));
            }
        } else {
            let examples: Vec<String> = ordinary
                .iter()
                .take(AGGREGATE_EXAMPLES)
                .map(|o| format!("{} ({})", o.name, o.object_type))
                .collect();
            notes.push((
                format!("There are {} objects here, including {}.", ordinary.len(), examples.join(", ")),
                Vec::new(),
            ));
        }

        let (remarkable, ordinary): (Vec<_>, Vec<_>) =
            occupants.iter().partition(|o| !self.config.is_normal_status(&o.status));
        for occupant in remarkable {
            notes.push((
                format!("{} is {}.", occupant.name, occupant.status.trim()),
                occupant.agent_id.into_iter().collect(),
            ));
        }
        if ordinary.len() <= self.config.individual_threshold {
            for occupant in &ordinary {
                notes.push((format!("{} is here.", occupant.name), occupant.agent_id.into_iter().collect()));
            }
        } else {
            let names: Vec<&str> = ordinary.iter().take(AGGREGATE_EXAMPLES).map(|o| o.name.as_str()).collect();
            notes.push((
                format!("There are {} people here, including {}.", ordinary.len(), names.join(", ")),
                ordinary.iter().filter_map(|o| o.agent_id).collect(),
            ));
        }

        let mut observations = Vec::with_capacity(notes.len());
        for (text, agents) in notes {
            let metadata = Self::metadata_for(&location).with_agents(agents);
            observations.push(
                self.stream
                    .add_memory(character.id, text, MemoryKind::Observation, metadata)
                    .await?,
            );
        }

        info!(
            agent = %character.id,
            location = %location.name,
            observations = observations.len(),
            "Perceived environment"
        );
        Ok(Perception {
            location: Some(location),
            observations,
        })
    }

    fn is_self(occupant: &ForumOccupant, character: &Character) -> bool {
        match occupant.agent_id {
            Some(id) => id == character.id,
            None => occupant.name.eq_ignore_ascii_case(&character.name),
        }
    }

    fn locate(state: &ForumState, character: &Character) -> Option<ForumLocation> {
        let own = state
            .occupants
            .iter()
            .filter(|o| Self::is_self(o, character))
            .find_map(|o| state.locations.get(&o.location_id));
        own.or_else(|| state.locations.iter().find(|l| l.active_users > 0))
            .cloned()
    }

    fn metadata_for(location: &ForumLocation) -> MemoryMetadata {
        MemoryMetadata::at(location.name.clone())
            .with_extra(LOCATION_ID_KEY, serde_json::Value::String(location.id.clone()))
    }

    /// Pick a location for `activity` among those the character knows.
    ///
    /// Known locations are cached locations the character's memories refer
    /// to, by id or name; with none, every cached location. Returns `None`
    /// only when nothing is cached. An answer matching no location falls
    /// back to the first known one.
    ///
    /// # Errors
    /// Upstream and store failures.
    pub async fn select_location_for_activity(
        &self,
        character: &Character,
        activity: &str,
    ) -> Result<Option<ForumLocation>> {
        let known = self.known_locations(character.id)?;
        if known.is_empty() {
            return Ok(None);
        }

        let listing = known
            .iter()
            .map(|l| {
                if l.description.is_empty() {
                    format!("- {}", l.name)
                } else {
                    format!("- {}: {}", l.name, l.description)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = render_template(LOCATION_SELECTION, &[
            ("name", character.name.as_str()),
            ("activity", activity),
            ("locations", listing.as_str()),
        ]);
        let response = self.stream.generator().complete(&prompt).await?;

        let names: Vec<&str> = known.iter().map(|l| l.name.as_str()).collect();
        let choice = parse::parse_location_choice(&response, &names).unwrap_or_else(|| {
            debug!(response = %response.trim(), "Location answer matched nothing, using first known");
            0
        });
        Ok(known.into_iter().nth(choice))
    }

    /// Cached locations referenced by `agent`'s memories, or every cached
    /// location if none are.
    ///
    /// # Errors
    /// Store failures.
    pub fn known_locations(&self, agent: AgentId) -> Result<Vec<ForumLocation>> {
        let mut referenced: BTreeSet<String> = BTreeSet::new();
        for memory in self.stream.memories(agent)? {
            if let Some(location) = &memory.metadata.location {
                referenced.insert(location.to_lowercase());
            }
            if let Some(id) = memory.metadata.extra.get(LOCATION_ID_KEY).and_then(|v| v.as_str()) {
                referenced.insert(id.to_lowercase());
            }
        }

        let state = self.state.read();
        let known: Vec<ForumLocation> = state
            .locations
            .iter()
            .filter(|l| referenced.contains(&l.id.to_lowercase()) || referenced.contains(&l.name.to_lowercase()))
            .cloned()
            .collect();
        if known.is_empty() {
            return Ok(state.locations.iter().cloned().collect());
        }
        Ok(known)
    }

    /// Perform `action` on an object and ask the model for its new status.
    ///
    /// An unknown `object_id` yields `success: false` without touching the
    /// memory stream or the model.
    ///
    /// # Errors
    /// Upstream and store failures.
    pub async fn interact_with_object(
        &self,
        character: &Character,
        object_id: &str,
        action: &str,
    ) -> Result<InteractionOutcome> {
        let Some(object) = self.object(object_id) else {
            return Ok(InteractionOutcome {
                success: false,
                result: format!("There is no object '{object_id}' here."),
                new_status: None,
            });
        };

        let location = self.location(&object.location_id);
        let metadata = location.as_ref().map_or_else(MemoryMetadata::default, Self::metadata_for);
        self.stream
            .add_memory(
                character.id,
                format!("{} decided to {} the {}.", character.name, action, object.name),
                MemoryKind::Observation,
                metadata,
            )
            .await?;

        let prompt = render_template(OBJECT_INTERACTION, &[
            ("name", character.name.as_str()),
            ("action", action),
            ("object", object.name.as_str()),
            ("object_type", object.object_type.as_str()),
            ("status", object.status.as_str()),
        ]);
        let response = self.stream.generator().complete(&prompt).await?;
        let new_status = parse::first_line(&response);

        if self.config.write_back_object_status {
            if let Some(status) = &new_status {
                if let Some(cached) = self.state.write().objects.get_mut(object_id) {
                    cached.status.clone_from(status);
                }
            }
        }

        let result = match &new_status {
            Some(status) => format!("{} used the {}: it is now {}.", character.name, object.name, status),
            None => format!("{} used the {}.", character.name, object.name),
        };
        Ok(InteractionOutcome {
            success: true,
            result,
            new_status,
        })
    }

    /// Locations one step away: the parent, the children, and the siblings
    /// sharing a parent.
    #[must_use]
    pub fn adjacent_locations(&self, id: &str) -> Vec<ForumLocation> {
        let state = self.state.read();
        let Some(origin) = state.locations.get(id) else {
            return Vec::new();
        };
        state
            .locations
            .iter()
            .filter(|l| Self::linked(origin, l))
            .cloned()
            .collect()
    }

    fn linked(a: &ForumLocation, b: &ForumLocation) -> bool {
        if a.id == b.id {
            return false;
        }
        a.parent_id.as_deref() == Some(b.id.as_str())
            || b.parent_id.as_deref() == Some(a.id.as_str())
            || (a.parent_id.is_some() && a.parent_id == b.parent_id)
    }

    /// Whether two cached locations are one step apart.
    #[must_use]
    pub fn is_adjacent(&self, a: &str, b: &str) -> bool {
        let state = self.state.read();
        match (state.locations.get(a), state.locations.get(b)) {
            (Some(a), Some(b)) => Self::linked(a, b),
            _ => false,
        }
    }

    /// Location ids to walk from `start` to `end`, excluding `start`.
    ///
    /// Only depth-1 routes exist: `[]` when already there (or unreachable),
    /// `[end]` when adjacent, `[parent, end]` when `start`'s parent is
    /// adjacent to `end`.
    #[must_use]
    pub fn find_path(&self, start: &str, end: &str) -> Vec<String> {
        if start == end {
            return Vec::new();
        }
        if self.is_adjacent(start, end) {
            return vec![end.to_string()];
        }
        let parent = self.location(start).and_then(|l| l.parent_id);
        match parent {
            Some(parent) if self.is_adjacent(&parent, end) => vec![parent, end.to_string()],
            _ => Vec::new(),
        }
    }

    /// Where `agent` was at its last perception.
    #[must_use]
    pub fn current_location(&self, agent: AgentId) -> Option<ForumLocation> {
        let state = self.state.read();
        let id = state.current.get(&agent)?;
        state.locations.get(id).cloned()
    }

    /// Cached location by id.
    #[must_use]
    pub fn location(&self, id: &str) -> Option<ForumLocation> {
        self.state.read().locations.get(id).cloned()
    }

    /// All cached locations in source order.
    #[must_use]
    pub fn locations(&self) -> Vec<ForumLocation> {
        self.state.read().locations.iter().cloned().collect()
    }

    /// Cached object by id.
    #[must_use]
    pub fn object(&self, id: &str) -> Option<ForumObject> {
        self.state.read().objects.get(id).cloned()
    }

    /// Cached objects at a location, in source order.
    #[must_use]
    pub fn objects_at(&self, location_id: &str) -> Vec<ForumObject> {
        self.state
            .read()
            .objects
            .iter()
            .filter(|o| o.location_id == location_id)
            .cloned()
            .collect()
    }

    /// Occupants at a location, as of the last perception.
    #[must_use]
    pub fn occupants_at(&self, location_id: &str) -> Vec<ForumOccupant> {
        self.state
            .read()
            .occupants
            .iter()
            .filter(|o| o.location_id == location_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use reverie_core::{InMemoryStore, ManualClock};
    use reverie_llm::testing::{KeywordEmbedder, ScriptedGenerator};

    use super::*;
    use crate::source::StaticForumSource;
    use crate::types::ForumSnapshot;

    fn village() -> ForumSnapshot {
        ForumSnapshot {
            locations: vec![
                ForumLocation::new("village", "Village", "A small village"),
                ForumLocation::new("bakery", "Bakery", "Smells of bread").within("village"),
                ForumLocation::new("square", "Square", "").within("village"),
                ForumLocation::new("oven-room", "Oven Room", "").within("bakery"),
                ForumLocation::new("island", "Island", ""),
            ],
            objects: Vec::new(),
            occupants: Vec::new(),
        }
    }

    async fn loaded() -> Environment {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 2, 13, 9, 0, 0).unwrap()));
        let stream = Arc::new(MemoryStream::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(ScriptedGenerator::new("5")),
            Arc::new(KeywordEmbedder::default()),
            clock,
        ));
        let env = Environment::new(stream, Arc::new(StaticForumSource::new(village())), EnvironmentConfig::default());
        let nobody = Character::new("Nobody", "", 150);
        env.perceive_environment(&nobody).await.unwrap();
        env
    }

    fn ids(locations: &[ForumLocation]) -> Vec<&str> {
        locations.iter().map(|l| l.id.as_str()).collect()
    }

    #[tokio::test]
    async fn adjacency_covers_parent_children_and_siblings() {
        let env = loaded().await;
        assert_eq!(ids(&env.adjacent_locations("bakery")), ["village", "square", "oven-room"]);
        assert_eq!(ids(&env.adjacent_locations("village")), ["bakery", "square"]);
        assert!(env.adjacent_locations("island").is_empty());
        assert!(env.adjacent_locations("nowhere").is_empty());
        assert!(env.is_adjacent("square", "bakery"));
        assert!(!env.is_adjacent("square", "oven-room"));
        assert!(!env.is_adjacent("bakery", "bakery"));
    }

    #[tokio::test]
    async fn paths_are_at_most_two_steps() {
        let env = loaded().await;
        assert!(env.find_path("bakery", "bakery").is_empty());
        assert_eq!(env.find_path("bakery", "square"), ["square"]);
        assert_eq!(env.find_path("oven-room", "square"), ["bakery", "square"]);
        assert!(env.find_path("bakery", "island").is_empty());
    }

    #[tokio::test]
    async fn unperceived_agent_has_no_current_location() {
        let env = loaded().await;
        assert!(env.current_location(AgentId::new()).is_none());
        assert_eq!(env.locations().len(), 5);
    }
}
