//! Insertion-ordered, last-write-wins caches keyed by entity id.

use std::collections::HashMap;

use crate::types::{ForumLocation, ForumObject};

/// Something with a stable string id.
pub trait Keyed {
    /// The id.
    fn key(&self) -> &str;
}

impl Keyed for ForumLocation {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for ForumObject {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Map from id to entity that iterates in first-insertion order. Writing an
/// existing id replaces the value in place.
#[derive(Debug, Clone)]
pub struct KeyedCache<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for KeyedCache<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Keyed> KeyedCache<T> {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by id.
    pub fn upsert(&mut self, item: T) {
        match self.index.get(item.key()) {
            Some(&i) => self.items[i] = item,
            None => {
                self.index.insert(item.key().to_string(), self.items.len());
                self.items.push(item);
            }
        }
    }

    /// Drop everything and load `items`.
    pub fn replace_all(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.clear();
        self.index.clear();
        for item in items {
            self.upsert(item);
        }
    }

    /// Look up by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    /// Mutable lookup by id.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.index.get(id).map(|&i| &mut self.items[i])
    }

    /// Entities in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` when empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
