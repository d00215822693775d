//! # Reverie Forum
//!
//! Connects a character's memory stream to a shared space of locations,
//! objects and occupants. A [`ForumSource`] supplies snapshots; an
//! [`Environment`] turns them into observations, chooses where activities
//! happen and applies object interactions.
//!
//! Locations form a shallow tree. Two locations are adjacent when one is
//! the other's parent or when they share a parent; routes are at most two
//! steps long.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod environment;
pub mod error;
pub mod source;
pub mod types;

pub use cache::{Keyed, KeyedCache};
pub use environment::Environment;
pub use error::{ForumError, Result};
pub use source::{ForumSource, StaticForumSource};
pub use types::{ForumLocation, ForumObject, ForumOccupant, ForumSnapshot, InteractionOutcome, Perception};
