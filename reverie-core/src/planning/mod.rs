//! Plans, their state machine, and the per-agent schedule engine.
//!
//! ```text
//! Pending ──▶ InProgress ──▶ Completed
//!                  │
//!                  └───────▶ Cancelled
//! ```
//!
//! Every other edge is rejected with [`CognitionError::IllegalTransition`].

pub mod engine;

pub use engine::PlanningEngine;

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CognitionError, Result};
use crate::memory::{MemoryKind, MemoryRecord, PlanMetadata};

/// Unique identifier for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlanId(pub Uuid);

impl PlanId {
    /// Create a new random plan ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Scheduled, not started.
    Pending,
    /// Currently being carried out.
    InProgress,
    /// Finished.
    Completed,
    /// Abandoned while in progress.
    Cancelled,
}

impl PlanStatus {
    /// Whether `self → next` is a legal edge.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Cancelled)
        )
    }

    /// `Completed` or `Cancelled`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// A scheduled activity with a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Identity.
    pub id: PlanId,
    /// What the character intends to do.
    pub description: String,
    /// Window start (inclusive).
    pub start: DateTime<Utc>,
    /// Window end (exclusive).
    pub end: DateTime<Utc>,
    /// Where it happens.
    pub location: Option<String>,
    /// Priority in `[1, 10]`.
    pub priority: u8,
    /// Lifecycle state.
    pub status: PlanStatus,
    /// Minute-scale behaviors, each inside this plan's window.
    pub sub_plans: Vec<Plan>,
}

impl Plan {
    /// A pending plan. Priority is clamped into `[1, 10]`.
    #[must_use]
    pub fn new(
        description: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        priority: u8,
    ) -> Self {
        Self {
            id: PlanId::new(),
            description: description.into(),
            start,
            end,
            location: None,
            priority: priority.clamp(1, 10),
            status: PlanStatus::Pending,
            sub_plans: Vec::new(),
        }
    }

    /// Set the location.
    #[must_use]
    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    /// Length of the window.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// `start ≤ at < end`.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// Move to `to`, or fail if the edge is illegal.
    ///
    /// # Errors
    /// [`CognitionError::IllegalTransition`]; the plan is left unchanged.
    pub fn transition(&mut self, to: PlanStatus) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(CognitionError::IllegalTransition {
                plan: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// The sub-plan whose window contains `at`.
    #[must_use]
    pub fn current_behavior(&self, at: DateTime<Utc>) -> Option<&Plan> {
        self.sub_plans.iter().find(|p| p.contains(at))
    }

    /// Fit `behaviors` inside this plan's window and store them: ones that
    /// start at or after the end are dropped, ends are clamped.
    pub fn set_sub_plans(&mut self, behaviors: Vec<Plan>) {
        self.sub_plans = self.fit_sub_plans(behaviors);
    }

    pub(crate) fn fit_sub_plans(&self, behaviors: Vec<Plan>) -> Vec<Plan> {
        behaviors
            .into_iter()
            .filter(|b| b.start >= self.start && b.start < self.end)
            .map(|mut b| {
                b.end = b.end.min(self.end);
                b
            })
            .collect()
    }

    /// Plan fields for a persisted record.
    #[must_use]
    pub fn metadata(&self, parent: Option<PlanId>) -> PlanMetadata {
        PlanMetadata {
            plan_id: self.id,
            start: self.start,
            end: self.end,
            location: self.location.clone(),
            priority: self.priority,
            status: self.status,
            parent,
        }
    }

    /// Rebuild a plan from a `Plan`-kind record. Sub-plans are not attached.
    #[must_use]
    pub fn from_record(record: &MemoryRecord) -> Option<Self> {
        if record.kind != MemoryKind::Plan {
            return None;
        }
        let meta = record.metadata.plan.as_ref()?;
        let description = record
            .metadata
            .extra
            .get("description")
            .and_then(|v| v.as_str())
            .map_or_else(|| record.content.clone(), ToString::to_string);
        Some(Self {
            id: meta.plan_id,
            description,
            start: meta.start,
            end: meta.end,
            location: meta.location.clone(),
            priority: meta.priority.clamp(1, 10),
            status: meta.status,
            sub_plans: Vec::new(),
        })
    }
}

/// What one call to [`PlanningEngine::check_and_update_plans`] did.
#[derive(Debug, Clone, Default)]
pub struct PlanTick {
    /// The highest-priority plan whose window contains now.
    pub active: Option<Plan>,
    /// The active plan's sub-plan containing now.
    pub current_behavior: Option<Plan>,
    /// Plans that moved to `Completed` during this call.
    pub completed: Vec<Plan>,
    /// Whether a daily plan was generated during this call.
    pub generated_daily_plan: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 14, h, m, 0).unwrap()
    }

    #[test]
    fn legal_edges_only() {
        use PlanStatus::*;
        let all = [Pending, InProgress, Completed, Cancelled];
        let legal: Vec<_> = all
            .iter()
            .flat_map(|a| all.iter().map(move |b| (*a, *b)))
            .filter(|(a, b)| a.can_transition_to(*b))
            .collect();
        assert_eq!(legal, [(Pending, InProgress), (InProgress, Completed), (InProgress, Cancelled)]);
    }

    #[test]
    fn illegal_transition_is_typed_and_harmless() {
        let mut plan = Plan::new("paint", at(9, 0), at(10, 0), 5);
        let err = plan.transition(PlanStatus::Completed).unwrap_err();
        assert!(matches!(
            err,
            CognitionError::IllegalTransition { from: PlanStatus::Pending, to: PlanStatus::Completed, .. }
        ));
        assert_eq!(plan.status, PlanStatus::Pending);
        plan.transition(PlanStatus::InProgress).unwrap();
        plan.transition(PlanStatus::Cancelled).unwrap();
        assert!(plan.status.is_terminal());
    }

    #[test]
    fn sub_plans_are_fitted_into_parent() {
        let mut parent = Plan::new("bake", at(9, 0), at(10, 0), 6);
        parent.set_sub_plans(vec![
            Plan::new("mix", at(9, 0), at(9, 20), 6),
            Plan::new("bake", at(9, 40), at(10, 30), 6),
            Plan::new("serve", at(10, 0), at(10, 10), 6),
        ]);
        assert_eq!(parent.sub_plans.len(), 2);
        assert_eq!(parent.sub_plans[1].end, at(10, 0));
        assert_eq!(parent.current_behavior(at(9, 45)).map(|p| p.description.as_str()), Some("bake"));
        assert!(parent.current_behavior(at(9, 30)).is_none());
    }

    #[test]
    fn priority_is_clamped() {
        assert_eq!(Plan::new("x", at(1, 0), at(2, 0), 0).priority, 1);
        assert_eq!(Plan::new("x", at(1, 0), at(2, 0), 40).priority, 10);
    }
}
