//! Daily planning, behavior decomposition and the per-agent schedule.
//!
//! The schedule for each agent lives in memory here; top-level plans are
//! also persisted as `Plan` memories so [`PlanningEngine::restore_schedule`]
//! can rebuild it after a restart.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use reverie_llm::prompt::{BEHAVIOR_DECOMPOSITION, DAILY_PLAN, DAY_SYNTHESIS, render_template};
use tracing::{debug, info};

use super::{Plan, PlanId, PlanStatus, PlanTick};
use crate::clock::start_of_day;
use crate::cognition::{Character, CognitionOrchestrator, bulleted};
use crate::config::PlanningConfig;
use crate::error::{CognitionError, Result};
use crate::memory::{MemoryKind, MemoryMetadata, MemoryStream};
use crate::parse;
use crate::retrieval::RetrievalOptions;
use crate::types::AgentId;

const NO_YESTERDAY: &str = "Nothing notable is remembered from yesterday.";

/// Generates, decomposes and advances plans.
#[derive(Debug)]
pub struct PlanningEngine {
    orchestrator: Arc<CognitionOrchestrator>,
    config: PlanningConfig,
    schedules: DashMap<AgentId, Vec<Plan>>,
}

impl PlanningEngine {
    /// Create an engine that asks `orchestrator` for character summaries.
    #[must_use]
    pub fn new(orchestrator: Arc<CognitionOrchestrator>, config: PlanningConfig) -> Self {
        Self {
            orchestrator,
            config,
            schedules: DashMap::new(),
        }
    }

    fn stream(&self) -> &Arc<MemoryStream> {
        self.orchestrator.stream()
    }

    /// Plan `character`'s day and make it the agent's schedule.
    ///
    /// # Errors
    /// Upstream and store failures. Nothing is scheduled on failure.
    pub async fn generate_daily_plan(&self, character: &mut Character, date: NaiveDate) -> Result<Vec<Plan>> {
        let agent = character.id;
        let summary = self.orchestrator.get_character_summary(character).await?;
        let yesterday = self.synthesize_previous_day(character, date).await?;

        let date_label = date.format("%A, %B %-d, %Y").to_string();
        let prompt = render_template(DAILY_PLAN, &[
            ("summary", summary.as_str()),
            ("yesterday", yesterday.as_str()),
            ("date", date_label.as_str()),
            ("name", character.name.as_str()),
        ]);
        let response = self.stream().generator().complete(&prompt).await?;

        let mut plans: Vec<Plan> = parse::parse_plan(&response, date)
            .into_iter()
            .map(|line| {
                Plan::new(line.description, line.start, line.end, line.priority)
                    .with_location(line.location)
            })
            .collect();
        plans.sort_by_key(|p| p.start);

        for plan in &plans {
            self.persist(character, plan, None).await?;
        }

        self.schedules.insert(agent, plans.clone());
        character.cognition.last_planning_time = Some(self.stream().now());
        info!(agent = %agent, %date, plans = plans.len(), "Daily plan generated");
        Ok(plans)
    }

    async fn synthesize_previous_day(&self, character: &Character, date: NaiveDate) -> Result<String> {
        let Some(previous) = date.pred_opt() else {
            return Ok(NO_YESTERDAY.to_string());
        };
        let from = previous.and_time(chrono::NaiveTime::MIN).and_utc();
        let to = date.and_time(chrono::NaiveTime::MIN).and_utc();
        let memories = self.stream().memories_between(character.id, from, to)?;
        if memories.is_empty() {
            return Ok(NO_YESTERDAY.to_string());
        }

        let previous_label = previous.format("%A, %B %-d, %Y").to_string();
        let prompt = render_template(DAY_SYNTHESIS, &[
            ("name", character.name.as_str()),
            ("date", previous_label.as_str()),
            ("memories", bulleted(&memories).as_str()),
        ]);
        Ok(self.stream().generator().complete(&prompt).await?.trim().to_string())
    }

    async fn persist(&self, character: &Character, plan: &Plan, parent: Option<PlanId>) -> Result<()> {
        let content = format!(
            "{} plans to {} from {} to {}",
            character.name,
            plan.description,
            plan.start.format("%H:%M"),
            plan.end.format("%H:%M"),
        );
        self.persist_record(character.id, content, plan, parent).await
    }

    /// Write `plan` as it is now. The newest record per plan id is the one
    /// [`Self::restore_schedule`] keeps.
    async fn persist_record(&self, agent: AgentId, content: String, plan: &Plan, parent: Option<PlanId>) -> Result<()> {
        let mut metadata = MemoryMetadata {
            location: plan.location.clone(),
            plan: Some(plan.metadata(parent)),
            ..MemoryMetadata::default()
        };
        metadata
            .extra
            .insert("description".into(), serde_json::Value::String(plan.description.clone()));
        self.stream()
            .add_memory(agent, content, MemoryKind::Plan, metadata)
            .await?;
        Ok(())
    }

    /// Break `plan` into minute-scale behaviors inside its window. If `plan`
    /// is in the agent's schedule, the behaviors are attached to it there.
    ///
    /// # Errors
    /// Upstream and store failures.
    pub async fn decompose_into_behaviors(&self, character: &Character, plan: &Plan) -> Result<Vec<Plan>> {
        let memories = self
            .stream()
            .retrieve_memories(
                character.id,
                &plan.description,
                &RetrievalOptions::default().with_limit(self.config.decomposition_context),
            )
            .await?;

        let duration_minutes = plan.duration().num_minutes().to_string();
        let location = plan.location.as_ref().map_or_else(String::new, |l| format!(" at {l}"));
        let start = plan.start.format("%H:%M").to_string();
        let end = plan.end.format("%H:%M").to_string();
        let prompt = render_template(BEHAVIOR_DECOMPOSITION, &[
            ("name", character.name.as_str()),
            ("plan", plan.description.as_str()),
            ("start", start.as_str()),
            ("end", end.as_str()),
            ("duration_minutes", duration_minutes.as_str()),
            ("location", location.as_str()),
            ("memories", bulleted(&memories).as_str()),
        ]);
        let response = self.stream().generator().complete(&prompt).await?;

        let window = plan.duration().num_minutes();
        let behaviors: Vec<Plan> = parse::parse_behaviors(&response)
            .into_iter()
            .filter_map(|b| {
                let Some((start, end)) = behavior_window(plan.start, window, &b) else {
                    debug!(offset = b.offset_minutes, duration = b.duration_minutes, "Dropped behavior outside its plan");
                    return None;
                };
                Some(Plan::new(b.description, start, end, plan.priority).with_location(plan.location.clone()))
            })
            .collect();
        let behaviors = plan.fit_sub_plans(behaviors);

        if self.config.persist_sub_plans {
            for behavior in &behaviors {
                self.persist(character, behavior, Some(plan.id)).await?;
            }
        }

        if let Some(mut schedule) = self.schedules.get_mut(&character.id) {
            if let Some(scheduled) = schedule.iter_mut().find(|p| p.id == plan.id) {
                scheduled.sub_plans = behaviors.clone();
            }
        }
        debug!(plan = %plan.id, behaviors = behaviors.len(), "Plan decomposed");
        Ok(behaviors)
    }

    /// Advance the agent's schedule to `now`.
    ///
    /// In-progress plans whose window has ended are completed first (each
    /// leaves a "Completed: …" observation). Then the highest-priority plan
    /// whose window contains `now` becomes active: it is decomposed if it
    /// has no behaviors yet and moved to `InProgress`. With no active plan
    /// and no plan generated today, a daily plan is generated once.
    ///
    /// # Errors
    /// Upstream and store failures.
    pub async fn check_and_update_plans(&self, character: &mut Character, now: DateTime<Utc>) -> Result<PlanTick> {
        let agent = character.id;
        let mut tick = PlanTick::default();

        {
            let mut schedule = self.schedules.entry(agent).or_default();
            for plan in schedule
                .iter_mut()
                .filter(|p| p.status == PlanStatus::InProgress && now >= p.end)
            {
                plan.transition(PlanStatus::Completed)?;
                tick.completed.push(plan.clone());
            }
        }
        for plan in &tick.completed {
            info!(agent = %agent, plan = %plan.id, "Plan completed");
            let metadata = MemoryMetadata {
                location: plan.location.clone(),
                ..MemoryMetadata::default()
            };
            self.stream()
                .add_memory(agent, format!("Completed: {}", plan.description), MemoryKind::Observation, metadata)
                .await?;
        }

        let mut active = self.select_active(agent, now);
        let planned_today = character
            .cognition
            .last_planning_time
            .is_some_and(|t| t >= start_of_day(now));
        if active.is_none() && !planned_today {
            self.generate_daily_plan(character, now.date_naive()).await?;
            tick.generated_daily_plan = true;
            active = self.select_active(agent, now);
        }

        let Some(mut plan) = active else {
            return Ok(tick);
        };
        if plan.sub_plans.is_empty() {
            plan.sub_plans = self.decompose_into_behaviors(character, &plan).await?;
        }
        if plan.status == PlanStatus::Pending {
            plan.transition(PlanStatus::InProgress)?;
            self.update(agent, plan.id, |p| p.transition(PlanStatus::InProgress))?;
            info!(agent = %agent, plan = %plan.id, description = %plan.description, "Plan started");
        }

        tick.current_behavior = plan.current_behavior(now).cloned();
        tick.active = Some(plan);
        Ok(tick)
    }

    fn select_active(&self, agent: AgentId, now: DateTime<Utc>) -> Option<Plan> {
        let schedule = self.schedules.get(&agent)?;
        let best = schedule
            .iter()
            .filter(|p| p.contains(now) && !p.status.is_terminal())
            .fold(None::<&Plan>, |best, p| match best {
                Some(b) if b.priority >= p.priority => Some(b),
                _ => Some(p),
            })
            .cloned();
        best
    }

    fn update<F>(&self, agent: AgentId, plan_id: PlanId, f: F) -> Result<Plan>
    where
        F: FnOnce(&mut Plan) -> Result<()>,
    {
        let mut schedule = self
            .schedules
            .get_mut(&agent)
            .ok_or(CognitionError::PlanNotFound(plan_id))?;
        let plan = schedule
            .iter_mut()
            .find(|p| p.id == plan_id)
            .ok_or(CognitionError::PlanNotFound(plan_id))?;
        f(plan)?;
        Ok(plan.clone())
    }

    /// The agent's current schedule, in start order.
    #[must_use]
    pub fn schedule(&self, agent: AgentId) -> Vec<Plan> {
        self.schedules.get(&agent).map(|s| s.value().clone()).unwrap_or_default()
    }

    /// Replace the agent's schedule with externally built plans.
    pub fn adopt_plans(&self, agent: AgentId, mut plans: Vec<Plan>) {
        plans.sort_by_key(|p| p.start);
        self.schedules.insert(agent, plans);
    }

    /// Cancel an in-progress plan and record the cancellation, so a
    /// restored schedule keeps it cancelled.
    ///
    /// # Errors
    /// [`CognitionError::PlanNotFound`] if the plan is not scheduled,
    /// [`CognitionError::IllegalTransition`] unless it is in progress, and
    /// upstream or store failures while recording.
    pub async fn cancel_plan(&self, agent: AgentId, plan_id: PlanId) -> Result<Plan> {
        let plan = self.update(agent, plan_id, |p| p.transition(PlanStatus::Cancelled))?;
        info!(agent = %agent, plan = %plan_id, "Plan cancelled");
        self.persist_record(agent, format!("Cancelled: {}", plan.description), &plan, None)
            .await?;
        Ok(plan)
    }

    /// Rebuild the agent's schedule from persisted plan memories whose
    /// window has not ended by `now`. When a plan was written more than
    /// once, its newest record wins. Returns the number of top-level plans
    /// restored.
    ///
    /// # Errors
    /// Store failures.
    pub fn restore_schedule(&self, character: &Character, now: DateTime<Utc>) -> Result<usize> {
        let records = self.stream().memories(character.id)?;
        let mut top: Vec<Plan> = Vec::new();
        let mut children: Vec<(PlanId, Plan)> = Vec::new();

        for record in &records {
            let (Some(plan), Some(meta)) = (Plan::from_record(record), record.metadata.plan.as_ref()) else {
                continue;
            };
            if plan.end <= now {
                continue;
            }
            match meta.parent {
                Some(parent) => children.push((parent, plan)),
                None => {
                    top.retain(|p| p.id != plan.id);
                    top.push(plan);
                }
            }
        }
        for (parent, child) in children {
            if let Some(p) = top.iter_mut().find(|p| p.id == parent) {
                p.sub_plans.push(child);
            }
        }

        let restored = top.len();
        self.adopt_plans(character.id, top);
        debug!(agent = %character.id, restored, "Schedule restored");
        Ok(restored)
    }
}

/// Absolute window of a behavior starting `offset` minutes into a plan
/// `window` minutes long. The end is capped at the plan's end later, so a
/// duration longer than the plan is clamped rather than computed.
fn behavior_window(
    plan_start: DateTime<Utc>,
    window: i64,
    behavior: &parse::BehaviorLine,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    if behavior.offset_minutes < 0 || behavior.offset_minutes >= window {
        return None;
    }
    let start = plan_start.checked_add_signed(Duration::try_minutes(behavior.offset_minutes)?)?;
    let minutes = behavior.duration_minutes.min(window - behavior.offset_minutes);
    let end = start.checked_add_signed(Duration::try_minutes(minutes)?)?;
    Some((start, end))
}
