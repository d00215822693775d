//! Integration tests: observation → reflection → planning flows, driven by
//! scripted services and a manual clock.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use reverie_core::cognition::{Character, CognitionOrchestrator};
use reverie_core::config::{CognitionConfig, PersistenceConfig};
use reverie_core::memory::{MemoryKind, MemoryMetadata, MemoryStream};
use reverie_core::planning::{Plan, PlanStatus, PlanningEngine};
use reverie_core::retrieval::RetrievalOptions;
use reverie_core::store::{InMemoryStore, MemoryStore, SqliteStore};
use reverie_core::{Clock, ManualClock};
use reverie_llm::testing::{KeywordEmbedder, ScriptedGenerator};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 13, 9, 0, 0).unwrap()
}

struct Harness {
    clock: Arc<ManualClock>,
    generator: Arc<ScriptedGenerator>,
    orchestrator: Arc<CognitionOrchestrator>,
    planning: PlanningEngine,
}

impl Harness {
    fn new(generator: ScriptedGenerator) -> Self {
        Self::with_store(generator, Arc::new(InMemoryStore::new()), CognitionConfig::default())
    }

    fn with_store(generator: ScriptedGenerator, store: Arc<dyn MemoryStore>, config: CognitionConfig) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let generator = Arc::new(generator);
        let stream = Arc::new(MemoryStream::new(
            store,
            generator.clone(),
            Arc::new(KeywordEmbedder::default()),
            clock.clone(),
        ));
        let orchestrator = Arc::new(CognitionOrchestrator::new(stream, &config));
        let planning = PlanningEngine::new(orchestrator.clone(), config.planning.clone());
        Self {
            clock,
            generator,
            orchestrator,
            planning,
        }
    }

    fn stream(&self) -> &Arc<MemoryStream> {
        self.orchestrator.stream()
    }
}

// ---------------------------------------------------------------------------
// Importance: rated, clamped, defaulted
// ---------------------------------------------------------------------------

#[tokio::test]
async fn garbage_rating_defaults_to_five() {
    let h = Harness::new(ScriptedGenerator::new("no idea").on("poignancy", "abc"));
    let mut mira = Character::new("Mira", "a baker", 150);
    let outcome = h
        .orchestrator
        .process_new_observation(&mut mira, "kneaded dough", MemoryMetadata::at("Bakery"))
        .await
        .unwrap();
    assert_eq!(outcome.memory.importance.value(), 5);
    assert_eq!(outcome.memory.metadata.location.as_deref(), Some("Bakery"));
}

// ---------------------------------------------------------------------------
// Retrieval: importance-only ordering and access refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn importance_only_retrieval_prefers_the_poignant_memory() {
    let h = Harness::new(ScriptedGenerator::new("5").on_sequence("poignancy", ["3", "9"]));
    let agent = Character::new("Mira", "a baker", 150).id;

    h.stream()
        .add_memory(agent, "X: swept the floor", MemoryKind::Observation, MemoryMetadata::default())
        .await
        .unwrap();
    h.clock.advance(Duration::hours(1));
    h.stream()
        .add_memory(agent, "Y: the oven caught fire", MemoryKind::Observation, MemoryMetadata::default())
        .await
        .unwrap();

    let out = h
        .stream()
        .retrieve_memories(agent, "kitchen", &RetrievalOptions::importance_only(10))
        .await
        .unwrap();
    let contents: Vec<_> = out.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["Y: the oven caught fire", "X: swept the floor"]);
}

#[tokio::test]
async fn retrieval_never_exceeds_limit_and_is_sorted() {
    let h = Harness::new(ScriptedGenerator::new("4"));
    let agent = Character::new("Mira", "a baker", 150).id;
    for i in 0..12 {
        h.stream()
            .add_memory(agent, format!("baked loaf number {i}"), MemoryKind::Observation, MemoryMetadata::default())
            .await
            .unwrap();
        h.clock.advance(Duration::minutes(30));
    }

    let scored = h
        .stream()
        .retrieve_scored(agent, "loaf", &RetrievalOptions::default().with_limit(5))
        .await
        .unwrap();
    assert_eq!(scored.len(), 5);
    assert!(scored.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(scored.iter().all(|s| s.memory.last_accessed == h.clock.now()));
}

// ---------------------------------------------------------------------------
// Reflection trigger through the orchestrator
// ---------------------------------------------------------------------------

#[tokio::test]
async fn threshold_ten_reflects_after_six_and_five() {
    let generator = ScriptedGenerator::new("")
        .on_sequence("poignancy", ["6", "5", "4"])
        .on("salient high-level questions", "What is Mira worried about?\nWho helps Mira?\nWhat is next?")
        .on("high-level insights", "Mira is anxious about the festival (because of 1, 2)")
        .on("topic tags", "festival, anxiety")
        .on("currently most focused", "the festival");
    let h = Harness::new(generator);
    let mut mira = Character::new("Mira", "a baker", 10);

    let first = h
        .orchestrator
        .process_new_observation(&mut mira, "the festival is in two days", MemoryMetadata::default())
        .await
        .unwrap();
    assert!(first.reflections.is_empty());

    h.clock.advance(Duration::minutes(5));
    let second = h
        .orchestrator
        .process_new_observation(&mut mira, "the flour delivery is late", MemoryMetadata::default())
        .await
        .unwrap();
    assert_eq!(second.reflections.len(), 3);
    assert_eq!(second.focus_topics, ["the festival"]);
    assert_eq!(second.reflections[0].metadata.topics, ["festival", "anxiety"]);
    assert!(mira.cognition.last_reflection_time.is_some());
    assert_eq!(h.generator.count_containing("salient high-level questions"), 1);
}

// ---------------------------------------------------------------------------
// Planning: two good lines + one bad line, then the state machine
// ---------------------------------------------------------------------------

const PLAN_REPLY: &str = "- 9:00 AM - Bake bread for the festival (Duration: 2 hours, Priority: 7, Location: Bakery)\n\
                          Mira will have a great day!\n\
                          - 11:00 AM - Deliver bread (Duration: 1 hours, Priority: 5)";

const BEHAVIOR_REPLY: &str = "- 0 - Mix the dough (Duration: 30 minutes)\n- 30 - Shape the loaves (Duration: 30 minutes)\n- 60 - Bake (Duration: 60 minutes)";

#[tokio::test]
async fn daily_plan_yields_two_pending_plans() {
    let h = Harness::new(ScriptedGenerator::new("4").on("Plan Mira's day", PLAN_REPLY));
    let mut mira = Character::new("Mira", "a baker", 150);

    let plans = h
        .planning
        .generate_daily_plan(&mut mira, t0().date_naive())
        .await
        .unwrap();
    assert_eq!(plans.len(), 2);
    assert!(plans.iter().all(|p| p.status == PlanStatus::Pending));
    assert_eq!(plans[0].end - plans[0].start, Duration::hours(2));
    assert_eq!(plans[1].end - plans[1].start, Duration::hours(1));
}

#[tokio::test]
async fn yesterday_is_synthesized_when_remembered() {
    let h = Harness::new(
        ScriptedGenerator::new("4")
            .on("Summarize what happened", "I sold every loaf.")
            .on("Plan Mira's day", PLAN_REPLY),
    );
    let mut mira = Character::new("Mira", "a baker", 150);
    h.stream()
        .add_memory(mira.id, "sold out of rye", MemoryKind::Observation, MemoryMetadata::default())
        .await
        .unwrap();

    let tomorrow = (t0() + Duration::days(1)).date_naive();
    h.planning.generate_daily_plan(&mut mira, tomorrow).await.unwrap();
    assert_eq!(h.generator.count_containing("Summarize what happened"), 1);
    let plan_prompt = h
        .generator
        .prompts()
        .into_iter()
        .find(|p| p.contains("Plan Mira's day"))
        .unwrap();
    assert!(plan_prompt.contains("Yesterday: I sold every loaf."));
}

#[tokio::test]
async fn plans_start_complete_and_respect_cancellation() {
    let h = Harness::new(
        ScriptedGenerator::new("4")
            .on("Plan Mira's day", PLAN_REPLY)
            .on("concrete behaviors", BEHAVIOR_REPLY),
    );
    let mut mira = Character::new("Mira", "a baker", 150);

    // 09:00: no schedule yet, so the day is planned and the bake starts.
    let tick = h.planning.check_and_update_plans(&mut mira, t0()).await.unwrap();
    assert!(tick.generated_daily_plan);
    let active = tick.active.unwrap();
    assert_eq!(active.description, "Bake bread for the festival");
    assert_eq!(active.status, PlanStatus::InProgress);
    assert_eq!(active.sub_plans.len(), 3);
    assert_eq!(tick.current_behavior.unwrap().description, "Mix the dough");

    // 10:15: same plan, later behavior, no replanning.
    let tick = h
        .planning
        .check_and_update_plans(&mut mira, t0() + Duration::minutes(75))
        .await
        .unwrap();
    assert!(!tick.generated_daily_plan);
    assert_eq!(tick.current_behavior.unwrap().description, "Bake");

    // 11:00: the bake completes, the delivery starts.
    let tick = h
        .planning
        .check_and_update_plans(&mut mira, t0() + Duration::hours(2))
        .await
        .unwrap();
    assert_eq!(tick.completed.len(), 1);
    assert_eq!(tick.completed[0].status, PlanStatus::Completed);
    let delivery = tick.active.unwrap();
    assert_eq!(delivery.description, "Deliver bread");
    assert_eq!(delivery.status, PlanStatus::InProgress);
    let completions = h
        .stream()
        .memories(mira.id)
        .unwrap()
        .into_iter()
        .filter(|m| m.content == "Completed: Bake bread for the festival")
        .count();
    assert_eq!(completions, 1);

    // Cancel the delivery; later ticks never touch it.
    h.planning.cancel_plan(mira.id, delivery.id).await.unwrap();
    let tick = h
        .planning
        .check_and_update_plans(&mut mira, t0() + Duration::hours(3))
        .await
        .unwrap();
    assert!(tick.completed.is_empty());
    assert!(tick.active.is_none());
    let schedule = h.planning.schedule(mira.id);
    assert_eq!(schedule[0].status, PlanStatus::Completed);
    assert_eq!(schedule[1].status, PlanStatus::Cancelled);
}

#[tokio::test]
async fn higher_priority_wins_overlaps() {
    let h = Harness::new(ScriptedGenerator::new("4").on("concrete behaviors", BEHAVIOR_REPLY));
    let mut mira = Character::new("Mira", "a baker", 150);
    mira.cognition.last_planning_time = Some(t0());

    let low = Plan::new("Tidy the shelves", t0(), t0() + Duration::hours(2), 3);
    let high = Plan::new("Answer the door", t0(), t0() + Duration::hours(1), 9);
    h.planning.adopt_plans(mira.id, vec![low, high]);

    let tick = h.planning.check_and_update_plans(&mut mira, t0()).await.unwrap();
    assert!(!tick.generated_daily_plan);
    assert_eq!(tick.active.unwrap().description, "Answer the door");
    let pending = h
        .planning
        .schedule(mira.id)
        .into_iter()
        .filter(|p| p.status == PlanStatus::Pending)
        .count();
    assert_eq!(pending, 1);
}

// ---------------------------------------------------------------------------
// Persistence: a SQLite-backed stream survives a restart
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sqlite_backed_schedule_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reverie.db");
    let persistence = PersistenceConfig::default();
    let mut mira = Character::new("Mira", "a baker", 150);

    {
        let store = Arc::new(SqliteStore::open(&path, &persistence).unwrap());
        let h = Harness::with_store(
            ScriptedGenerator::new("4").on("Plan Mira's day", PLAN_REPLY),
            store,
            CognitionConfig::default(),
        );
        h.planning
            .generate_daily_plan(&mut mira, t0().date_naive())
            .await
            .unwrap();
    }

    let store = Arc::new(SqliteStore::open(&path, &persistence).unwrap());
    let h = Harness::with_store(ScriptedGenerator::new("4"), store, CognitionConfig::default());
    assert_eq!(h.stream().partition_len(mira.id).unwrap(), 2);
    let restored = h.planning.restore_schedule(&mira, t0()).unwrap();
    assert_eq!(restored, 2);
    assert_eq!(h.planning.schedule(mira.id)[1].description, "Deliver bread");
}
