//! Property-based tests for the pure parts of the core: importance
//! clamping, retrieval ordering, recency decay, and the line grammars,
//! plus the planner fed with arbitrary numbers.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

use reverie_core::config::RetrievalWeights;
use reverie_core::memory::{MemoryKind, MemoryRecord};
use reverie_core::parse;
use reverie_core::retrieval::scoring::recency;
use reverie_core::retrieval::{RetrievalOptions, rank};
use reverie_core::types::{Embedding, Importance};
use reverie_core::{Character, CognitionConfig, CognitionOrchestrator, InMemoryStore, ManualClock, MemoryStream, Plan, PlanningEngine};
use reverie_llm::testing::{KeywordEmbedder, ScriptedGenerator};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 13, 0, 0, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_record() -> impl Strategy<Value = MemoryRecord> {
    (
        -20i64..30,
        0i64..500,
        prop::collection::vec(-1.0f32..1.0, 0..6),
        prop::sample::select(vec![MemoryKind::Observation, MemoryKind::Reflection, MemoryKind::Plan]),
    )
        .prop_map(|(importance, minutes_ago, vector, kind)| {
            let created = t0() - Duration::minutes(minutes_ago);
            MemoryRecord::new("m", kind, Importance::new(importance), created).with_embedding(vector)
        })
}

fn arb_weights() -> impl Strategy<Value = RetrievalWeights> {
    (0.0..3.0f64, 0.0..3.0f64, 0.0..3.0f64).prop_map(|(recency, relevance, importance)| RetrievalWeights {
        recency,
        relevance,
        importance,
    })
}

// ---------------------------------------------------------------------------
// Importance is always in [1, 10]
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn importance_always_clamped(value in any::<i64>()) {
        let imp = Importance::new(value);
        prop_assert!((1..=10).contains(&imp.value()));
    }

    #[test]
    fn parsed_importance_always_clamped(text in ".{0,40}") {
        if let Some(imp) = parse::parse_importance(&text) {
            prop_assert!((1..=10).contains(&imp.value()));
        }
    }
}

// ---------------------------------------------------------------------------
// Retrieval: bounded, sorted, ties in insertion order
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn rank_is_bounded_and_sorted(
        memories in prop::collection::vec(arb_record(), 0..40),
        query in prop::collection::vec(-1.0f32..1.0, 0..6),
        weights in arb_weights(),
        limit in 0usize..30,
    ) {
        let options = RetrievalOptions { limit, weights, filter_kinds: None };
        let query = Embedding(query);
        let out = rank(&memories, Some(&query), t0(), &options);

        prop_assert!(out.len() <= limit);
        prop_assert!(out.len() <= memories.len());
        for pair in out.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
            prop_assert!(!pair[0].score.is_nan());
            if (pair[0].score - pair[1].score).abs() == 0.0 {
                let first = memories.iter().position(|m| m.id == pair[0].memory.id);
                let second = memories.iter().position(|m| m.id == pair[1].memory.id);
                prop_assert!(first < second);
            }
        }
    }

    #[test]
    fn cosine_is_bounded(
        a in prop::collection::vec(-10.0f32..10.0, 0..8),
        b in prop::collection::vec(-10.0f32..10.0, 0..8),
    ) {
        let sim = Embedding(a).cosine_similarity(&Embedding(b));
        prop_assert!(!sim.is_nan());
        prop_assert!((-1.001..=1.001).contains(&sim));
    }
}

// ---------------------------------------------------------------------------
// Recency is strictly decreasing
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn recency_strictly_decreasing(h in 0.0..10_000.0f64, dh in 0.01..100.0f64) {
        prop_assert!(recency(h + dh) < recency(h));
        prop_assert!(recency(h) <= 1.0);
        prop_assert!(recency(h) > 0.0);
    }
}

// ---------------------------------------------------------------------------
// Grammar parsers never panic and respect their bounds
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn parsers_never_panic(text in "(?s).{0,200}") {
        let day = NaiveDate::from_ymd_opt(2024, 2, 14).unwrap();
        let _ = parse::parse_plan(&text, day);
        let _ = parse::parse_behaviors(&text);
        let _ = parse::parse_location_choice(&text, &["Library", "Park"]);
        prop_assert_eq!(parse::parse_questions(&text, 3).len(), 3);
        prop_assert!(parse::parse_list_lines(&text, 5).len() <= 5);
        for insight in parse::parse_insights(&text, 4) {
            prop_assert!(insight.citations.iter().all(|&i| i < 4));
        }
    }

    #[test]
    fn well_formed_plan_lines_parse(
        hour in 1u32..=12,
        pm in any::<bool>(),
        half_hours in 1u32..12,
        priority in 1u8..=10,
    ) {
        let day = NaiveDate::from_ymd_opt(2024, 2, 14).unwrap();
        let line = format!(
            "- {hour}:00 {} - Do something (Duration: {}.{} hours, Priority: {priority})",
            if pm { "PM" } else { "AM" },
            half_hours / 2,
            if half_hours % 2 == 1 { 5 } else { 0 },
        );
        let parsed = parse::parse_plan_line(&line, day);
        prop_assert!(parsed.is_some());
        let parsed = parsed.unwrap();
        prop_assert_eq!(parsed.duration, Duration::minutes(i64::from(half_hours) * 30));
        prop_assert_eq!(parsed.priority, priority);
    }
}

// ---------------------------------------------------------------------------
// The planner drops out-of-range numbers instead of panicking
// ---------------------------------------------------------------------------

fn planner(generator: ScriptedGenerator) -> PlanningEngine {
    let stream = Arc::new(MemoryStream::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(generator),
        Arc::new(KeywordEmbedder::default()),
        Arc::new(ManualClock::new(t0())),
    ));
    let config = CognitionConfig::default();
    let orchestrator = Arc::new(CognitionOrchestrator::new(stream, &config));
    PlanningEngine::new(orchestrator, config.planning)
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn daily_plan_survives_any_numbers(
        hour in any::<u64>(),
        hours in any::<u64>(),
        fraction in any::<u32>(),
        priority in any::<i64>(),
    ) {
        let reply = format!(
            "- {hour}:00 - Wander (Duration: {hours}.{fraction} hours, Priority: {priority})\n\
             - 9:00 AM - Open the shop (Duration: 1 hours, Priority: 5)"
        );
        let engine = planner(ScriptedGenerator::new("3").on("Plan Mira's day", reply));
        let mut mira = Character::new("Mira", "a baker", 150);

        let plans = block_on(engine.generate_daily_plan(&mut mira, t0().date_naive())).unwrap();
        prop_assert!(plans.iter().any(|p| p.description == "Open the shop"));
        for plan in &plans {
            prop_assert!(plan.end > plan.start);
            prop_assert!(plan.end - plan.start <= Duration::hours(24));
            prop_assert!((1..=10).contains(&plan.priority));
        }
    }

    #[test]
    fn decomposition_survives_any_numbers(
        offset in any::<u64>(),
        minutes in any::<u64>(),
    ) {
        let reply = format!(
            "- {offset} - Wander (Duration: {minutes} minutes)\n\
             - 0 - Unlock the door (Duration: 10 minutes)"
        );
        let engine = planner(ScriptedGenerator::new("3").on("concrete behaviors", reply));
        let mira = Character::new("Mira", "a baker", 150);
        let plan = Plan::new("Open the shop", t0() + Duration::hours(9), t0() + Duration::hours(10), 5);

        let behaviors = block_on(engine.decompose_into_behaviors(&mira, &plan)).unwrap();
        prop_assert!(behaviors.iter().any(|b| b.description == "Unlock the door"));
        for behavior in &behaviors {
            prop_assert!(behavior.start >= plan.start && behavior.start < plan.end);
            prop_assert!(behavior.end > behavior.start && behavior.end <= plan.end);
        }
    }
}
