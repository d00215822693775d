//! Reverie benchmark suite.
//!
//! Targets on a laptop-class core:
//!   rank_top20_from_200 ........ < 200μs
//!   rank_top20_from_1000 ....... < 1ms
//!   parse_daily_plan_12_lines .. < 50μs

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use reverie_core::parse;
use reverie_core::retrieval::{rank, RetrievalOptions};
use reverie_core::{Embedding, Importance, MemoryKind, MemoryRecord};

const DIMENSIONS: usize = 64;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 14, 12, 0, 0).single().unwrap_or_default()
}

fn make_record(i: usize) -> MemoryRecord {
    let kind = if i % 7 == 0 { MemoryKind::Reflection } else { MemoryKind::Observation };
    let created = now() - Duration::minutes(i64::try_from(i).unwrap_or(0) * 13);
    let vector: Vec<f32> = (0..DIMENSIONS)
        .map(|d| ((i * 31 + d * 17) % 97) as f32 / 97.0)
        .collect();
    MemoryRecord::new(
        format!("Event number {i} happened in the town square"),
        kind,
        Importance::new((i % 10) as i64 + 1),
        created,
    )
    .with_embedding(vector)
}

fn bench_rank(c: &mut Criterion) {
    let query = Embedding((0..DIMENSIONS).map(|d| (d as f32 / DIMENSIONS as f32).sin()).collect());
    let options = RetrievalOptions::default();

    let mut group = c.benchmark_group("rank_top20");
    for size in [200_usize, 1000] {
        let memories: Vec<MemoryRecord> = (0..size).map(make_record).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &memories, |b, memories| {
            b.iter(|| {
                let results = rank(black_box(memories), Some(black_box(&query)), now(), &options);
                black_box(results);
            });
        });
    }
    group.finish();
}

fn bench_rank_filtered(c: &mut Criterion) {
    let memories: Vec<MemoryRecord> = (0..1000).map(make_record).collect();
    let options = RetrievalOptions::importance_only(5).with_kinds([MemoryKind::Reflection]);

    c.bench_function("rank_reflections_importance_only_from_1000", |b| {
        b.iter(|| {
            let results = rank(black_box(&memories), None, now(), &options);
            black_box(results);
        });
    });
}

fn bench_parse_plan(c: &mut Criterion) {
    let response: String = (6..18)
        .map(|h| format!("- {h}:00 - Task at hour {h} (Duration: 1 hours, Priority: {}, Location: Bakery)\n", h % 10 + 1))
        .collect();
    let day = now().date_naive();

    c.bench_function("parse_daily_plan_12_lines", |b| {
        b.iter(|| {
            let plan = parse::parse_plan(black_box(&response), day);
            black_box(plan);
        });
    });
}

criterion_group!(benches, bench_rank, bench_rank_filtered, bench_parse_plan);
criterion_main!(benches);
