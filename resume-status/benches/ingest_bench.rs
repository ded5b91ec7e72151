//! Benchmarks for stage event ingestion.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use resume_status::aggregator::{AggregateState, StatusSnapshot};
use resume_status::core::{StageEvent, StepCatalog};
use resume_status::progress::ProgressSummary;

const STAGES: [&str; 4] = [
    "JobDescriptionAnalyzerAgent",
    "MatchingAgent",
    "ResumeRewriteAgent",
    "ATSOptimizationAgent",
];

fn run_payloads() -> Vec<String> {
    STAGES
        .iter()
        .flat_map(|stage| [StageEvent::started(*stage), StageEvent::success(*stage)])
        .map(|event| event.to_json())
        .collect()
}

fn ingest_benchmark(c: &mut Criterion) {
    let payloads = run_payloads();

    c.bench_function("decode_stage_event", |b| {
        b.iter(|| StageEvent::decode(black_box(&payloads[0])))
    });

    c.bench_function("ingest_full_run", |b| {
        b.iter(|| {
            let mut state = AggregateState::new();
            for payload in &payloads {
                if let Ok(event) = StageEvent::decode(black_box(payload)) {
                    state.apply(&event);
                }
            }
            state
        })
    });

    let catalog = StepCatalog::resume_pipeline();
    let mut snapshot = StatusSnapshot::default();
    for payload in &payloads[..5] {
        if let Ok(event) = StageEvent::decode(payload) {
            snapshot.per_stage.apply(&event);
        }
    }
    c.bench_function("derive_progress", |b| {
        b.iter(|| ProgressSummary::derive(&catalog, black_box(&snapshot), true))
    });
}

criterion_group!(benches, ingest_benchmark);
criterion_main!(benches);
