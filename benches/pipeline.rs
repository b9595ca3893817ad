//! Pipeline benchmark: daily records → rolling features, and a full run.

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wellness_risk::config::{FeaturesConfig, PipelineConfig};
use wellness_risk::dataset::{EntityId, Record, Sex};
use wellness_risk::features::WindowedFeatureEngine;
use wellness_risk::pipeline::Pipeline;

fn make_records(entities: u32, days: u32) -> Vec<Record> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    (0..entities)
        .flat_map(|e| {
            (0..days).map(move |d| {
                let wobble = ((e * 7 + d * 13) % 11) as f64;
                Record {
                    entity_id: EntityId::from(e),
                    timestamp: start.checked_add_days(chrono::Days::new(d as u64)),
                    steps: 6_000.0 + wobble * 400.0,
                    sleep_hours: if d % 9 == e % 9 { 4.0 } else { 6.5 + wobble * 0.2 },
                    calories: 1_900.0 + wobble * 35.0,
                    age: 20.0 + (e % 40) as f64,
                    sex: if e % 2 == 0 { Sex::Male } else { Sex::Female },
                    height: 165.0 + (e % 20) as f64,
                    weight: 60.0 + (e % 25) as f64,
                }
            })
        })
        .collect()
}

fn bench_rolling_features(c: &mut Criterion) {
    let engine = WindowedFeatureEngine::new(&FeaturesConfig::default()).unwrap();
    let records = make_records(100, 60);

    c.bench_function("rolling_features_100x60", |b| b.iter(|| black_box(engine.compute(black_box(&records)))));
}

fn bench_full_pipeline(c: &mut Criterion) {
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let records = make_records(30, 30);

    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    group.bench_function("full_run_30x30", |b| b.iter(|| black_box(pipeline.run(black_box(&records)).unwrap())));
    group.finish();
}

criterion_group!(benches, bench_rolling_features, bench_full_pipeline);
criterion_main!(benches);
