//! Model benchmarks: isolation forest, logistic regression and random forest
//! fit/predict on a synthetic matrix.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use wellness_risk::config::{ForestConfig, LinearConfig};
use wellness_risk::model::{IsolationForest, IsolationParams, LogisticRegression, RandomForest};

fn make_matrix(rows: usize, cols: usize) -> (Array2<f64>, Vec<bool>) {
    let x = Array2::from_shape_fn((rows, cols), |(i, j)| ((i * 31 + j * 17) % 97) as f64 / 97.0);
    let y = (0..rows).map(|i| x[[i, 0]] + 0.3 * x[[i, 1]] > 0.7).collect();
    (x, y)
}

fn bench_isolation_forest(c: &mut Criterion) {
    let (x, _) = make_matrix(2_000, 5);
    let params = IsolationParams {
        n_estimators: 200,
        max_samples: 256,
        contamination: 0.05,
        seed: 42,
    };

    c.bench_function("isolation_forest_fit_2000x5", |b| {
        b.iter(|| black_box(IsolationForest::fit(black_box(&x), params).unwrap()))
    });

    let forest = IsolationForest::fit(&x, params).unwrap();
    c.bench_function("isolation_forest_score_2000x5", |b| b.iter(|| black_box(forest.score_samples(black_box(&x)))));
}

fn bench_classifiers(c: &mut Criterion) {
    let (x, y) = make_matrix(1_000, 9);

    c.bench_function("logreg_fit_1000x9", |b| {
        b.iter(|| black_box(LogisticRegression::fit(black_box(&x), &y, &LinearConfig::default()).unwrap()))
    });

    let mut group = c.benchmark_group("random_forest");
    group.sample_size(10);
    group.bench_function("fit_1000x9", |b| {
        b.iter(|| black_box(RandomForest::fit(black_box(&x), &y, &ForestConfig::default(), 42).unwrap()))
    });
    let rf = RandomForest::fit(&x, &y, &ForestConfig::default(), 42).unwrap();
    group.bench_function("predict_1000x9", |b| b.iter(|| black_box(rf.predict_proba(black_box(&x)))));
    group.finish();
}

criterion_group!(benches, bench_isolation_forest, bench_classifiers);
criterion_main!(benches);
