use criterion::{Criterion, black_box, criterion_group, criterion_main};
use foldwise_core::estimator::{KNearestClassifier, Pipeline, Standardize};
use foldwise_core::metrics::Metric;
use foldwise_core::space::{ParamRange, ParamSpace};
use foldwise_core::tuning::{EvaluationOptions, evaluate, summarize};
use foldwise_core::{Configuration, Dataset, kfold, split};
use serde_json::json;

fn synthetic(n: usize) -> Dataset {
    let rows = (0..n)
        .map(|i| {
            let x = (i as f64 * 0.618_033_988).fract();
            let y = (i as f64 * 0.414_213_562).fract();
            let class = if x + y > 1.0 { "high" } else { "low" };
            vec![json!(x), json!(y), json!(class)]
        })
        .collect();
    Dataset::new(vec!["x".into(), "y".into(), "class".into()], rows, "class").unwrap()
}

fn bench_partitioning(c: &mut Criterion) {
    let data = synthetic(5_000);

    c.bench_function("stratified_split_5000", |b| {
        b.iter(|| split(data.view(), black_box(0.75), Some("class"), 42).unwrap())
    });

    c.bench_function("stratified_kfold_10_5000", |b| {
        b.iter(|| kfold(data.view(), black_box(10), Some("class"), 42).unwrap())
    });
}

fn bench_design(c: &mut Criterion) {
    let space = ParamSpace::new()
        .add("penalty", ParamRange::Float {
            min: 1e-5,
            max: 1.0,
            log_scale: true,
        })
        .add("neighbors", ParamRange::Int { min: 1, max: 50 });

    c.bench_function("max_min_design_25", |b| {
        b.iter(|| space.space_filling(black_box(25), 7).unwrap())
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let data = synthetic(400);
    let folds = kfold(data.view(), 5, Some("class"), 1).unwrap();
    let configs: Vec<Configuration> = [1, 5, 11, 21]
        .into_iter()
        .map(|k| Configuration::new().with("neighbors", k))
        .collect();
    let estimator = Pipeline::new(Standardize, KNearestClassifier);
    let options = EvaluationOptions::new(vec![Metric::Accuracy, Metric::RocAuc]);

    c.bench_function("evaluate_knn_5x4", |b| {
        b.iter(|| {
            let eval = evaluate(&data, &folds, black_box(&configs), &estimator, &options).unwrap();
            summarize(&eval.records)
        })
    });
}

criterion_group!(benches, bench_partitioning, bench_design, bench_evaluate);
criterion_main!(benches);
