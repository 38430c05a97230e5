//! Resampling evaluator: every (fold, configuration) pair fit and scored on a
//! bounded worker pool.

use crate::data::Dataset;
use crate::error::{EngineError, EngineResult};
use crate::estimator::{Estimator, RowPrediction};
use crate::metrics::Metric;
use crate::resample::{Fold, ResampleSet};
use crate::space::Configuration;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared flag that stops dispatch of new evaluation tasks once raised.
///
/// Tasks already running finish normally and their records are kept.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Knobs for [`evaluate`].
#[derive(Debug, Clone)]
pub struct EvaluationOptions {
    pub metrics: Vec<Metric>,
    /// Worker threads; `None` uses every available core.
    pub parallelism: Option<usize>,
    /// Attach per-row holdout predictions to each record; records of one
    /// (fold, configuration) pair share a single copy.
    pub keep_predictions: bool,
    /// Stop dispatching new tasks once this much time has elapsed.
    pub time_budget: Option<Duration>,
    pub abort: Option<AbortHandle>,
}

impl EvaluationOptions {
    pub fn new(metrics: Vec<Metric>) -> Self {
        Self {
            metrics,
            parallelism: None,
            keep_predictions: false,
            time_budget: None,
            abort: None,
        }
    }

    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads);
        self
    }

    pub fn with_predictions(mut self, keep: bool) -> Self {
        self.keep_predictions = keep;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn with_abort(mut self, handle: AbortHandle) -> Self {
        self.abort = Some(handle);
        self
    }

    fn threads(&self) -> usize {
        self.parallelism
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

/// One metric value for one configuration on one fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub config_id: String,
    pub config_index: usize,
    pub configuration: Configuration,
    pub fold_id: String,
    pub metric: Metric,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictions: Option<Arc<[RowPrediction]>>,
}

/// Which step of a (fold, configuration) pair failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Fit,
    Predict,
}

/// A (fold, configuration) pair that produced no records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairFailure {
    pub fold_id: String,
    pub config_index: usize,
    pub configuration: Configuration,
    pub stage: FailureStage,
    pub error: String,
}

/// A metric that could not be computed on one holdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricGap {
    pub fold_id: String,
    pub config_index: usize,
    pub metric: Metric,
    pub reason: String,
}

/// Everything a resampling run produced.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Ordered by fold, then configuration, then requested metric order.
    pub records: Vec<MetricRecord>,
    pub failures: Vec<PairFailure>,
    pub gaps: Vec<MetricGap>,
    /// Pairs skipped after an abort or an exhausted time budget.
    pub not_dispatched: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl Evaluation {
    /// Number of (fold, configuration) pairs that were attempted.
    pub fn attempted(&self, total_pairs: usize) -> usize {
        total_pairs - self.not_dispatched
    }
}

enum PairOutcome {
    Scored {
        records: Vec<MetricRecord>,
        gaps: Vec<MetricGap>,
    },
    Failed(PairFailure),
}

struct PairContext<'a, E> {
    data: &'a Dataset,
    estimator: &'a E,
    options: &'a EvaluationOptions,
}

/// Fit and score every configuration on every fold.
///
/// A pair whose fit or predict fails contributes a [`PairFailure`] and no
/// records; every other pair is unaffected. Results are collected in task
/// order, so the output is independent of thread scheduling.
pub fn evaluate<E: Estimator>(
    data: &Dataset,
    resamples: &ResampleSet,
    configurations: &[Configuration],
    estimator: &E,
    options: &EvaluationOptions,
) -> EngineResult<Evaluation> {
    if options.metrics.is_empty() {
        return Err(EngineError::invalid_input("at least one metric is required"));
    }
    if configurations.is_empty() {
        return Err(EngineError::invalid_input(
            "at least one configuration is required",
        ));
    }
    let threads = options.threads();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("foldwise-worker-{i}"))
        .build()
        .map_err(|e| EngineError::Pool(e.to_string()))?;

    let ids: Vec<String> = configurations.iter().map(Configuration::id).collect();
    let tasks: Vec<(&Fold, usize)> = resamples
        .iter()
        .flat_map(|fold| (0..configurations.len()).map(move |c| (fold, c)))
        .collect();
    tracing::info!(
        estimator = estimator.name(),
        folds = resamples.len(),
        configurations = configurations.len(),
        metrics = options.metrics.len(),
        threads,
        "Evaluating resamples"
    );

    let started = Instant::now();
    let ctx = PairContext {
        data,
        estimator,
        options,
    };
    let outcomes: Vec<Option<PairOutcome>> = pool.install(|| {
        tasks
            .par_iter()
            .map(|&(fold, c)| {
                if should_stop(options, started) {
                    return None;
                }
                Some(run_pair(&ctx, fold, c, &configurations[c], &ids[c]))
            })
            .collect()
    });

    let mut evaluation = Evaluation::default();
    for outcome in outcomes {
        match outcome {
            None => evaluation.not_dispatched += 1,
            Some(PairOutcome::Scored { records, gaps }) => {
                evaluation.records.extend(records);
                evaluation.gaps.extend(gaps);
            }
            Some(PairOutcome::Failed(failure)) => evaluation.failures.push(failure),
        }
    }
    evaluation.cancelled = evaluation.not_dispatched > 0;
    evaluation.elapsed = started.elapsed();

    tracing::info!(
        records = evaluation.records.len(),
        failures = evaluation.failures.len(),
        gaps = evaluation.gaps.len(),
        not_dispatched = evaluation.not_dispatched,
        elapsed_ms = evaluation.elapsed.as_millis() as u64,
        "Evaluation finished"
    );
    Ok(evaluation)
}

fn should_stop(options: &EvaluationOptions, started: Instant) -> bool {
    if options.abort.as_ref().is_some_and(AbortHandle::is_aborted) {
        return true;
    }
    options
        .time_budget
        .is_some_and(|budget| started.elapsed() >= budget)
}

fn run_pair<E: Estimator>(
    ctx: &PairContext<'_, E>,
    fold: &Fold,
    config_index: usize,
    configuration: &Configuration,
    config_id: &str,
) -> PairOutcome {
    let failed = |stage: FailureStage, err: &dyn std::error::Error| {
        let error = error_chain(err);
        tracing::warn!(
            fold = fold.id(),
            config = config_index,
            stage = ?stage,
            error = %error,
            "Resample pair failed"
        );
        PairOutcome::Failed(PairFailure {
            fold_id: fold.id().to_string(),
            config_index,
            configuration: configuration.clone(),
            stage,
            error,
        })
    };

    let model = match ctx.estimator.fit(fold.analysis(ctx.data), configuration) {
        Ok(model) => model,
        Err(e) => return failed(FailureStage::Fit, &e),
    };
    let scores = match ctx
        .estimator
        .score(&model, fold.assessment(ctx.data), &ctx.options.metrics)
    {
        Ok(scores) => scores,
        Err(e) => return failed(FailureStage::Predict, &e),
    };

    let predictions: Option<Arc<[RowPrediction]>> = ctx
        .options
        .keep_predictions
        .then(|| scores.predictions.into());
    let mut records = Vec::with_capacity(scores.values.len());
    let mut gaps = Vec::new();
    for (metric, value) in scores.values {
        match value.and_then(|v| metric.finite(v)) {
            Ok(value) => records.push(MetricRecord {
                config_id: config_id.to_string(),
                config_index,
                configuration: configuration.clone(),
                fold_id: fold.id().to_string(),
                metric,
                value,
                predictions: predictions.clone(),
            }),
            Err(undefined) => {
                tracing::warn!(
                    fold = fold.id(),
                    config = config_index,
                    metric = %metric,
                    reason = undefined.reason,
                    "Metric undefined on holdout"
                );
                gaps.push(MetricGap {
                    fold_id: fold.id().to_string(),
                    config_index,
                    metric,
                    reason: undefined.reason.to_string(),
                });
            }
        }
    }
    tracing::debug!(
        fold = fold.id(),
        config = config_index,
        records = records.len(),
        "Scored resample pair"
    );
    PairOutcome::Scored { records, gaps }
}

/// `outer: inner: innermost` rendering of an error and its sources.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}
