//! One complete tuning run: split, resample, evaluate, select, refit.

use crate::config::{ResamplingScheme, TuningConfig};
use crate::data::Dataset;
use crate::error::{EngineError, EngineResult};
use crate::estimator::Estimator;
use crate::metrics::Metric;
use crate::resample::partition::derive_seed;
use crate::resample::{ResampleSet, Split, repeated_kfold, split, validation_split};
use crate::space::Configuration;
use crate::tuning::{
    AbortHandle, EvaluationOptions, FinalFit, MetricGap, MetricRecord, MetricSummary, PairFailure,
    Selection, TestRecord, evaluate, finalize, select_best, summarize,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Serializable account of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningReport {
    pub run_id: Uuid,
    pub estimator: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub seed: u64,
    pub rows: usize,
    pub test_rows: usize,
    pub folds: usize,
    pub configurations: usize,
    pub primary_metric: Metric,
    pub summaries: Vec<MetricSummary>,
    pub selection: Selection,
    pub failures: Vec<PairFailure>,
    pub gaps: Vec<MetricGap>,
    pub not_dispatched: usize,
    pub cancelled: bool,
    pub test_metrics: Vec<TestRecord>,
}

/// Report plus the artifacts too large or too model-specific to serialize.
#[derive(Debug)]
pub struct TuningOutcome<M> {
    pub report: TuningReport,
    pub records: Vec<MetricRecord>,
    pub initial: Split,
    pub resamples: ResampleSet,
    pub final_fit: FinalFit<M>,
}

/// Drives the whole flow from a [`TuningConfig`].
#[derive(Debug, Clone)]
pub struct TuningRun {
    config: TuningConfig,
    abort: Option<AbortHandle>,
}

impl TuningRun {
    pub fn new(config: TuningConfig) -> Self {
        Self {
            config,
            abort: None,
        }
    }

    /// Share an abort flag with the evaluator.
    pub fn with_abort(mut self, handle: AbortHandle) -> Self {
        self.abort = Some(handle);
        self
    }

    pub fn config(&self) -> &TuningConfig {
        &self.config
    }

    /// Hold out the test rows and resample what remains.
    pub fn partition(&self, data: &Dataset) -> EngineResult<(Split, ResampleSet)> {
        let config = &self.config;
        let stratify = config.stratify_by.as_deref();
        let initial = split(data.view(), 1.0 - config.test_fraction, stratify, config.seed)?;
        let pool = initial.training(data);
        let seed = derive_seed(config.seed, 0);
        let resamples = match config.resampling {
            ResamplingScheme::Validation { fraction } => {
                validation_split(pool, fraction, stratify, seed)?
            }
            ResamplingScheme::KFold { folds, repeats } => {
                repeated_kfold(pool, folds, repeats, stratify, seed)?
            }
        };
        Ok((initial, resamples))
    }

    pub fn configurations(&self) -> EngineResult<Vec<Configuration>> {
        self.config.space.build(self.config.seed)
    }

    pub fn execute<E: Estimator>(
        &self,
        data: &Dataset,
        estimator: &E,
    ) -> EngineResult<TuningOutcome<E::Model>> {
        let config = &self.config;
        config.validate()?;
        let primary = config.primary_metric()?;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(
            run_id = %run_id,
            estimator = estimator.name(),
            rows = data.row_count(),
            seed = config.seed,
            "Starting tuning run"
        );

        let (initial, resamples) = self.partition(data)?;
        let configurations = self.configurations()?;
        tracing::info!(
            folds = resamples.len(),
            configurations = configurations.len(),
            test_rows = initial.holdout().len(),
            "Partitioned data and built configuration space"
        );

        let mut options = EvaluationOptions::new(config.metrics.clone())
            .with_predictions(config.keep_predictions);
        options.parallelism = config.parallelism;
        options.time_budget = config.time_budget();
        options.abort = self.abort.clone();
        let evaluation = evaluate(data, &resamples, &configurations, estimator, &options)?;

        let summaries = summarize(&evaluation.records);
        if summaries.is_empty() {
            return Err(EngineError::NoSuccessfulConfigurations);
        }
        let selection = select_best(&summaries, primary, primary.direction())?;
        let final_fit = finalize(
            data,
            estimator,
            &selection.configuration,
            &initial,
            &resamples,
            &config.metrics,
        )?;

        let report = TuningReport {
            run_id,
            estimator: estimator.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            seed: config.seed,
            rows: data.row_count(),
            test_rows: initial.holdout().len(),
            folds: resamples.len(),
            configurations: configurations.len(),
            primary_metric: primary,
            summaries,
            selection,
            failures: evaluation.failures,
            gaps: evaluation.gaps,
            not_dispatched: evaluation.not_dispatched,
            cancelled: evaluation.cancelled,
            test_metrics: final_fit.records.clone(),
        };
        tracing::info!(
            run_id = %run_id,
            best = report.selection.summary.config_index,
            failures = report.failures.len(),
            "Tuning run finished"
        );
        Ok(TuningOutcome {
            report,
            records: evaluation.records,
            initial,
            resamples,
            final_fit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{KNearestClassifier, Pipeline, Standardize};
    use crate::space::{GridParam, GridValues, ParamValue, SpaceDescriptor};
    use serde_json::json;

    fn clusters() -> Dataset {
        let rows = (0..40)
            .map(|i| {
                let (x, label) = if i % 2 == 0 {
                    (i as f64 * 0.01, "left")
                } else {
                    (10.0 + i as f64 * 0.01, "right")
                };
                vec![json!(x), json!(label)]
            })
            .collect();
        Dataset::new(vec!["x".into(), "side".into()], rows, "side").unwrap()
    }

    fn knn_config() -> TuningConfig {
        TuningConfig {
            stratify_by: Some("side".into()),
            space: SpaceDescriptor::Grid {
                params: vec![GridParam {
                    name: "neighbors".into(),
                    values: GridValues::List(vec![ParamValue::Int(1), ParamValue::Int(3)]),
                }],
            },
            metrics: vec![Metric::Accuracy, Metric::RocAuc],
            parallelism: Some(2),
            ..Default::default()
        }
    }

    #[test]
    fn test_run_on_separable_data() {
        let data = clusters();
        let run = TuningRun::new(knn_config());
        let outcome = run
            .execute(&data, &Pipeline::new(Standardize, KNearestClassifier))
            .unwrap();
        let report = &outcome.report;
        assert_eq!(report.configurations, 2);
        assert_eq!(report.folds, 5);
        assert_eq!(report.test_rows, 10);
        assert!(report.failures.is_empty());
        assert_eq!(report.selection.summary.mean, 1.0);
        assert_eq!(outcome.final_fit.value(Metric::Accuracy), Some(1.0));
        assert_eq!(outcome.records.len(), 2 * 5 * 2);
    }

    #[test]
    fn test_partition_keeps_test_rows_out_of_resamples() {
        let data = clusters();
        let run = TuningRun::new(TuningConfig {
            resampling: ResamplingScheme::Validation { fraction: 0.75 },
            ..knn_config()
        });
        let (initial, resamples) = run.partition(&data).unwrap();
        assert_eq!(resamples.len(), 1);
        let touched = resamples.rows();
        assert!(initial.holdout().iter().all(|r| !touched.contains(r)));
        assert_eq!(touched.len(), initial.train().len());
    }

    #[test]
    fn test_aborted_run_has_no_successful_configuration() {
        let data = clusters();
        let handle = AbortHandle::new();
        handle.abort();
        let err = TuningRun::new(knn_config())
            .with_abort(handle)
            .execute(&data, &KNearestClassifier)
            .unwrap_err();
        assert!(matches!(err, EngineError::NoSuccessfulConfigurations));
    }
}
