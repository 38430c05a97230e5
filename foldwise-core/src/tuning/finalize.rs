//! Refit the chosen configuration on the full training pool and score it once
//! on the untouched test rows.

use crate::data::Dataset;
use crate::error::{EngineError, EngineResult};
use crate::estimator::{Estimator, RowPrediction};
use crate::metrics::Metric;
use crate::resample::{ResampleSet, Split};
use crate::space::Configuration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One metric measured on the test rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    pub metric: Metric,
    /// `None` when the metric is undefined on the test rows.
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undefined: Option<String>,
}

/// The final model and its test-set scores.
#[derive(Debug, Clone)]
pub struct FinalFit<M> {
    pub configuration: Configuration,
    pub model: M,
    pub records: Vec<TestRecord>,
    pub predictions: Vec<RowPrediction>,
}

impl<M> FinalFit<M> {
    pub fn value(&self, metric: Metric) -> Option<f64> {
        self.records
            .iter()
            .find(|r| r.metric == metric)
            .and_then(|r| r.value)
    }
}

/// Fit `configuration` on `initial`'s training rows and score its holdout.
///
/// Refuses to run when the test rows were ever seen during tuning: they must
/// not appear in the training pool or in any fold of `resamples`.
pub fn finalize<E: Estimator>(
    data: &Dataset,
    estimator: &E,
    configuration: &Configuration,
    initial: &Split,
    resamples: &ResampleSet,
    metrics: &[Metric],
) -> EngineResult<FinalFit<E::Model>> {
    check_leakage(initial, resamples)?;

    let training_failure = |source| EngineError::TrainingFailure {
        configuration: configuration.clone(),
        source,
    };
    let model = estimator
        .fit(initial.training(data), configuration)
        .map_err(training_failure)?;
    let scores = estimator
        .score(&model, initial.testing(data), metrics)
        .map_err(training_failure)?;

    let records = scores
        .values
        .into_iter()
        .map(|(metric, value)| match value.and_then(|v| metric.finite(v)) {
            Ok(value) => TestRecord {
                metric,
                value: Some(value),
                undefined: None,
            },
            Err(undefined) => {
                tracing::warn!(metric = %metric, reason = undefined.reason, "Metric undefined on test rows");
                TestRecord {
                    metric,
                    value: None,
                    undefined: Some(undefined.reason.to_string()),
                }
            }
        })
        .collect();
    tracing::info!(
        train = initial.train().len(),
        test = initial.holdout().len(),
        config = %configuration,
        "Final fit scored on test rows"
    );
    Ok(FinalFit {
        configuration: configuration.clone(),
        model,
        records,
        predictions: scores.predictions,
    })
}

/// Fail with [`EngineError::LeakageViolation`] if any test row was used for
/// training or resampling.
pub fn check_leakage(initial: &Split, resamples: &ResampleSet) -> EngineResult<()> {
    let test: BTreeSet<usize> = initial.holdout().iter().copied().collect();
    let overlap = |rows: &[usize]| rows.iter().filter(|r| test.contains(r)).count();

    let pooled = overlap(initial.train());
    if pooled > 0 {
        return Err(EngineError::LeakageViolation {
            overlap: pooled,
            location: "the training pool".into(),
        });
    }
    for fold in resamples {
        let n = overlap(fold.train()) + overlap(fold.holdout());
        if n > 0 {
            return Err(EngineError::LeakageViolation {
                overlap: n,
                location: format!("resample '{}'", fold.id()),
            });
        }
    }
    Ok(())
}
