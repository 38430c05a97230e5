//! The trainable-estimator and preprocessing-transform contracts.
//!
//! The engine never looks inside a model: it fits through [`Estimator::fit`],
//! keeps the returned value, and hands it back to [`Estimator::predict`] or
//! [`Estimator::score`]. Whatever was fit on which rows travels inside that
//! value.

pub mod baseline;
pub mod pipeline;

pub use baseline::{ConstantClassifier, KNearestClassifier, MeanRegressor, Standardize};
pub use pipeline::{Pipeline, PipelineModel};

use crate::data::{DataView, Dataset};
use crate::error::EstimatorError;
use crate::metrics::{Metric, MetricUndefined};
use crate::space::Configuration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A model's output for one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Prediction {
    /// Hard label plus per-class probabilities (probabilities may be empty
    /// for estimators that cannot produce them).
    Class {
        label: String,
        #[serde(default)]
        probabilities: BTreeMap<String, f64>,
    },
    Numeric { value: f64 },
}

impl Prediction {
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Class { label, .. } => Some(label),
            Self::Numeric { .. } => None,
        }
    }

    pub fn probability(&self, class: &str) -> Option<f64> {
        match self {
            Self::Class { probabilities, .. } => probabilities.get(class).copied(),
            Self::Numeric { .. } => None,
        }
    }
}

/// A prediction paired with the row it belongs to and that row's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowPrediction {
    pub row: usize,
    pub truth: Value,
    pub prediction: Prediction,
}

/// Metric values computed on one holdout, plus the predictions they came from.
#[derive(Debug)]
pub struct Scores {
    pub values: Vec<(Metric, Result<f64, MetricUndefined>)>,
    pub predictions: Vec<RowPrediction>,
}

/// A trainable model family.
///
/// Implementations must be pure with respect to their inputs: fitting the same
/// rows with the same configuration yields an equivalent model. The engine
/// calls `fit` concurrently from several worker threads.
pub trait Estimator: Send + Sync {
    type Model: Send + Sync;

    /// Short name used in logs and reports.
    fn name(&self) -> &str;

    fn fit(
        &self,
        train: DataView<'_>,
        config: &Configuration,
    ) -> Result<Self::Model, EstimatorError>;

    /// One prediction per row of `data`, in view order.
    fn predict(
        &self,
        model: &Self::Model,
        data: DataView<'_>,
    ) -> Result<Vec<Prediction>, EstimatorError>;

    /// Score a fitted model on `holdout` for every requested metric.
    fn score(
        &self,
        model: &Self::Model,
        holdout: DataView<'_>,
        metrics: &[Metric],
    ) -> Result<Scores, EstimatorError> {
        let predictions = attach_truth(holdout, self.predict(model, holdout)?)?;
        let values = metrics
            .iter()
            .map(|metric| (*metric, metric.compute(&predictions)))
            .collect();
        Ok(Scores {
            values,
            predictions,
        })
    }
}

/// A preprocessing step fit on training rows and applied to any rows.
pub trait Transform: Send + Sync {
    type Fitted: Send + Sync;

    fn fit(&self, train: DataView<'_>) -> Result<Self::Fitted, EstimatorError>;

    /// Transformed copy of `data`; rows keep view order.
    fn apply(&self, fitted: &Self::Fitted, data: DataView<'_>) -> Result<Dataset, EstimatorError>;
}

/// Pair predictions with their rows' ids and outcomes.
pub fn attach_truth(
    data: DataView<'_>,
    predictions: Vec<Prediction>,
) -> Result<Vec<RowPrediction>, EstimatorError> {
    if predictions.len() != data.len() {
        return Err(EstimatorError::new(format!(
            "estimator returned {} prediction(s) for {} row(s)",
            predictions.len(),
            data.len()
        )));
    }
    Ok(predictions
        .into_iter()
        .enumerate()
        .map(|(pos, prediction)| RowPrediction {
            row: data.row_id(pos),
            truth: data.outcome(pos).clone(),
            prediction,
        })
        .collect())
}
