//! Reference estimators and a reference transform.
//!
//! These exist so resampling runs can be exercised end to end without an
//! external modelling library: a constant classifier, a mean regressor, a
//! k-nearest-neighbour classifier with one tunable parameter, and z-score
//! standardization of numeric predictors.

use crate::data::{DataView, Dataset, category_of, numeric_of};
use crate::error::EstimatorError;
use crate::estimator::{Estimator, Prediction, Transform};
use crate::space::Configuration;
use serde_json::Value;
use std::collections::BTreeMap;

/// Default neighbour count for [`KNearestClassifier`].
const DEFAULT_NEIGHBORS: usize = 5;

/// Class frequencies of the training outcomes, in label order.
fn class_priors(train: DataView<'_>) -> Result<BTreeMap<String, f64>, EstimatorError> {
    if train.is_empty() {
        return Err(EstimatorError::new("cannot fit on zero rows"));
    }
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for pos in 0..train.len() {
        let label = category_of(train.outcome(pos)).ok_or_else(|| {
            EstimatorError::new(format!(
                "outcome at row {} is not categorical",
                train.row_id(pos)
            ))
        })?;
        *counts.entry(label).or_default() += 1;
    }
    let n = train.len() as f64;
    Ok(counts
        .into_iter()
        .map(|(label, count)| (label, count as f64 / n))
        .collect())
}

/// Predicts one label for every row: the `label` hyperparameter when given,
/// otherwise the training majority (smallest label on ties). Probabilities are
/// the training class frequencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantClassifier;

#[derive(Debug, Clone)]
pub struct ConstantModel {
    pub label: String,
    pub priors: BTreeMap<String, f64>,
}

impl Estimator for ConstantClassifier {
    type Model = ConstantModel;

    fn name(&self) -> &str {
        "constant"
    }

    fn fit(&self, train: DataView<'_>, config: &Configuration) -> Result<ConstantModel, EstimatorError> {
        let priors = class_priors(train)?;
        let label = match config.get("label") {
            Some(value) => value.to_string(),
            None => priors
                .iter()
                .fold(None::<(&String, f64)>, |best, (label, &p)| match best {
                    Some((_, bp)) if bp >= p => best,
                    _ => Some((label, p)),
                })
                .map(|(label, _)| label.clone())
                .ok_or_else(|| EstimatorError::new("no classes in training rows"))?,
        };
        Ok(ConstantModel { label, priors })
    }

    fn predict(&self, model: &ConstantModel, data: DataView<'_>) -> Result<Vec<Prediction>, EstimatorError> {
        Ok((0..data.len())
            .map(|_| Prediction::Class {
                label: model.label.clone(),
                probabilities: model.priors.clone(),
            })
            .collect())
    }
}

/// Predicts the training mean of a numeric outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanRegressor;

impl Estimator for MeanRegressor {
    type Model = f64;

    fn name(&self) -> &str {
        "mean"
    }

    fn fit(&self, train: DataView<'_>, _config: &Configuration) -> Result<f64, EstimatorError> {
        if train.is_empty() {
            return Err(EstimatorError::new("cannot fit on zero rows"));
        }
        let mut total = 0.0;
        for pos in 0..train.len() {
            total += numeric_of(train.outcome(pos)).ok_or_else(|| {
                EstimatorError::new(format!("outcome at row {} is not numeric", train.row_id(pos)))
            })?;
        }
        Ok(total / train.len() as f64)
    }

    fn predict(&self, model: &f64, data: DataView<'_>) -> Result<Vec<Prediction>, EstimatorError> {
        Ok(vec![Prediction::Numeric { value: *model }; data.len()])
    }
}

/// Majority vote among the `neighbors` nearest training rows (Euclidean
/// distance over the numeric predictors).
#[derive(Debug, Clone, Copy, Default)]
pub struct KNearestClassifier;

#[derive(Debug, Clone)]
pub struct KNearestModel {
    neighbors: usize,
    points: Vec<(Vec<f64>, String)>,
    classes: Vec<String>,
}

fn features(data: DataView<'_>, pos: usize) -> Result<Vec<f64>, EstimatorError> {
    let dataset = data.dataset();
    dataset
        .predictor_indices()
        .iter()
        .map(|&col| {
            numeric_of(data.value(pos, col)).ok_or_else(|| {
                EstimatorError::new(format!(
                    "predictor '{}' is not numeric at row {}",
                    dataset.columns()[col],
                    data.row_id(pos)
                ))
            })
        })
        .collect()
}

impl Estimator for KNearestClassifier {
    type Model = KNearestModel;

    fn name(&self) -> &str {
        "knn"
    }

    fn fit(&self, train: DataView<'_>, config: &Configuration) -> Result<KNearestModel, EstimatorError> {
        let neighbors = match config.get("neighbors") {
            Some(value) => value
                .as_i64()
                .and_then(|k| usize::try_from(k).ok())
                .ok_or_else(|| EstimatorError::new(format!("neighbors must be a non-negative integer, got {value}")))?,
            None => DEFAULT_NEIGHBORS,
        };
        if neighbors == 0 {
            return Err(EstimatorError::new("neighbors must be at least 1"));
        }
        if neighbors > train.len() {
            return Err(EstimatorError::new(format!(
                "neighbors = {neighbors} exceeds the {} training row(s)",
                train.len()
            )));
        }
        let classes = class_priors(train)?.into_keys().collect();
        let points: Vec<(Vec<f64>, String)> = (0..train.len())
            .map(|pos| {
                let label = category_of(train.outcome(pos)).unwrap_or_default();
                Ok((features(train, pos)?, label))
            })
            .collect::<Result<_, EstimatorError>>()?;
        Ok(KNearestModel {
            neighbors,
            points,
            classes,
        })
    }

    fn predict(&self, model: &KNearestModel, data: DataView<'_>) -> Result<Vec<Prediction>, EstimatorError> {
        (0..data.len())
            .map(|pos| {
                let x = features(data, pos)?;
                let mut ranked: Vec<(f64, usize)> = model
                    .points
                    .iter()
                    .enumerate()
                    .map(|(i, (p, _))| {
                        let d = p.iter().zip(&x).map(|(a, b)| (a - b).powi(2)).sum::<f64>();
                        (d, i)
                    })
                    .collect();
                ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

                let mut votes: BTreeMap<&str, usize> =
                    model.classes.iter().map(|c| (c.as_str(), 0)).collect();
                // first label to reach the top count wins, i.e. the one with the closest neighbour
                let mut order: Vec<&str> = Vec::new();
                for &(_, i) in ranked.iter().take(model.neighbors) {
                    let label = model.points[i].1.as_str();
                    *votes.entry(label).or_default() += 1;
                    if !order.contains(&label) {
                        order.push(label);
                    }
                }
                let top = votes.values().copied().max().unwrap_or(0);
                let label = order
                    .iter()
                    .find(|l| votes.get(*l) == Some(&top))
                    .copied()
                    .unwrap_or_default()
                    .to_string();
                let k = model.neighbors as f64;
                let probabilities = votes
                    .into_iter()
                    .map(|(c, v)| (c.to_string(), v as f64 / k))
                    .collect();
                Ok(Prediction::Class {
                    label,
                    probabilities,
                })
            })
            .collect()
    }
}

/// Z-score standardization of every all-numeric predictor column.
#[derive(Debug, Clone, Copy, Default)]
pub struct Standardize;

/// Per-column mean and sample standard deviation learned from training rows.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardizeStats {
    columns: Vec<(usize, String, f64, f64)>,
}

impl StandardizeStats {
    pub fn mean(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .find(|(_, name, _, _)| name == column)
            .map(|(_, _, mean, _)| *mean)
    }

    pub fn std_dev(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .find(|(_, name, _, _)| name == column)
            .map(|(_, _, _, sd)| *sd)
    }
}

impl Transform for Standardize {
    type Fitted = StandardizeStats;

    fn fit(&self, train: DataView<'_>) -> Result<StandardizeStats, EstimatorError> {
        let dataset = train.dataset();
        let mut columns = Vec::new();
        for &col in dataset.predictor_indices() {
            let values: Option<Vec<f64>> = (0..train.len())
                .map(|pos| match train.value(pos, col) {
                    Value::Number(n) => n.as_f64(),
                    _ => None,
                })
                .collect();
            let Some(values) = values.filter(|v| !v.is_empty()) else {
                continue;
            };
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let sd = if values.len() > 1 {
                (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
            } else {
                0.0
            };
            columns.push((col, dataset.columns()[col].clone(), mean, sd));
        }
        Ok(StandardizeStats { columns })
    }

    fn apply(&self, fitted: &StandardizeStats, data: DataView<'_>) -> Result<Dataset, EstimatorError> {
        let rows = data
            .rows()
            .map(|(_, row)| {
                let mut row = row.to_vec();
                for (col, _, mean, sd) in &fitted.columns {
                    if let Some(x) = numeric_of(&row[*col]) {
                        let z = if *sd > 0.0 { (x - mean) / sd } else { 0.0 };
                        row[*col] = serde_json::Number::from_f64(z)
                            .map(Value::Number)
                            .unwrap_or(Value::Null);
                    }
                }
                row
            })
            .collect();
        data.dataset()
            .with_rows(rows)
            .map_err(|e| EstimatorError::with_source("standardize produced an invalid dataset", e))
    }
}
