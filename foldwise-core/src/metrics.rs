//! Performance metrics computed from holdout predictions.

use crate::data::{category_of, numeric_of};
use crate::estimator::{Prediction, RowPrediction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Smallest probability fed to `ln` by [`Metric::LogLoss`].
const LOG_LOSS_EPS: f64 = 1e-15;

/// Whether larger or smaller values of a metric are better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Maximize,
    Minimize,
}

/// A named performance metric with a fixed optimization direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Accuracy,
    ErrorRate,
    /// Area under the ROC curve. Binary outcomes use the first class in label
    /// order as the event; more than two classes average one-vs-rest AUCs.
    RocAuc,
    LogLoss,
    Rmse,
    Mae,
    /// Traditional coefficient of determination, `1 - SS_res / SS_tot`.
    RSquared,
}

/// Why a metric has no value on a particular holdout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{metric} is undefined: {reason}")]
pub struct MetricUndefined {
    pub metric: Metric,
    pub reason: &'static str,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Accuracy,
        Metric::ErrorRate,
        Metric::RocAuc,
        Metric::LogLoss,
        Metric::Rmse,
        Metric::Mae,
        Metric::RSquared,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
            Self::ErrorRate => "error_rate",
            Self::RocAuc => "roc_auc",
            Self::LogLoss => "log_loss",
            Self::Rmse => "rmse",
            Self::Mae => "mae",
            Self::RSquared => "r_squared",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Self::Accuracy | Self::RocAuc | Self::RSquared => Direction::Maximize,
            Self::ErrorRate | Self::LogLoss | Self::Rmse | Self::Mae => Direction::Minimize,
        }
    }

    /// Evaluate the metric over a holdout's predictions.
    pub fn compute(&self, predictions: &[RowPrediction]) -> Result<f64, MetricUndefined> {
        let undefined = |reason: &'static str| MetricUndefined {
            metric: *self,
            reason,
        };
        if predictions.is_empty() {
            return Err(undefined("no predictions"));
        }
        let value = match self {
            Self::Accuracy => accuracy(predictions).ok_or_else(|| undefined("needs class predictions")),
            Self::ErrorRate => accuracy(predictions)
                .map(|acc| 1.0 - acc)
                .ok_or_else(|| undefined("needs class predictions")),
            Self::RocAuc => roc_auc(predictions).map_err(undefined),
            Self::LogLoss => log_loss(predictions).map_err(undefined),
            Self::Rmse => {
                let residuals = residuals(predictions).ok_or_else(|| undefined("needs numeric predictions"))?;
                let mse = residuals.iter().map(|r| r * r).sum::<f64>() / residuals.len() as f64;
                Ok(mse.sqrt())
            }
            Self::Mae => {
                let residuals = residuals(predictions).ok_or_else(|| undefined("needs numeric predictions"))?;
                Ok(residuals.iter().map(|r| r.abs()).sum::<f64>() / residuals.len() as f64)
            }
            Self::RSquared => r_squared(predictions).map_err(undefined),
        }?;
        self.finite(value)
    }

    /// `value` itself when it is a real number; NaN and infinities are undefined.
    pub fn finite(&self, value: f64) -> Result<f64, MetricUndefined> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(MetricUndefined {
                metric: *self,
                reason: "value is not finite",
            })
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown metric '{s}'"))
    }
}

fn accuracy(predictions: &[RowPrediction]) -> Option<f64> {
    let mut correct = 0usize;
    for p in predictions {
        let label = p.prediction.label()?;
        if category_of(&p.truth).as_deref() == Some(label) {
            correct += 1;
        }
    }
    Some(correct as f64 / predictions.len() as f64)
}

fn residuals(predictions: &[RowPrediction]) -> Option<Vec<f64>> {
    predictions
        .iter()
        .map(|p| match p.prediction {
            Prediction::Numeric { value } => Some(numeric_of(&p.truth)? - value),
            Prediction::Class { .. } => None,
        })
        .collect()
}

fn r_squared(predictions: &[RowPrediction]) -> Result<f64, &'static str> {
    let residuals = residuals(predictions).ok_or("needs numeric predictions")?;
    let truths: Vec<f64> = predictions
        .iter()
        .filter_map(|p| numeric_of(&p.truth))
        .collect();
    let mean = truths.iter().sum::<f64>() / truths.len() as f64;
    let ss_tot = truths.iter().map(|t| (t - mean).powi(2)).sum::<f64>();
    if ss_tot == 0.0 {
        return Err("outcome is constant on this holdout");
    }
    let ss_res = residuals.iter().map(|r| r * r).sum::<f64>();
    Ok(1.0 - ss_res / ss_tot)
}

fn log_loss(predictions: &[RowPrediction]) -> Result<f64, &'static str> {
    let mut total = 0.0;
    for p in predictions {
        let truth = category_of(&p.truth).ok_or("outcome is not categorical")?;
        let Prediction::Class { probabilities, .. } = &p.prediction else {
            return Err("needs class probabilities");
        };
        if probabilities.is_empty() {
            return Err("needs class probabilities");
        }
        let prob = probabilities.get(&truth).copied().unwrap_or(0.0);
        total -= prob.clamp(LOG_LOSS_EPS, 1.0).ln();
    }
    Ok(total / predictions.len() as f64)
}

/// Class labels seen in the outcomes of these predictions, in label order.
fn truth_classes(predictions: &[RowPrediction]) -> Result<BTreeSet<String>, &'static str> {
    predictions
        .iter()
        .map(|p| category_of(&p.truth).ok_or("outcome is not categorical"))
        .collect()
}

fn roc_auc(predictions: &[RowPrediction]) -> Result<f64, &'static str> {
    let classes = truth_classes(predictions)?;
    if classes.len() < 2 {
        return Err("holdout contains a single class");
    }
    let has_probabilities = predictions.iter().all(|p| match &p.prediction {
        Prediction::Class { probabilities, .. } => !probabilities.is_empty(),
        Prediction::Numeric { .. } => false,
    });
    if !has_probabilities {
        return Err("needs class probabilities");
    }

    if classes.len() == 2 {
        let event = classes.first().ok_or("holdout contains a single class")?;
        return binary_auc(predictions, event).ok_or("holdout contains a single class");
    }
    let aucs: Vec<f64> = classes
        .iter()
        .filter_map(|class| binary_auc(predictions, class))
        .collect();
    Ok(aucs.iter().sum::<f64>() / aucs.len() as f64)
}

/// Mann-Whitney AUC for `event` vs the rest; tied scores share average ranks.
fn binary_auc(predictions: &[RowPrediction], event: &str) -> Option<f64> {
    let mut scored: Vec<(f64, bool)> = predictions
        .iter()
        .map(|p| {
            let score = p.prediction.probability(event).unwrap_or(0.0);
            (score, category_of(&p.truth).as_deref() == Some(event))
        })
        .collect();
    let positives = scored.iter().filter(|(_, pos)| *pos).count();
    let negatives = scored.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < scored.len() {
        let mut j = i;
        while j + 1 < scored.len() && scored[j + 1].0 == scored[i].0 {
            j += 1;
        }
        // ranks are 1-based; the tie block i..=j shares their average
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum += avg_rank * scored[i..=j].iter().filter(|(_, pos)| *pos).count() as f64;
        i = j + 1;
    }
    let (p, n) = (positives as f64, negatives as f64);
    Some((rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

/// One point on an ROC curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub sensitivity: f64,
    pub specificity: f64,
}

/// ROC curve for `event`, from the strictest threshold to the loosest.
///
/// Empty when the predictions lack probabilities or one side is absent.
pub fn roc_curve(predictions: &[RowPrediction], event: &str) -> Vec<RocPoint> {
    let mut scored: Vec<(f64, bool)> = predictions
        .iter()
        .filter_map(|p| {
            let score = p.prediction.probability(event)?;
            Some((score, category_of(&p.truth).as_deref() == Some(event)))
        })
        .collect();
    let positives = scored.iter().filter(|(_, pos)| *pos).count();
    let negatives = scored.len() - positives;
    if positives == 0 || negatives == 0 {
        return Vec::new();
    }
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut points = vec![RocPoint {
        threshold: f64::INFINITY,
        sensitivity: 0.0,
        specificity: 1.0,
    }];
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < scored.len() {
        let threshold = scored[i].0;
        while i < scored.len() && scored[i].0 == threshold {
            if scored[i].1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        points.push(RocPoint {
            threshold,
            sensitivity: tp as f64 / positives as f64,
            specificity: 1.0 - fp as f64 / negatives as f64,
        });
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn class_row(truth: &str, label: &str, p_yes: f64) -> RowPrediction {
        RowPrediction {
            row: 0,
            truth: json!(truth),
            prediction: Prediction::Class {
                label: label.into(),
                probabilities: BTreeMap::from([
                    ("no".to_string(), 1.0 - p_yes),
                    ("yes".to_string(), p_yes),
                ]),
            },
        }
    }

    fn numeric_row(truth: f64, value: f64) -> RowPrediction {
        RowPrediction {
            row: 0,
            truth: json!(truth),
            prediction: Prediction::Numeric { value },
        }
    }

    #[test]
    fn test_accuracy_and_error_rate() {
        let rows = vec![
            class_row("yes", "yes", 0.9),
            class_row("no", "yes", 0.6),
            class_row("no", "no", 0.2),
            class_row("yes", "yes", 0.7),
        ];
        assert_eq!(Metric::Accuracy.compute(&rows), Ok(0.75));
        assert_eq!(Metric::ErrorRate.compute(&rows), Ok(0.25));
    }

    #[test]
    fn test_auc_uses_first_label_as_event() {
        // event = "no"; scores for "no" perfectly separate the classes
        let rows = vec![
            class_row("yes", "yes", 0.9),
            class_row("yes", "yes", 0.8),
            class_row("no", "no", 0.3),
            class_row("no", "no", 0.1),
        ];
        assert_eq!(Metric::RocAuc.compute(&rows), Ok(1.0));
    }

    #[test]
    fn test_auc_ties_count_half() {
        let rows = vec![class_row("yes", "yes", 0.5), class_row("no", "yes", 0.5)];
        assert_eq!(Metric::RocAuc.compute(&rows), Ok(0.5));
    }

    #[test]
    fn test_auc_undefined_for_single_class() {
        let rows = vec![class_row("yes", "yes", 0.5), class_row("yes", "no", 0.2)];
        let err = Metric::RocAuc.compute(&rows).unwrap_err();
        assert_eq!(err.metric, Metric::RocAuc);
    }

    #[test]
    fn test_log_loss() {
        let rows = vec![class_row("yes", "yes", 0.5), class_row("no", "no", 0.5)];
        let value = Metric::LogLoss.compute(&rows).unwrap();
        assert!((value - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_regression_metrics() {
        let rows = vec![numeric_row(1.0, 2.0), numeric_row(3.0, 3.0), numeric_row(5.0, 3.0)];
        assert_eq!(Metric::Mae.compute(&rows), Ok(1.0));
        assert!((Metric::Rmse.compute(&rows).unwrap() - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
        // ss_tot = 8, ss_res = 5
        assert!((Metric::RSquared.compute(&rows).unwrap() - 3.0 / 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_kind_mismatch_is_undefined() {
        let rows = vec![numeric_row(1.0, 2.0)];
        assert!(Metric::Accuracy.compute(&rows).is_err());
        let rows = vec![class_row("yes", "yes", 0.9)];
        assert!(Metric::Rmse.compute(&rows).is_err());
        assert!(Metric::Accuracy.compute(&[]).is_err());
    }

    #[test]
    fn test_non_finite_values_are_undefined() {
        let rows = vec![numeric_row(1.0, f64::NAN), numeric_row(3.0, 3.0)];
        for metric in [Metric::Rmse, Metric::Mae, Metric::RSquared] {
            let err = metric.compute(&rows).unwrap_err();
            assert_eq!(err.reason, "value is not finite");
        }
        let rows = vec![numeric_row(1.0, f64::INFINITY), numeric_row(3.0, 3.0)];
        assert!(Metric::Rmse.compute(&rows).is_err());
        assert!(Metric::Accuracy.finite(f64::NEG_INFINITY).is_err());
        assert_eq!(Metric::Accuracy.finite(0.5), Ok(0.5));
    }

    #[test]
    fn test_directions_and_names() {
        assert_eq!(Metric::RocAuc.direction(), Direction::Maximize);
        assert_eq!(Metric::ErrorRate.direction(), Direction::Minimize);
        for metric in Metric::ALL {
            assert_eq!(metric.name().parse::<Metric>(), Ok(metric));
        }
        assert!("f1".parse::<Metric>().is_err());
    }

    #[test]
    fn test_roc_curve_endpoints() {
        let rows = vec![
            class_row("yes", "yes", 0.9),
            class_row("no", "yes", 0.6),
            class_row("yes", "no", 0.4),
            class_row("no", "no", 0.1),
        ];
        let curve = roc_curve(&rows, "yes");
        assert_eq!(curve.len(), 5);
        assert_eq!(curve[0].sensitivity, 0.0);
        let last = curve.last().unwrap();
        assert_eq!((last.sensitivity, last.specificity), (1.0, 0.0));
        assert!(roc_curve(&rows[..1], "yes").is_empty());
    }
}
