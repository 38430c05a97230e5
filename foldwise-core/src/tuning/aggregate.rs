//! Reduce raw metric records to per-configuration summaries.

use crate::metrics::Metric;
use crate::space::Configuration;
use crate::tuning::MetricRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resampled estimate of one metric for one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub config_index: usize,
    pub config_id: String,
    pub configuration: Configuration,
    pub metric: Metric,
    pub mean: f64,
    /// Sample standard deviation over folds divided by `sqrt(n)`; zero for a
    /// single fold.
    pub std_err: f64,
    /// Number of folds that contributed a value.
    pub n: usize,
}

/// Mean of one metric on one fold, across every configuration scored there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldSummary {
    pub fold_id: String,
    pub metric: Metric,
    pub mean: f64,
    pub n: usize,
}

/// Group records by (configuration index, metric) and reduce each group.
///
/// Values are sorted by fold id before summation and the output is sorted by
/// configuration index then metric name, so any permutation of `records`
/// yields the same summaries bit for bit.
pub fn summarize(records: &[MetricRecord]) -> Vec<MetricSummary> {
    let mut groups: BTreeMap<(usize, &'static str), Vec<&MetricRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.config_index, record.metric.name()))
            .or_default()
            .push(record);
    }

    groups
        .into_values()
        .filter_map(|mut group| {
            group.sort_by(|a, b| {
                a.fold_id
                    .cmp(&b.fold_id)
                    .then(a.value.total_cmp(&b.value))
            });
            let first = *group.first()?;
            let values: Vec<f64> = group.iter().map(|r| r.value).collect();
            let (mean, std_err) = mean_and_std_err(&values);
            Some(MetricSummary {
                config_index: first.config_index,
                config_id: first.config_id.clone(),
                configuration: first.configuration.clone(),
                metric: first.metric,
                mean,
                std_err,
                n: values.len(),
            })
        })
        .collect()
}

/// Per-fold means across configurations, useful for spotting a fold that is
/// unusually hard for every candidate.
pub fn summarize_by_fold(records: &[MetricRecord]) -> Vec<FoldSummary> {
    let mut groups: BTreeMap<(&str, &'static str), (Metric, Vec<(usize, f64)>)> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.fold_id.as_str(), record.metric.name()))
            .or_insert_with(|| (record.metric, Vec::new()))
            .1
            .push((record.config_index, record.value));
    }
    groups
        .into_iter()
        .map(|((fold_id, _), (metric, mut values))| {
            values.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
            let sum: f64 = values.iter().map(|(_, v)| v).sum();
            FoldSummary {
                fold_id: fold_id.to_string(),
                metric,
                mean: sum / values.len() as f64,
                n: values.len(),
            }
        })
        .collect()
}

pub(crate) fn mean_and_std_err(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, (variance / n).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(config_index: usize, fold: &str, metric: Metric, value: f64) -> MetricRecord {
        let configuration = Configuration::new().with("c", config_index);
        MetricRecord {
            config_id: configuration.id(),
            config_index,
            configuration,
            fold_id: fold.into(),
            metric,
            value,
            predictions: None,
        }
    }

    #[test]
    fn test_mean_and_standard_error() {
        let records = vec![
            record(0, "Fold1", Metric::Accuracy, 0.8),
            record(0, "Fold2", Metric::Accuracy, 0.9),
            record(0, "Fold3", Metric::Accuracy, 1.0),
        ];
        let summaries = summarize(&records);
        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.n, 3);
        assert!((s.mean - 0.9).abs() < 1e-12);
        // sample sd = 0.1, se = 0.1 / sqrt(3)
        assert!((s.std_err - 0.1 / 3f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_single_fold_has_zero_std_err() {
        let summaries = summarize(&[record(2, "validation", Metric::Rmse, 1.5)]);
        assert_eq!(summaries[0].std_err, 0.0);
        assert_eq!(summaries[0].n, 1);
    }

    #[test]
    fn test_output_sorted_by_config_then_metric() {
        let records = vec![
            record(1, "Fold1", Metric::RocAuc, 0.7),
            record(0, "Fold1", Metric::RocAuc, 0.6),
            record(1, "Fold1", Metric::Accuracy, 0.5),
        ];
        let keys: Vec<(usize, Metric)> = summarize(&records)
            .iter()
            .map(|s| (s.config_index, s.metric))
            .collect();
        assert_eq!(
            keys,
            vec![(0, Metric::RocAuc), (1, Metric::Accuracy), (1, Metric::RocAuc)]
        );
    }

    #[test]
    fn test_shuffled_records_give_identical_summaries() {
        let values = [0.1, 0.7, 0.30000000000000004, 1e-17, 0.2];
        let records: Vec<MetricRecord> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| record(0, &format!("Fold{}", i + 1), Metric::LogLoss, v))
            .collect();
        let mut reversed = records.clone();
        reversed.reverse();
        assert_eq!(summarize(&records), summarize(&reversed));
    }

    #[test]
    fn test_by_fold_means() {
        let records = vec![
            record(0, "Fold1", Metric::Accuracy, 0.5),
            record(1, "Fold1", Metric::Accuracy, 0.7),
            record(0, "Fold2", Metric::Accuracy, 0.9),
        ];
        let folds = summarize_by_fold(&records);
        assert_eq!(folds.len(), 2);
        assert_eq!(folds[0].fold_id, "Fold1");
        assert_eq!(folds[0].n, 2);
        assert!((folds[0].mean - 0.6).abs() < 1e-12);
        assert_eq!(folds[1].metric, Metric::Accuracy);
    }
}
