//! Ranking summarized configurations and choosing one.

use crate::error::{EngineError, EngineResult};
use crate::metrics::{Direction, Metric};
use crate::space::Configuration;
use crate::tuning::MetricSummary;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The chosen configuration together with the ranking it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub configuration: Configuration,
    pub summary: MetricSummary,
    /// Every summary for the selection metric, best first.
    pub ranked: Vec<MetricSummary>,
}

/// Which end of a parameter's range counts as the simpler model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Simpler {
    Smaller,
    Larger,
}

/// Order two summaries best first: by mean in `direction`, then smaller
/// standard error, then earlier configuration index. Non-finite means rank
/// last in either direction.
fn compare(a: &MetricSummary, b: &MetricSummary, direction: Direction) -> Ordering {
    let by_mean = match (a.mean.is_finite(), b.mean.is_finite()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
        (true, true) => match direction {
            Direction::Maximize => b.mean.total_cmp(&a.mean),
            Direction::Minimize => a.mean.total_cmp(&b.mean),
        },
    };
    by_mean
        .then(a.std_err.total_cmp(&b.std_err))
        .then(a.config_index.cmp(&b.config_index))
}

/// Summaries for `metric`, best first.
///
/// `direction` must be the metric's own [`Metric::direction`].
pub fn rank(
    summaries: &[MetricSummary],
    metric: Metric,
    direction: Direction,
) -> EngineResult<Vec<MetricSummary>> {
    if summaries.is_empty() {
        return Err(EngineError::NoSuccessfulConfigurations);
    }
    if direction != metric.direction() {
        return Err(EngineError::invalid_input(format!(
            "{metric} is ranked by {:?}, not {direction:?}",
            metric.direction()
        )));
    }
    let mut ranked: Vec<MetricSummary> = summaries
        .iter()
        .filter(|s| s.metric == metric)
        .cloned()
        .collect();
    if ranked.is_empty() {
        return Err(EngineError::UnknownMetric {
            metric: metric.to_string(),
        });
    }
    ranked.sort_by(|a, b| compare(a, b, direction));
    Ok(ranked)
}

/// The best `n` summaries for `metric`; fewer when fewer exist.
pub fn top_n(
    summaries: &[MetricSummary],
    metric: Metric,
    direction: Direction,
    n: usize,
) -> EngineResult<Vec<MetricSummary>> {
    let mut ranked = rank(summaries, metric, direction)?;
    ranked.truncate(n);
    Ok(ranked)
}

/// The top-ranked configuration for `metric`.
pub fn select_best(
    summaries: &[MetricSummary],
    metric: Metric,
    direction: Direction,
) -> EngineResult<Selection> {
    let ranked = rank(summaries, metric, direction)?;
    let summary = ranked[0].clone();
    tracing::info!(
        metric = %metric,
        config = summary.config_index,
        mean = summary.mean,
        std_err = summary.std_err,
        "Selected best configuration"
    );
    Ok(Selection {
        configuration: summary.configuration.clone(),
        summary,
        ranked,
    })
}

/// The simplest configuration whose mean lies within one standard error of
/// the best one.
///
/// Simplicity is the value of `param`, with `simpler` saying which end wins.
/// Candidates lacking a numeric `param` rank after those that have one; any
/// remaining tie keeps the ranking order.
pub fn select_by_one_std_err(
    summaries: &[MetricSummary],
    metric: Metric,
    direction: Direction,
    param: &str,
    simpler: Simpler,
) -> EngineResult<Selection> {
    let ranked = rank(summaries, metric, direction)?;
    let best = &ranked[0];
    let within = |s: &MetricSummary| match direction {
        Direction::Maximize => s.mean >= best.mean - best.std_err,
        Direction::Minimize => s.mean <= best.mean + best.std_err,
    };

    let summary = ranked
        .iter()
        .filter(|s| within(*s))
        .min_by(|a, b| {
            let (x, y) = (a.configuration.get_f64(param), b.configuration.get_f64(param));
            match (x, y) {
                (Some(x), Some(y)) => match simpler {
                    Simpler::Smaller => x.total_cmp(&y),
                    Simpler::Larger => y.total_cmp(&x),
                },
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
            .then_with(|| compare(a, b, direction))
        })
        .cloned()
        .unwrap_or_else(|| best.clone());

    tracing::info!(
        metric = %metric,
        config = summary.config_index,
        best = best.config_index,
        param,
        "Selected simplest configuration within one standard error"
    );
    Ok(Selection {
        configuration: summary.configuration.clone(),
        summary,
        ranked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn summary(config_index: usize, k: i64, metric: Metric, mean: f64, std_err: f64) -> MetricSummary {
        let configuration = Configuration::new().with("k", k);
        MetricSummary {
            config_index,
            config_id: configuration.id(),
            configuration,
            metric,
            mean,
            std_err,
            n: 5,
        }
    }

    #[test]
    fn test_tie_on_mean_prefers_smaller_std_err() {
        let summaries = vec![
            summary(0, 1, Metric::Accuracy, 0.9, 0.01),
            summary(1, 2, Metric::Accuracy, 0.9, 0.02),
            summary(2, 3, Metric::Accuracy, 0.85, 0.0),
        ];
        let selection = select_best(&summaries, Metric::Accuracy, Direction::Maximize).unwrap();
        assert_eq!(selection.summary.config_index, 0);
        let order: Vec<usize> = selection.ranked.iter().map(|s| s.config_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_full_tie_prefers_enumeration_order() {
        let summaries = vec![
            summary(3, 1, Metric::Rmse, 1.0, 0.1),
            summary(1, 2, Metric::Rmse, 1.0, 0.1),
        ];
        let selection = select_best(&summaries, Metric::Rmse, Direction::Minimize).unwrap();
        assert_eq!(selection.summary.config_index, 1);
    }

    #[test]
    fn test_minimize_prefers_small_means() {
        let summaries = vec![
            summary(0, 1, Metric::LogLoss, 0.7, 0.0),
            summary(1, 2, Metric::LogLoss, 0.3, 0.0),
        ];
        let top = top_n(&summaries, Metric::LogLoss, Direction::Minimize, 1).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].config_index, 1);
        let all = top_n(&summaries, Metric::LogLoss, Direction::Minimize, 10).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            select_best(&[], Metric::Accuracy, Direction::Maximize),
            Err(EngineError::NoSuccessfulConfigurations)
        ));
        let summaries = vec![summary(0, 1, Metric::Accuracy, 0.5, 0.0)];
        assert!(matches!(
            rank(&summaries, Metric::RocAuc, Direction::Maximize),
            Err(EngineError::UnknownMetric { .. })
        ));
    }

    #[test]
    fn test_direction_must_match_metric() {
        let summaries = vec![summary(0, 1, Metric::RocAuc, 0.7, 0.0)];
        assert!(matches!(
            rank(&summaries, Metric::RocAuc, Direction::Minimize),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            select_best(&summaries, Metric::RocAuc, Direction::Minimize),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(rank(&summaries, Metric::RocAuc, Direction::Maximize).is_ok());
    }

    #[test]
    fn test_non_finite_means_rank_last() {
        let summaries = vec![
            summary(0, 1, Metric::RSquared, f64::NAN, 0.0),
            summary(1, 2, Metric::RSquared, 0.4, 0.1),
            summary(2, 3, Metric::RSquared, f64::INFINITY, 0.0),
        ];
        let selection = select_best(&summaries, Metric::RSquared, Direction::Maximize).unwrap();
        assert_eq!(selection.summary.config_index, 1);
        let order: Vec<usize> = selection.ranked.iter().map(|s| s.config_index).collect();
        assert_eq!(order, vec![1, 0, 2]);

        let losses = vec![
            summary(0, 1, Metric::Rmse, f64::NAN, 0.0),
            summary(1, 2, Metric::Rmse, 3.0, 0.1),
        ];
        let best = select_best(&losses, Metric::Rmse, Direction::Minimize).unwrap();
        assert_eq!(best.summary.config_index, 1);
    }

    #[test]
    fn test_one_std_err_picks_simplest_within_band() {
        let summaries = vec![
            summary(0, 1, Metric::Accuracy, 0.80, 0.01),
            summary(1, 5, Metric::Accuracy, 0.90, 0.03),
            summary(2, 9, Metric::Accuracy, 0.88, 0.02),
            summary(3, 15, Metric::Accuracy, 0.86, 0.01),
        ];
        let smaller =
            select_by_one_std_err(&summaries, Metric::Accuracy, Direction::Maximize, "k", Simpler::Smaller)
                .unwrap();
        assert_eq!(smaller.summary.config_index, 1);
        let larger =
            select_by_one_std_err(&summaries, Metric::Accuracy, Direction::Maximize, "k", Simpler::Larger)
                .unwrap();
        assert_eq!(larger.summary.config_index, 2);
    }
}
