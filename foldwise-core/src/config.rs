//! Configuration types for a tuning run, and layered loading.
//!
//! Sources are merged in order, later ones winning: built-in defaults, the
//! user config file, an explicit config file, then `FOLDWISE_*` environment
//! variables (`__` separates nested keys, e.g. `FOLDWISE_RESAMPLING__FOLDS=10`).

use crate::error::{EngineError, EngineResult};
use crate::metrics::Metric;
use crate::space::SpaceDescriptor;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything needed to drive a [`crate::tuning::TuningRun`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Seed for every random draw in the run.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Share of rows held back as the final test set.
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    /// Categorical column to stratify every partition on.
    #[serde(default)]
    pub stratify_by: Option<String>,
    #[serde(default)]
    pub resampling: ResamplingScheme,
    #[serde(default)]
    pub space: SpaceDescriptor,
    /// Metrics to compute; the first one drives selection.
    #[serde(default = "default_metrics")]
    pub metrics: Vec<Metric>,
    /// Worker threads (defaults to the number of cores).
    #[serde(default)]
    pub parallelism: Option<usize>,
    #[serde(default)]
    pub keep_predictions: bool,
    /// Stop dispatching new fits after this many seconds.
    #[serde(default)]
    pub time_budget_secs: Option<u64>,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            test_fraction: default_test_fraction(),
            stratify_by: None,
            resampling: ResamplingScheme::default(),
            space: SpaceDescriptor::default(),
            metrics: default_metrics(),
            parallelism: None,
            keep_predictions: false,
            time_budget_secs: None,
        }
    }
}

fn default_seed() -> u64 {
    42
}

fn default_test_fraction() -> f64 {
    0.25
}

fn default_metrics() -> Vec<Metric> {
    vec![Metric::Accuracy]
}

fn default_folds() -> usize {
    5
}

fn default_repeats() -> usize {
    1
}

fn default_validation_fraction() -> f64 {
    0.8
}

/// How the training pool is resampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResamplingScheme {
    /// One split; `fraction` is the share used for fitting.
    Validation {
        #[serde(default = "default_validation_fraction")]
        fraction: f64,
    },
    KFold {
        #[serde(default = "default_folds")]
        folds: usize,
        #[serde(default = "default_repeats")]
        repeats: usize,
    },
}

impl Default for ResamplingScheme {
    fn default() -> Self {
        Self::KFold {
            folds: default_folds(),
            repeats: default_repeats(),
        }
    }
}

impl TuningConfig {
    /// Reject values that would only fail later, mid-run.
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(EngineError::Config(format!(
                "test_fraction must lie strictly between 0 and 1, got {}",
                self.test_fraction
            )));
        }
        if self.metrics.is_empty() {
            return Err(EngineError::Config("at least one metric is required".into()));
        }
        if self.parallelism == Some(0) {
            return Err(EngineError::Config("parallelism must be at least 1".into()));
        }
        match self.resampling {
            ResamplingScheme::Validation { fraction } if !(fraction > 0.0 && fraction < 1.0) => {
                Err(EngineError::Config(format!(
                    "validation fraction must lie strictly between 0 and 1, got {fraction}"
                )))
            }
            ResamplingScheme::KFold { folds, .. } if folds < 2 => Err(EngineError::Config(
                format!("k-fold resampling needs at least 2 folds, got {folds}"),
            )),
            ResamplingScheme::KFold { repeats: 0, .. } => {
                Err(EngineError::Config("repeats must be at least 1".into()))
            }
            _ => Ok(()),
        }
    }

    /// The metric that drives selection.
    pub fn primary_metric(&self) -> EngineResult<Metric> {
        self.metrics
            .first()
            .copied()
            .ok_or_else(|| EngineError::Config("at least one metric is required".into()))
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_secs.map(Duration::from_secs)
    }
}

/// `config.toml` in the per-user configuration directory, when one exists.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "foldwise", "foldwise")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load a [`TuningConfig`] from every layer, `explicit` last among files.
pub fn load_config(explicit: Option<&Path>) -> EngineResult<TuningConfig> {
    let mut figment = Figment::from(Serialized::defaults(TuningConfig::default()));

    if let Some(user_config) = user_config_path().filter(|p| p.exists()) {
        figment = figment.merge(Toml::file(user_config));
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(EngineError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("FOLDWISE_").split("__"));

    let config: TuningConfig = figment.extract()?;
    config.validate()?;
    tracing::debug!(seed = config.seed, metrics = config.metrics.len(), "Loaded tuning config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = TuningConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.test_fraction, 0.25);
        assert_eq!(
            config.resampling,
            ResamplingScheme::KFold {
                folds: 5,
                repeats: 1
            }
        );
        assert_eq!(config.primary_metric().unwrap(), Metric::Accuracy);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TuningConfig = toml::from_str(
            r#"
            seed = 7
            metrics = ["roc_auc", "accuracy"]

            [resampling]
            type = "validation"
            "#,
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.resampling, ResamplingScheme::Validation { fraction: 0.8 });
        assert_eq!(config.primary_metric().unwrap(), Metric::RocAuc);
        assert_eq!(config.test_fraction, 0.25);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = TuningConfig {
            test_fraction: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TuningConfig {
            resampling: ResamplingScheme::KFold {
                folds: 1,
                repeats: 1,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TuningConfig {
            metrics: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_file_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tune.toml");
        std::fs::write(
            &path,
            r#"
            test_fraction = 0.2
            stratify_by = "species"

            [resampling]
            type = "k_fold"
            folds = 10
            repeats = 3

            [space]
            type = "design"
            size = 12
            params = [{ name = "neighbors", range = { type = "int", min = 1, max = 25 } }]
            "#,
        )
        .unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.test_fraction, 0.2);
        assert_eq!(config.stratify_by.as_deref(), Some("species"));
        assert_eq!(
            config.resampling,
            ResamplingScheme::KFold {
                folds: 10,
                repeats: 3
            }
        );
        assert!(matches!(config.space, SpaceDescriptor::Design { size: 12, .. }));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
