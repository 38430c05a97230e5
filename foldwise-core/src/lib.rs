//! # foldwise-core: resampling and hyperparameter tuning
//!
//! Estimates how well a model configuration generalizes by fitting it on
//! repeated, disjoint partitions of a dataset, then picks the best of many
//! candidate configurations and refits it once on all training rows.
//!
//! The flow of a run:
//!
//! ```text
//! Dataset -> split -> {training pool, test rows}
//! training pool -> kfold / validation_split -> ResampleSet
//! ResampleSet x configurations -> evaluate -> MetricRecords
//! MetricRecords -> summarize -> select_best -> finalize -> test metrics
//! ```
//!
//! [`tuning::TuningRun`] wires these together from a [`TuningConfig`].

pub mod config;
pub mod data;
pub mod error;
pub mod estimator;
pub mod metrics;
pub mod resample;
pub mod space;
pub mod tuning;

pub use config::{ResamplingScheme, TuningConfig, load_config};
pub use data::{DataSourceType, DataView, Dataset};
pub use error::{EngineError, EngineResult, EstimatorError};
pub use estimator::{Estimator, Pipeline, Prediction, RowPrediction, Transform};
pub use metrics::{Direction, Metric};
pub use resample::{Fold, ResampleSet, Split, kfold, repeated_kfold, split, validation_split};
pub use space::{Configuration, ParamGrid, ParamRange, ParamSpace, ParamValue, SpaceDescriptor};
pub use tuning::{
    AbortHandle, EvaluationOptions, MetricRecord, MetricSummary, RecordStore, Selection,
    TuningReport, TuningRun, evaluate, finalize, select_best, summarize,
};
