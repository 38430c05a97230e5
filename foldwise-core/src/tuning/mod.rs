//! Resampled evaluation of configurations and everything downstream of it:
//! aggregation, selection, the final refit, persistence and full runs.

pub mod aggregate;
pub mod evaluate;
pub mod finalize;
pub mod run;
pub mod select;
pub mod store;

pub use aggregate::{FoldSummary, MetricSummary, summarize, summarize_by_fold};
pub use evaluate::{
    AbortHandle, Evaluation, EvaluationOptions, FailureStage, MetricGap, MetricRecord, PairFailure,
    evaluate,
};
pub use finalize::{FinalFit, TestRecord, check_leakage, finalize};
pub use run::{TuningOutcome, TuningReport, TuningRun};
pub use select::{Selection, Simpler, rank, select_best, select_by_one_std_err, top_n};
pub use store::RecordStore;
