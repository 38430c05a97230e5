//! Datasets, borrowed row views, and file-backed data sources.

pub mod dataset;
pub mod source;

pub use dataset::{DataView, Dataset, category_of, numeric_of};
pub use source::DataSourceType;
