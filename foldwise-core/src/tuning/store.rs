//! JSON Lines persistence of metric records.

use crate::error::{EngineError, EngineResult};
use crate::metrics::Metric;
use crate::space::Configuration;
use crate::tuning::MetricRecord;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// One persisted line. Predictions are never written.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    config_id: String,
    config_index: usize,
    configuration: Configuration,
    fold_id: String,
    metric: Metric,
    value: f64,
}

/// Saves and loads metric records so summaries can be recomputed without
/// re-running any fits.
pub struct RecordStore;

impl RecordStore {
    /// Write `records` to `path`, replacing any existing file atomically.
    ///
    /// Records with a non-finite value are refused before anything is written,
    /// since JSON cannot represent them.
    pub fn save(path: &Path, records: &[MetricRecord]) -> EngineResult<()> {
        if let Some(bad) = records.iter().find(|r| !r.value.is_finite()) {
            return Err(EngineError::invalid_input(format!(
                "{} of configuration {} on {} is {}, not a storable number",
                bad.metric, bad.config_index, bad.fold_id, bad.value
            )));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("jsonl.tmp");
        {
            let mut out = BufWriter::new(std::fs::File::create(&tmp)?);
            for record in records {
                let row = StoredRecord {
                    config_id: record.config_id.clone(),
                    config_index: record.config_index,
                    configuration: record.configuration.clone(),
                    fold_id: record.fold_id.clone(),
                    metric: record.metric,
                    value: record.value,
                };
                serde_json::to_writer(&mut out, &row)?;
                out.write_all(b"\n")?;
            }
            out.flush()?;
        }
        std::fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), records = records.len(), "Saved metric records");
        Ok(())
    }

    /// Read records written by [`RecordStore::save`]. Blank lines are skipped.
    pub fn load(path: &Path) -> EngineResult<Vec<MetricRecord>> {
        let reader = BufReader::new(std::fs::File::open(path)?);
        let mut records = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let row: StoredRecord = serde_json::from_str(&line).map_err(|e| {
                EngineError::invalid_input(format!("{}:{}: {e}", path.display(), idx + 1))
            })?;
            records.push(MetricRecord {
                config_id: row.config_id,
                config_index: row.config_index,
                configuration: row.configuration,
                fold_id: row.fold_id,
                metric: row.metric,
                value: row.value,
                predictions: None,
            });
        }
        tracing::debug!(path = %path.display(), records = records.len(), "Loaded metric records");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{Prediction, RowPrediction};
    use crate::tuning::summarize;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn records() -> Vec<MetricRecord> {
        let configs = [
            Configuration::new().with("neighbors", 3).with("weight", "uniform"),
            Configuration::new().with("neighbors", 7).with("penalty", 0.01),
        ];
        let mut out = Vec::new();
        for (i, configuration) in configs.iter().enumerate() {
            for (f, value) in [0.8, 0.85, 0.9].iter().enumerate() {
                out.push(MetricRecord {
                    config_id: configuration.id(),
                    config_index: i,
                    configuration: configuration.clone(),
                    fold_id: format!("Fold{}", f + 1),
                    metric: Metric::Accuracy,
                    value: value - i as f64 * 0.1,
                    predictions: Some(Arc::from(vec![RowPrediction {
                        row: f,
                        truth: json!("a"),
                        prediction: Prediction::Class {
                            label: "a".into(),
                            probabilities: Default::default(),
                        },
                    }])),
                });
            }
        }
        out
    }

    #[test]
    fn test_round_trip_preserves_summaries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs").join("records.jsonl");
        let original = records();
        RecordStore::save(&path, &original).unwrap();
        let loaded = RecordStore::load(&path).unwrap();

        assert_eq!(loaded.len(), original.len());
        assert!(loaded.iter().all(|r| r.predictions.is_none()));
        assert_eq!(summarize(&loaded), summarize(&original));
        assert!(!path.with_extension("jsonl.tmp").exists());
    }

    #[test]
    fn test_round_trip_keeps_values_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exact.jsonl");
        let mut original = records();
        original[0].value = 0.1 + 0.2;
        original[1].value = -1e-300;
        original[2].value = f64::MAX;
        RecordStore::save(&path, &original).unwrap();
        let loaded = RecordStore::load(&path).unwrap();
        let values = |rs: &[MetricRecord]| rs.iter().map(|r| r.value.to_bits()).collect::<Vec<_>>();
        assert_eq!(values(&loaded), values(&original));
    }

    #[test]
    fn test_non_finite_value_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nan.jsonl");
        let mut original = records();
        original[4].value = f64::NAN;
        let err = RecordStore::save(&path, &original).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        assert!(!path.exists());
        assert!(!path.with_extension("jsonl.tmp").exists());
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "\n{\"not\": \"a record\"}\n").unwrap();
        let err = RecordStore::load(&path).unwrap_err();
        assert!(err.to_string().contains(":2:"), "{err}");
    }
}
