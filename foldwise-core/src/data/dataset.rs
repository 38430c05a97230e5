//! Immutable tabular dataset and borrowed row views.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An ordered, immutable set of rows with a designated outcome column.
///
/// Cells are stored row-major as `serde_json::Value`s. Every operation that
/// "changes" data (transforms, materializing a subset) produces a new
/// `Dataset`; nothing mutates in place after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    outcome: usize,
    predictors: Vec<usize>,
}

impl Dataset {
    /// Build a dataset; every non-outcome column becomes a predictor.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>, outcome: &str) -> EngineResult<Self> {
        let outcome_idx = columns
            .iter()
            .position(|c| c == outcome)
            .ok_or_else(|| EngineError::unknown_column(outcome))?;
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(EngineError::dataset(format!(
                "row {idx} has {} cells, expected {}",
                row.len(),
                columns.len()
            )));
        }
        let predictors = (0..columns.len()).filter(|&i| i != outcome_idx).collect();
        Ok(Self {
            columns,
            rows,
            outcome: outcome_idx,
            predictors,
        })
    }

    /// Build a dataset from JSON objects. Columns follow first-seen key order;
    /// keys missing from an object become `null`.
    pub fn from_objects(
        objects: Vec<serde_json::Map<String, Value>>,
        outcome: &str,
    ) -> EngineResult<Self> {
        let mut columns: Vec<String> = Vec::new();
        for obj in &objects {
            for key in obj.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        let rows = objects
            .into_iter()
            .map(|mut obj| {
                columns
                    .iter()
                    .map(|c| obj.remove(c).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Self::new(columns, rows, outcome)
    }

    /// Restrict the predictor set to the named columns.
    pub fn with_predictors(mut self, names: &[&str]) -> EngineResult<Self> {
        let mut predictors = Vec::with_capacity(names.len());
        for name in names {
            let idx = self.column_index(name)?;
            if idx == self.outcome {
                return Err(EngineError::invalid_input(format!(
                    "outcome column '{name}' cannot be a predictor"
                )));
            }
            predictors.push(idx);
        }
        self.predictors = predictors;
        Ok(self)
    }

    /// New dataset with the same schema and different rows.
    pub fn with_rows(&self, rows: Vec<Vec<Value>>) -> EngineResult<Self> {
        let mut out = Self::new(self.columns.clone(), rows, self.outcome_name())?;
        out.predictors = self.predictors.clone();
        Ok(out)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn outcome_index(&self) -> usize {
        self.outcome
    }

    pub fn outcome_name(&self) -> &str {
        &self.columns[self.outcome]
    }

    pub fn predictor_indices(&self) -> &[usize] {
        &self.predictors
    }

    pub fn predictor_names(&self) -> Vec<&str> {
        self.predictors
            .iter()
            .map(|&i| self.columns[i].as_str())
            .collect()
    }

    pub fn column_index(&self, name: &str) -> EngineResult<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| EngineError::unknown_column(name))
    }

    /// Row by absolute index. Panics when out of range, like slice indexing.
    pub fn row(&self, idx: usize) -> &[Value] {
        &self.rows[idx]
    }

    /// View over every row.
    pub fn view(&self) -> DataView<'_> {
        DataView {
            dataset: self,
            rows: None,
        }
    }

    /// View over the given absolute row indices.
    pub fn subset<'a>(&'a self, rows: &'a [usize]) -> DataView<'a> {
        DataView {
            dataset: self,
            rows: Some(rows),
        }
    }
}

/// A borrowed window over some rows of a [`Dataset`].
///
/// Positions (`0..len()`) are local to the view; row ids are absolute indices
/// into the underlying dataset, so partitions computed on a view can be
/// compared directly with partitions of the full dataset.
#[derive(Debug, Clone, Copy)]
pub struct DataView<'a> {
    dataset: &'a Dataset,
    rows: Option<&'a [usize]>,
}

impl<'a> DataView<'a> {
    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn len(&self) -> usize {
        match self.rows {
            Some(rows) => rows.len(),
            None => self.dataset.row_count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Absolute row id at a view position.
    pub fn row_id(&self, pos: usize) -> usize {
        match self.rows {
            Some(rows) => rows[pos],
            None => pos,
        }
    }

    pub fn row_ids(&self) -> impl Iterator<Item = usize> + 'a {
        let view = *self;
        (0..view.len()).map(move |pos| view.row_id(pos))
    }

    /// Rows in view order, paired with their absolute ids.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &'a [Value])> + 'a {
        let dataset = self.dataset;
        self.row_ids().map(move |id| (id, dataset.row(id)))
    }

    pub fn outcome(&self, pos: usize) -> &'a Value {
        &self.dataset.row(self.row_id(pos))[self.dataset.outcome]
    }

    pub fn value(&self, pos: usize, column: usize) -> &'a Value {
        &self.dataset.row(self.row_id(pos))[column]
    }

    /// Copy the viewed rows into a standalone dataset (row ids restart at 0).
    pub fn materialize(&self) -> EngineResult<Dataset> {
        let rows = self.rows().map(|(_, row)| row.to_vec()).collect();
        self.dataset.with_rows(rows)
    }
}

/// Category label of a cell, if the cell is categorical.
///
/// Strings, booleans and integers are categorical; floats, nulls, arrays and
/// objects are not.
pub fn category_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// Numeric value of a cell. Booleans count as 0/1; numeric strings are parsed.
pub fn numeric_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Dataset {
        Dataset::new(
            vec!["x".into(), "y".into(), "label".into()],
            vec![
                vec![json!(1.0), json!(2), json!("a")],
                vec![json!(3.0), json!(4), json!("b")],
                vec![json!(5.0), json!(6), json!("a")],
            ],
            "label",
        )
        .unwrap()
    }

    #[test]
    fn test_predictors_default_to_non_outcome_columns() {
        let ds = sample();
        assert_eq!(ds.outcome_name(), "label");
        assert_eq!(ds.predictor_names(), vec!["x", "y"]);
    }

    #[test]
    fn test_unknown_outcome_rejected() {
        let err = Dataset::new(vec!["x".into()], vec![], "missing").unwrap_err();
        assert!(matches!(err, EngineError::UnknownColumn { .. }));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = Dataset::new(
            vec!["x".into(), "y".into()],
            vec![vec![json!(1)]],
            "y",
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Dataset(_)));
    }

    #[test]
    fn test_subset_view_uses_absolute_ids() {
        let ds = sample();
        let ids = [2, 0];
        let view = ds.subset(&ids);
        assert_eq!(view.len(), 2);
        assert_eq!(view.row_ids().collect::<Vec<_>>(), vec![2, 0]);
        assert_eq!(view.outcome(0), &json!("a"));
        assert_eq!(view.value(1, 0), &json!(1.0));
    }

    #[test]
    fn test_materialize_copies_rows() {
        let ds = sample();
        let ids = [1];
        let copy = ds.subset(&ids).materialize().unwrap();
        assert_eq!(copy.row_count(), 1);
        assert_eq!(copy.row(0)[2], json!("b"));
        assert_eq!(ds.row_count(), 3);
    }

    #[test]
    fn test_from_objects_fills_missing_keys() {
        let objects = vec![
            json!({"a": 1, "out": "x"}).as_object().cloned().unwrap(),
            json!({"out": "y", "b": true}).as_object().cloned().unwrap(),
        ];
        let ds = Dataset::from_objects(objects, "out").unwrap();
        assert_eq!(ds.columns().len(), 3);
        let b = ds.column_index("b").unwrap();
        assert_eq!(ds.row(0)[b], Value::Null);
    }

    #[test]
    fn test_category_of() {
        assert_eq!(category_of(&json!("cat")), Some("cat".into()));
        assert_eq!(category_of(&json!(3)), Some("3".into()));
        assert_eq!(category_of(&json!(true)), Some("true".into()));
        assert_eq!(category_of(&json!(0.5)), None);
        assert_eq!(category_of(&Value::Null), None);
    }
}
