//! Data sources for loading a [`Dataset`] from disk.

use crate::data::dataset::Dataset;
use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Where to read a dataset from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataSourceType {
    Csv {
        path: PathBuf,
        #[serde(default = "default_delimiter")]
        delimiter: char,
    },
    /// A JSON array of objects.
    Json { path: PathBuf },
    /// One JSON object per line.
    Jsonl { path: PathBuf },
}

fn default_delimiter() -> char {
    ','
}

impl DataSourceType {
    /// Pick a source from the file extension (`.csv`, `.jsonl`/`.ndjson`, else JSON).
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("csv") => Self::Csv {
                path: path.to_path_buf(),
                delimiter: default_delimiter(),
            },
            Some("jsonl") | Some("ndjson") => Self::Jsonl {
                path: path.to_path_buf(),
            },
            _ => Self::Json {
                path: path.to_path_buf(),
            },
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Csv { path, .. } | Self::Json { path } | Self::Jsonl { path } => path,
        }
    }

    /// Load the whole source with `outcome` as the outcome column.
    pub fn load(&self, outcome: &str) -> EngineResult<Dataset> {
        let content = std::fs::read_to_string(self.path())?;
        let dataset = match self {
            Self::Csv { delimiter, .. } => parse_csv(&content, *delimiter, outcome)?,
            Self::Json { .. } => {
                let value: Value = serde_json::from_str(&content)?;
                let Value::Array(items) = value else {
                    return Err(EngineError::dataset("JSON dataset must be an array of objects"));
                };
                Dataset::from_objects(into_objects(items)?, outcome)?
            }
            Self::Jsonl { .. } => {
                let mut items = Vec::new();
                for line in content.lines() {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    items.push(serde_json::from_str(line)?);
                }
                Dataset::from_objects(into_objects(items)?, outcome)?
            }
        };
        tracing::debug!(
            path = %self.path().display(),
            rows = dataset.row_count(),
            columns = dataset.columns().len(),
            "Loaded dataset"
        );
        Ok(dataset)
    }
}

fn into_objects(items: Vec<Value>) -> EngineResult<Vec<serde_json::Map<String, Value>>> {
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(map) => Ok(map),
            _ => Err(EngineError::dataset(format!("record {idx} is not a JSON object"))),
        })
        .collect()
}

fn parse_csv(content: &str, delimiter: char, outcome: &str) -> EngineResult<Dataset> {
    let mut lines = content.lines();
    let columns: Vec<String> = lines
        .next()
        .ok_or_else(|| EngineError::dataset("Empty CSV file"))?
        .split(delimiter)
        .map(|s| s.trim().trim_matches('"').to_string())
        .collect();

    let rows = lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split(delimiter).map(parse_cell).collect())
        .collect();
    Dataset::new(columns, rows, outcome)
}

fn parse_cell(raw: &str) -> Value {
    let s = raw.trim().trim_matches('"');
    if s.is_empty() || s.eq_ignore_ascii_case("na") {
        Value::Null
    } else if let Ok(i) = s.parse::<i64>() {
        Value::Number(i.into())
    } else if let Ok(f) = s.parse::<f64>() {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(s.to_string()))
    } else if s == "true" || s == "false" {
        Value::Bool(s == "true")
    } else {
        Value::String(s.to_string())
    }
}
