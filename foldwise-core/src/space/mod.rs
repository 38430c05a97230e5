//! Configuration spaces: explicit grids, space-filling designs and random search.

pub mod configuration;
pub mod design;
pub mod grid;

pub use configuration::{Configuration, ParamValue};
pub use design::{ParamRange, ParamSpace};
pub use grid::{ParamGrid, linear_space, log_space};

use crate::error::EngineResult;
use serde::{Deserialize, Serialize};

/// A regular sweep between two bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sweep {
    pub from: f64,
    pub to: f64,
    pub points: usize,
}

/// Candidate values for one grid parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridValues {
    List(Vec<ParamValue>),
    /// `10^t` for `t` evenly spaced between the bounds.
    LogSpace { log_space: Sweep },
    LinearSpace { linear_space: Sweep },
}

impl GridValues {
    pub fn expand(&self) -> EngineResult<Vec<ParamValue>> {
        Ok(match self {
            Self::List(values) => values.clone(),
            Self::LogSpace { log_space: s } => log_space(s.from, s.to, s.points)?
                .into_iter()
                .map(ParamValue::Float)
                .collect(),
            Self::LinearSpace { linear_space: s } => linear_space(s.from, s.to, s.points)?
                .into_iter()
                .map(ParamValue::Float)
                .collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridParam {
    pub name: String,
    pub values: GridValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeParam {
    pub name: String,
    pub range: ParamRange,
}

/// Declarative description of a configuration space, as found in config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpaceDescriptor {
    Grid { params: Vec<GridParam> },
    Design { params: Vec<RangeParam>, size: usize },
    Random { params: Vec<RangeParam>, size: usize },
}

impl Default for SpaceDescriptor {
    /// A single default configuration: the estimator's own defaults.
    fn default() -> Self {
        Self::Grid { params: Vec::new() }
    }
}

impl SpaceDescriptor {
    /// Enumerate the configurations. `seed` only affects designs and random search.
    pub fn build(&self, seed: u64) -> EngineResult<Vec<Configuration>> {
        match self {
            Self::Grid { params } => {
                let mut grid = ParamGrid::new();
                for p in params {
                    grid = grid.add(p.name.clone(), p.values.expand()?);
                }
                grid.configurations()
            }
            Self::Design { params, size } => to_space(params).space_filling(*size, seed),
            Self::Random { params, size } => to_space(params).random(*size, seed),
        }
    }
}

fn to_space(params: &[RangeParam]) -> ParamSpace {
    params
        .iter()
        .fold(ParamSpace::new(), |space, p| space.add(p.name.clone(), p.range.clone()))
}
