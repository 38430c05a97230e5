//! Explicit Cartesian grids and regular sweeps.

use crate::error::{EngineError, EngineResult};
use crate::space::configuration::{Configuration, ParamValue};
use std::collections::HashSet;

/// An ordered set of parameters, each with ordered candidate values.
#[derive(Debug, Clone, Default)]
pub struct ParamGrid {
    params: Vec<(String, Vec<ParamValue>)>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    pub fn add<V: Into<ParamValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.params
            .push((name.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Expand the full Cartesian product. The first parameter varies slowest;
    /// value-identical configurations keep only their first occurrence.
    pub fn configurations(&self) -> EngineResult<Vec<Configuration>> {
        let mut seen_names = HashSet::new();
        for (name, values) in &self.params {
            if !seen_names.insert(name.as_str()) {
                return Err(EngineError::invalid_space(format!(
                    "parameter '{name}' declared twice"
                )));
            }
            if values.is_empty() {
                return Err(EngineError::invalid_space(format!(
                    "parameter '{name}' has no candidate values"
                )));
            }
        }

        let mut configs = vec![Configuration::new()];
        for (name, values) in &self.params {
            let mut expanded = Vec::with_capacity(configs.len() * values.len());
            for config in &configs {
                for value in values {
                    expanded.push(config.clone().with(name.clone(), value.clone()));
                }
            }
            configs = expanded;
        }

        let mut seen = HashSet::new();
        configs.retain(|c| seen.insert(c.clone()));
        Ok(configs)
    }
}

/// `n` points evenly spaced over `[from, to]`, both endpoints exact.
pub fn linear_space(from: f64, to: f64, n: usize) -> EngineResult<Vec<f64>> {
    if n == 0 {
        return Err(EngineError::invalid_space("a sweep needs at least one point"));
    }
    if !from.is_finite() || !to.is_finite() {
        return Err(EngineError::invalid_space("sweep bounds must be finite"));
    }
    if n == 1 {
        return Ok(vec![from]);
    }
    let step = (to - from) / (n - 1) as f64;
    Ok((0..n)
        .map(|i| if i == n - 1 { to } else { from + step * i as f64 })
        .collect())
}

/// `n` values `10^t` with `t` evenly spaced over `[from, to]`.
///
/// Integral exponents go through `powi`, so decade endpoints such as `1e-4`
/// come out bit-exact.
pub fn log_space(from: f64, to: f64, n: usize) -> EngineResult<Vec<f64>> {
    Ok(linear_space(from, to, n)?
        .into_iter()
        .map(pow10)
        .collect())
}

fn pow10(t: f64) -> f64 {
    if t.fract() == 0.0 && t.abs() <= 300.0 {
        let exp = t as i32;
        if exp >= 0 {
            10f64.powi(exp)
        } else {
            1.0 / 10f64.powi(-exp)
        }
    } else {
        10f64.powf(t)
    }
}
