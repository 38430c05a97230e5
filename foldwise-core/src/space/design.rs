//! Space-filling and random designs over bounded parameter ranges.

use crate::error::{EngineError, EngineResult};
use crate::space::configuration::{Configuration, ParamValue};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Number of Latin hypercube candidates drawn per max-min design.
const DESIGN_CANDIDATES: usize = 32;

/// Bounds for one tunable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamRange {
    Float {
        min: f64,
        max: f64,
        #[serde(default)]
        log_scale: bool,
    },
    Int {
        min: i64,
        max: i64,
    },
}

impl ParamRange {
    fn validate(&self, name: &str) -> EngineResult<()> {
        match *self {
            Self::Float {
                min,
                max,
                log_scale,
            } => {
                if !min.is_finite() || !max.is_finite() || min > max {
                    return Err(EngineError::invalid_space(format!(
                        "parameter '{name}' has invalid bounds [{min}, {max}]"
                    )));
                }
                if log_scale && min <= 0.0 {
                    return Err(EngineError::invalid_space(format!(
                        "parameter '{name}' is log-scaled but its lower bound {min} is not positive"
                    )));
                }
            }
            Self::Int { min, max } => {
                if min > max {
                    return Err(EngineError::invalid_space(format!(
                        "parameter '{name}' has invalid bounds [{min}, {max}]"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Map a unit-interval coordinate into the range.
    fn decode(&self, u: f64) -> ParamValue {
        let u = u.clamp(0.0, 1.0);
        match *self {
            Self::Float {
                min,
                max,
                log_scale: false,
            } => ParamValue::Float((min * (1.0 - u) + max * u).clamp(min, max)),
            Self::Float {
                min,
                max,
                log_scale: true,
            } => {
                let (lo, hi) = (min.log10(), max.log10());
                ParamValue::Float(10f64.powf(lo + u * (hi - lo)).clamp(min, max))
            }
            Self::Int { min, max } => {
                // i128 keeps the full i64 range from overflowing
                let (lo, hi) = (i128::from(min), i128::from(max));
                let offset = (u * (hi - lo + 1) as f64).floor() as i128;
                ParamValue::Int((lo + offset).clamp(lo, hi) as i64)
            }
        }
    }

    pub fn contains(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (Self::Float { min, max, .. }, ParamValue::Float(v)) => v >= min && v <= max,
            (Self::Int { min, max }, ParamValue::Int(v)) => v >= min && v <= max,
            _ => false,
        }
    }
}

/// An ordered collection of named parameter ranges.
#[derive(Debug, Clone, Default)]
pub struct ParamSpace {
    params: Vec<(String, ParamRange)>,
}

impl ParamSpace {
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    pub fn add(mut self, name: impl Into<String>, range: ParamRange) -> Self {
        self.params.push((name.into(), range));
        self
    }

    pub fn params(&self) -> &[(String, ParamRange)] {
        &self.params
    }

    fn validate(&self, size: usize) -> EngineResult<()> {
        if self.params.is_empty() {
            return Err(EngineError::invalid_space("no parameters to design over"));
        }
        if size == 0 {
            return Err(EngineError::invalid_space("design size must be positive"));
        }
        let mut names = HashSet::new();
        for (name, range) in &self.params {
            if !names.insert(name.as_str()) {
                return Err(EngineError::invalid_space(format!(
                    "parameter '{name}' declared twice"
                )));
            }
            range.validate(name)?;
        }
        Ok(())
    }

    /// Max-min Latin hypercube design of `size` points.
    ///
    /// Draws [`DESIGN_CANDIDATES`] Latin hypercubes from the seeded generator
    /// and keeps the one with the largest minimum pairwise distance in the
    /// unit cube (earliest candidate wins ties). Integer parameters can make
    /// points collide after rounding; collisions are dropped, so the result may
    /// hold fewer than `size` configurations when an integer range is narrow.
    pub fn space_filling(&self, size: usize, seed: u64) -> EngineResult<Vec<Configuration>> {
        self.validate(size)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let dims = self.params.len();

        let mut best: Option<(f64, Vec<Vec<f64>>)> = None;
        for _ in 0..DESIGN_CANDIDATES {
            let points = latin_hypercube(&mut rng, size, dims);
            let score = min_pairwise_distance(&points);
            if best.as_ref().is_none_or(|(s, _)| score > *s) {
                best = Some((score, points));
            }
        }
        let (score, points) = best.ok_or_else(|| EngineError::invalid_space("empty design"))?;
        tracing::debug!(size, dims, min_distance = score, "Built max-min Latin hypercube");
        Ok(self.decode_points(&points))
    }

    /// `size` independent uniform draws (log-uniform for log-scaled ranges).
    pub fn random(&self, size: usize, seed: u64) -> EngineResult<Vec<Configuration>> {
        self.validate(size)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let points: Vec<Vec<f64>> = (0..size)
            .map(|_| (0..self.params.len()).map(|_| rng.r#gen::<f64>()).collect())
            .collect();
        Ok(self.decode_points(&points))
    }

    fn decode_points(&self, points: &[Vec<f64>]) -> Vec<Configuration> {
        let mut seen = HashSet::new();
        points
            .iter()
            .map(|point| {
                self.params
                    .iter()
                    .zip(point)
                    .map(|((name, range), &u)| (name.clone(), range.decode(u)))
                    .collect::<Configuration>()
            })
            .filter(|c| seen.insert(c.clone()))
            .collect()
    }
}

/// One Latin hypercube sample: each dimension is split into `n` strata and
/// every stratum holds exactly one point.
fn latin_hypercube(rng: &mut StdRng, n: usize, dims: usize) -> Vec<Vec<f64>> {
    let mut points = vec![vec![0.0; dims]; n];
    for d in 0..dims {
        let mut strata: Vec<usize> = (0..n).collect();
        strata.shuffle(rng);
        for (point, stratum) in points.iter_mut().zip(strata) {
            point[d] = (stratum as f64 + rng.r#gen::<f64>()) / n as f64;
        }
    }
    points
}

fn min_pairwise_distance(points: &[Vec<f64>]) -> f64 {
    let mut min = f64::INFINITY;
    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            let dist = points[i]
                .iter()
                .zip(&points[j])
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            min = min.min(dist);
        }
    }
    min
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> ParamSpace {
        ParamSpace::new()
            .add(
                "penalty",
                ParamRange::Float {
                    min: 1e-4,
                    max: 1.0,
                    log_scale: true,
                },
            )
            .add(
                "mixture",
                ParamRange::Float {
                    min: 0.0,
                    max: 1.0,
                    log_scale: false,
                },
            )
            .add("trees", ParamRange::Int { min: 100, max: 2000 })
    }

    #[test]
    fn test_design_within_bounds() {
        let space = space();
        let configs = space.space_filling(25, 7).unwrap();
        assert_eq!(configs.len(), 25);
        for config in &configs {
            for (name, range) in space.params() {
                assert!(range.contains(config.get(name).unwrap()), "{name} out of range");
            }
        }
    }

    #[test]
    fn test_design_is_deterministic() {
        let a = space().space_filling(10, 42).unwrap();
        let b = space().space_filling(10, 42).unwrap();
        assert_eq!(a, b);
        let c = space().space_filling(10, 43).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_latin_hypercube_one_point_per_stratum() {
        let mut rng = StdRng::seed_from_u64(3);
        let points = latin_hypercube(&mut rng, 8, 2);
        for d in 0..2 {
            let mut strata: Vec<usize> = points.iter().map(|p| (p[d] * 8.0) as usize).collect();
            strata.sort_unstable();
            assert_eq!(strata, (0..8).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_narrow_int_range_deduplicates() {
        let space = ParamSpace::new().add("k", ParamRange::Int { min: 1, max: 3 });
        let configs = space.space_filling(3, 1).unwrap();
        assert_eq!(configs.len(), 3);
        let configs = space.random(50, 1).unwrap();
        assert!(configs.len() <= 3);
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        let bad = ParamSpace::new().add(
            "penalty",
            ParamRange::Float {
                min: 0.0,
                max: 1.0,
                log_scale: true,
            },
        );
        assert!(bad.space_filling(5, 1).is_err());
        let inverted = ParamSpace::new().add("k", ParamRange::Int { min: 5, max: 1 });
        assert!(inverted.random(5, 1).is_err());
        assert!(space().space_filling(0, 1).is_err());
    }

    #[test]
    fn test_full_width_ranges_stay_in_bounds() {
        let ints = ParamRange::Int {
            min: i64::MIN,
            max: i64::MAX,
        };
        assert_eq!(ints.decode(0.0), ParamValue::Int(i64::MIN));
        assert_eq!(ints.decode(1.0), ParamValue::Int(i64::MAX));
        let floats = ParamRange::Float {
            min: -f64::MAX,
            max: f64::MAX,
            log_scale: false,
        };
        assert_eq!(floats.decode(0.0), ParamValue::Float(-f64::MAX));
        assert_eq!(floats.decode(1.0), ParamValue::Float(f64::MAX));

        let space = ParamSpace::new()
            .add("seed", ints.clone())
            .add("offset", floats.clone());
        for config in space.space_filling(16, 5).unwrap().iter().chain(&space.random(16, 5).unwrap()) {
            assert!(ints.contains(config.get("seed").unwrap()));
            assert!(floats.contains(config.get("offset").unwrap()));
        }
    }

    #[test]
    fn test_random_is_deterministic() {
        assert_eq!(space().random(5, 9).unwrap(), space().random(5, 9).unwrap());
    }
}
