//! Transform + estimator composition that never fits on held-out rows.

use crate::data::DataView;
use crate::error::EstimatorError;
use crate::estimator::{Estimator, Prediction, Transform};
use crate::space::Configuration;

/// Fits `transform` on the training rows, then `estimator` on the
/// transformed training rows. Prediction re-applies the *fitted* transform,
/// so statistics learned from a fold's training rows are the only ones ever
/// used on its holdout.
#[derive(Debug, Clone)]
pub struct Pipeline<T, E> {
    transform: T,
    estimator: E,
    name: String,
}

/// The fitted transform and model, carried together.
#[derive(Debug, Clone)]
pub struct PipelineModel<F, M> {
    pub transform: F,
    pub model: M,
}

impl<T: Transform, E: Estimator> Pipeline<T, E> {
    pub fn new(transform: T, estimator: E) -> Self {
        let name = format!("pipeline({})", estimator.name());
        Self {
            transform,
            estimator,
            name,
        }
    }
}

impl<T: Transform, E: Estimator> Estimator for Pipeline<T, E> {
    type Model = PipelineModel<T::Fitted, E::Model>;

    fn name(&self) -> &str {
        &self.name
    }

    fn fit(
        &self,
        train: DataView<'_>,
        config: &Configuration,
    ) -> Result<Self::Model, EstimatorError> {
        let transform = self.transform.fit(train)?;
        let prepared = self.transform.apply(&transform, train)?;
        let model = self.estimator.fit(prepared.view(), config)?;
        Ok(PipelineModel { transform, model })
    }

    fn predict(
        &self,
        model: &Self::Model,
        data: DataView<'_>,
    ) -> Result<Vec<Prediction>, EstimatorError> {
        let prepared = self.transform.apply(&model.transform, data)?;
        if prepared.row_count() != data.len() {
            return Err(EstimatorError::new(format!(
                "transform returned {} row(s) for {} input row(s)",
                prepared.row_count(),
                data.len()
            )));
        }
        self.estimator.predict(&model.model, prepared.view())
    }
}
