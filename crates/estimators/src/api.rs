use polars::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FitError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Numerical error: {0}")]
    Numerical(String),
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("Model is not fitted")]
    NotFitted,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Numerical error: {0}")]
    Numerical(String),
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<PolarsError> for FitError {
    fn from(err: PolarsError) -> Self {
        FitError::InvalidInput(err.to_string())
    }
}

impl From<PolarsError> for PredictError {
    fn from(err: PolarsError) -> Self {
        PredictError::InvalidInput(err.to_string())
    }
}

/// Fit/predict interface shared by DataFrame estimators.
///
/// Implementors override the `_impl` hooks; `fit` and `predict` are the
/// public entry points.
pub trait Estimator: Sized {
    fn fit(
        &mut self,
        x: &DataFrame,
        y: &DataFrame,
        sample_weights: Option<&Float64Chunked>,
    ) -> Result<(), FitError> {
        if x.height() != y.height() {
            return Err(FitError::InvalidInput(format!(
                "x has {} rows but y has {}",
                x.height(),
                y.height()
            )));
        }
        if let Some(w) = sample_weights {
            if w.len() != x.height() {
                return Err(FitError::InvalidInput(format!(
                    "sample_weights has {} rows but x has {}",
                    w.len(),
                    x.height()
                )));
            }
        }
        self._fit_impl(x, y, sample_weights)
    }

    fn _fit_impl(
        &mut self,
        _x: &DataFrame,
        _y: &DataFrame,
        _sample_weights: Option<&Float64Chunked>,
    ) -> Result<(), FitError> {
        Err(FitError::InvalidInput(
            "Default fit implementation not provided".to_string(),
        ))
    }

    fn predict(&self, x: &DataFrame) -> Result<DataFrame, PredictError> {
        self._predict_impl(x)
    }

    fn _predict_impl(&self, _x: &DataFrame) -> Result<DataFrame, PredictError> {
        Err(PredictError::NotFitted)
    }
}
