use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("alpha_merge must be in (0, 1), got {0}")]
    AlphaMerge(f64),
    #[error("split_threshold must be in [0, 1), got {0}")]
    SplitThreshold(f64),
}

#[derive(Debug, Error)]
pub enum ChaidError {
    #[error("must only pass numerical values to a continuous column (row {index}: got {value})")]
    NonNumeric { index: usize, value: String },

    #[error("unknown variable kind '{0}', expected nominal, ordinal or continuous")]
    UnknownKind(String),

    #[error("weights length {weights} does not match values length {values}")]
    WeightLengthMismatch { values: usize, weights: usize },

    #[error("weight at row {index} must be finite and non-negative, got {weight}")]
    InvalidWeight { index: usize, weight: f64 },

    #[error("column '{name}' has {got} rows, expected {expected}")]
    RowCountMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("predictor '{0}' is continuous; predictors must be nominal or ordinal")]
    ContinuousPredictor(String),

    #[error("{count} categories is too many to enumerate partitions (max {max})")]
    TooManyCategories { count: usize, max: usize },

    #[error("column '{0}' not found")]
    MissingColumn(String),

    #[error("tree is not fitted")]
    NotFitted,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Polars(#[from] PolarsError),
}
