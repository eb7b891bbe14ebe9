use crate::column::{Column, ColumnKind};
use crate::conf::TreeConfig;
use crate::dataframe::{raw_values_to_series, ChaidDataFrameExt, ChaidSeriesExt};
use crate::error::ChaidError;
use crate::tree::Tree;
use crate::value::RawValue;
use estimator_api::api::{Estimator, FitError, PredictError};
use polars::prelude::{DataFrame, Float64Chunked, NamedFrom, PlSmallStr, Series};
use std::collections::HashMap;

impl From<ChaidError> for FitError {
    fn from(err: ChaidError) -> Self {
        FitError::InvalidInput(err.to_string())
    }
}

impl From<ChaidError> for PredictError {
    fn from(err: ChaidError) -> Self {
        match err {
            ChaidError::NotFitted => PredictError::NotFitted,
            other => PredictError::InvalidInput(other.to_string()),
        }
    }
}

/// DataFrame front end for [`Tree`].
///
/// Every column of `x` is a predictor, nominal unless overridden with
/// [`ChaidTree::with_variable_type`]. The first column of `y` is the
/// dependent variable.
pub struct ChaidTree {
    pub config: TreeConfig,
    pub variable_types: HashMap<String, ColumnKind>,
    pub dependent_kind: ColumnKind,
    pub tree: Option<Tree>,
    predictors: Vec<String>,
    dependent_name: Option<String>,
}

impl Default for ChaidTree {
    fn default() -> Self {
        Self::new(TreeConfig::default())
    }
}

impl ChaidTree {
    pub fn new(config: TreeConfig) -> Self {
        ChaidTree {
            config,
            variable_types: HashMap::new(),
            dependent_kind: ColumnKind::Nominal,
            tree: None,
            predictors: Vec::new(),
            dependent_name: None,
        }
    }

    pub fn with_variable_type(mut self, name: &str, kind: ColumnKind) -> Self {
        self.variable_types.insert(name.to_string(), kind);
        self
    }

    pub fn with_dependent_kind(mut self, kind: ColumnKind) -> Self {
        self.dependent_kind = kind;
        self
    }

    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    pub fn predictors(&self) -> &[String] {
        &self.predictors
    }

    pub fn dependent_name(&self) -> Option<&str> {
        self.dependent_name.as_deref()
    }
}

impl Estimator for ChaidTree {
    fn _fit_impl(
        &mut self,
        x: &DataFrame,
        y: &DataFrame,
        sample_weights: Option<&Float64Chunked>,
    ) -> Result<(), FitError> {
        let target = y
            .get_columns()
            .first()
            .ok_or_else(|| FitError::InvalidInput("y has no columns".to_string()))?;

        let mut predictors = Vec::with_capacity(x.width());
        let mut names = Vec::with_capacity(x.width());
        for col in x.get_columns() {
            let name = col.name().to_string();
            let kind = self
                .variable_types
                .get(&name)
                .copied()
                .unwrap_or(ColumnKind::Nominal);
            let values = col.as_materialized_series().raw_values()?;
            predictors.push(Column::from_raw(&values, kind)?.with_name(name.as_str()));
            names.push(name);
        }

        let dep_values = target.as_materialized_series().raw_values()?;
        let mut dependent =
            Column::from_raw(&dep_values, self.dependent_kind)?.with_name(target.name().as_str());
        if let Some(w) = sample_weights {
            let weights: Vec<f64> = w.into_iter().map(|v| v.unwrap_or(0.0)).collect();
            dependent = dependent.with_weights(weights)?;
        }

        let mut tree = Tree::new(self.config.clone());
        tree.fit(predictors, dependent)?;

        self.predictors = names;
        self.dependent_name = Some(target.name().to_string());
        self.tree = Some(tree);
        Ok(())
    }

    fn _predict_impl(&self, x: &DataFrame) -> Result<DataFrame, PredictError> {
        let tree = self.tree.as_ref().ok_or(PredictError::NotFitted)?;
        let columns: Vec<&str> = self.predictors.iter().map(String::as_str).collect();
        let rows = x.row_values(&columns)?;

        let node_ids = tree.apply(&rows);
        let predictions: Vec<_> = node_ids
            .iter()
            .map(|&id| {
                tree.get_node(id)
                    .map_or(RawValue::Missing, |n| n.predict())
            })
            .collect();

        let ids: Vec<u32> = node_ids.iter().map(|&id| id as u32).collect();
        let node_id = Series::new(PlSmallStr::from_static("node_id"), ids);
        let prediction = raw_values_to_series("prediction", &predictions);
        Ok(DataFrame::new(vec![node_id.into(), prediction.into()])?)
    }
}
