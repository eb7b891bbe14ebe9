use crate::column::{Column, ColumnKind};
use crate::conf::TreeConfig;
use crate::dataframe::ChaidSeriesExt;
use crate::error::ChaidError;
use crate::node::Node;
use crate::split::InvalidSplitReason;
use crate::stats::{SplitSearch, Stats};
use crate::value::RawValue;
use polars::prelude::{DataFrame, DataType};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// A fitted CHAID tree.
///
/// Nodes are stored in pre-order: a parent always precedes its children and
/// every subtree is contiguous, so `get_node(id)` indexes straight into the
/// node list.
#[derive(Debug, Clone)]
pub struct Tree {
    config: TreeConfig,
    nodes: Vec<Node>,
    children: Vec<Vec<usize>>,
    predictor_names: Vec<String>,
    observed: Vec<RawValue>,
}

impl Tree {
    pub fn new(config: TreeConfig) -> Self {
        Tree {
            config,
            nodes: Vec::new(),
            children: Vec::new(),
            predictor_names: Vec::new(),
            observed: Vec::new(),
        }
    }

    /// Loads predictors and the dependent variable from `df` and fits a tree.
    ///
    /// `weight` names an optional column of non-negative row weights; nulls
    /// are treated as zero weight.
    pub fn from_dataframe(
        df: &DataFrame,
        predictors: &[(&str, ColumnKind)],
        dependent: (&str, ColumnKind),
        weight: Option<&str>,
        config: TreeConfig,
    ) -> Result<Self, ChaidError> {
        let load = |name: &str, kind: ColumnKind| -> Result<Column, ChaidError> {
            let series = df
                .column(name)
                .map_err(|_| ChaidError::MissingColumn(name.to_string()))?
                .as_materialized_series();
            Ok(Column::from_raw(&series.raw_values()?, kind)?.with_name(name))
        };

        let ind = predictors
            .iter()
            .map(|(name, kind)| load(name, *kind))
            .collect::<Result<Vec<_>, _>>()?;
        let mut dep = load(dependent.0, dependent.1)?;
        if let Some(name) = weight {
            let weights = df
                .column(name)
                .map_err(|_| ChaidError::MissingColumn(name.to_string()))?
                .as_materialized_series()
                .cast(&DataType::Float64)?;
            let weights: Vec<f64> = weights.f64()?.into_iter().map(|w| w.unwrap_or(0.0)).collect();
            dep = dep.with_weights(weights)?;
        }

        let mut tree = Tree::new(config);
        tree.fit(ind, dep)?;
        Ok(tree)
    }

    /// Grows the tree. Weights, when present, are taken from `dependent`.
    pub fn fit(&mut self, predictors: Vec<Column>, dependent: Column) -> Result<(), ChaidError> {
        self.config.validate()?;

        let n_rows = dependent.len();
        let mut ind = Vec::with_capacity(predictors.len());
        for (i, column) in predictors.into_iter().enumerate() {
            let column = match column.name() {
                Some(_) => column,
                None => column.with_name(i.to_string()),
            };
            let name = column.name().unwrap_or_default().to_string();
            if column.kind() == ColumnKind::Continuous {
                return Err(ChaidError::ContinuousPredictor(name));
            }
            if column.len() != n_rows {
                return Err(ChaidError::RowCountMismatch {
                    name,
                    expected: n_rows,
                    got: column.len(),
                });
            }
            ind.push(column);
        }

        info!(
            rows = n_rows,
            predictors = ind.len(),
            dependent = %dependent.kind(),
            "building CHAID tree"
        );

        self.predictor_names = ind
            .iter()
            .map(|c| c.name().unwrap_or_default().to_string())
            .collect();
        self.observed = dependent.raw_values();

        let mut builder = DepthFirstTreeBuilder {
            config: &self.config,
            stats: Stats::new(self.config.split_restrictions(), &dependent),
            nodes: Vec::new(),
        };
        builder.build_node((0..n_rows).collect(), ind, dependent, 0, None, Vec::new());
        self.nodes = builder.nodes;

        self.children = vec![Vec::new(); self.nodes.len()];
        for node in &self.nodes {
            if let Some(parent) = node.parent {
                self.children[parent].push(node.node_id);
            }
        }

        info!(
            nodes = self.nodes.len(),
            terminal = self.terminal_nodes().len(),
            "CHAID tree built"
        );
        Ok(())
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn get_node(&self, node_id: usize) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn children(&self, node_id: usize) -> &[usize] {
        self.children.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn predictor_names(&self) -> &[String] {
        &self.predictor_names
    }

    pub fn terminal_nodes(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .filter(|n| n.is_terminal())
            .map(|n| n.node_id)
            .collect()
    }

    pub fn depth(&self, node_id: usize) -> usize {
        let mut depth = 0;
        let mut current = self.get_node(node_id).and_then(|n| n.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.nodes[parent].parent;
        }
        depth
    }

    /// Terminal node id of every training row.
    pub fn node_predictions(&self) -> Vec<usize> {
        let mut pred = vec![0; self.observed.len()];
        for node in self.nodes.iter().filter(|n| n.is_terminal()) {
            for &row in &node.indices {
                pred[row] = node.node_id;
            }
        }
        pred
    }

    /// Prediction of the terminal node of every training row: the most
    /// frequent category, or the node mean for continuous dependents.
    pub fn model_predictions(&self) -> Vec<RawValue> {
        let mut pred = vec![RawValue::Missing; self.observed.len()];
        for node in self.nodes.iter().filter(|n| n.is_terminal()) {
            let value = node.predict();
            for &row in &node.indices {
                pred[row] = value.clone();
            }
        }
        pred
    }

    /// Fraction of training rows whose prediction matches the observation.
    pub fn accuracy(&self) -> Result<f64, ChaidError> {
        if !self.is_fitted() {
            return Err(ChaidError::NotFitted);
        }
        Ok(self.score(&self.model_predictions(), &self.observed))
    }

    pub fn risk(&self) -> Result<f64, ChaidError> {
        Ok(1.0 - self.accuracy()?)
    }

    fn score(&self, predicted: &[RawValue], observed: &[RawValue]) -> f64 {
        if observed.is_empty() {
            return 0.0;
        }
        let correct = predicted
            .iter()
            .zip(observed)
            .filter(|(p, o)| p == o)
            .count();
        correct as f64 / observed.len() as f64
    }

    /// Routes observations down the tree and returns the id of the node each
    /// one stops at. `rows[i][p]` is the value of predictor `p` for row `i`.
    /// A value not seen at a split leaves the row at that internal node.
    pub fn apply(&self, rows: &[Vec<RawValue>]) -> Vec<usize> {
        rows.iter().map(|row| self.route(row)).collect()
    }

    fn route(&self, row: &[RawValue]) -> usize {
        let mut current = 0;
        loop {
            let Some(node) = self.get_node(current) else {
                return current;
            };
            let Some(index) = node.split.predictor_index() else {
                return current;
            };
            let value = row.get(index).cloned().unwrap_or(RawValue::Missing);
            let next = self
                .children(current)
                .iter()
                .find(|&&child| self.nodes[child].choices.contains(&value));
            match next {
                Some(&child) => current = child,
                None => return current,
            }
        }
    }

    pub fn predict(&self, rows: &[Vec<RawValue>]) -> Vec<RawValue> {
        self.apply(rows)
            .into_iter()
            .map(|id| self.get_node(id).map_or(RawValue::Missing, |n| n.predict()))
            .collect()
    }

    /// Accuracy of `predict(rows)` against `observed`.
    pub fn score_rows(&self, rows: &[Vec<RawValue>], observed: &[RawValue]) -> f64 {
        self.score(&self.predict(rows), observed)
    }

    pub fn tree_info(&self) -> String {
        let mut info = String::new();
        let terminal = self.terminal_nodes();

        info.push_str("=== Tree Information ===\n");
        info.push_str(&format!("Total nodes: {}\n", self.nodes.len()));
        info.push_str(&format!("Terminal nodes: {}\n", terminal.len()));
        info.push_str(&format!(
            "Internal nodes: {}\n",
            self.nodes.len() - terminal.len()
        ));
        let max_depth = (0..self.nodes.len())
            .map(|id| self.depth(id))
            .max()
            .unwrap_or(0);
        info.push_str(&format!("Maximum depth: {}\n", max_depth));

        let mut reasons: BTreeMap<String, usize> = BTreeMap::new();
        for id in &terminal {
            if let Some(reason) = self.nodes[*id].invalid_reason() {
                *reasons.entry(format!("{:?}", reason)).or_insert(0) += 1;
            }
        }
        if !reasons.is_empty() {
            info.push_str("\nTerminal reasons:\n");
            for (reason, count) in &reasons {
                info.push_str(&format!("  {}: {}\n", reason, count));
            }
        }

        let mut usage: HashMap<&str, usize> = HashMap::new();
        for node in self.nodes.iter().filter(|n| !n.is_terminal()) {
            if let Some(name) = node.split.predictor_name() {
                *usage.entry(name).or_insert(0) += 1;
            }
        }
        if !usage.is_empty() {
            info.push_str("\nPredictor usage in splits:\n");
            let mut sorted: Vec<_> = usage.into_iter().collect();
            sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
            for (name, count) in sorted {
                info.push_str(&format!("  {}: {}\n", name, count));
            }
        }
        info
    }
}

struct DepthFirstTreeBuilder<'a> {
    config: &'a TreeConfig,
    stats: Stats,
    nodes: Vec<Node>,
}

impl DepthFirstTreeBuilder<'_> {
    fn push_terminal(
        &mut self,
        parent: Option<usize>,
        choices: Vec<RawValue>,
        reason: InvalidSplitReason,
        rows: Vec<usize>,
        dep: Column,
    ) {
        let node_id = self.nodes.len();
        debug!(node_id, ?parent, %reason, "terminal node");
        self.nodes
            .push(Node::terminal(node_id, parent, choices, reason, rows, dep));
    }

    fn build_node(
        &mut self,
        rows: Vec<usize>,
        ind: Vec<Column>,
        dep: Column,
        depth: usize,
        parent: Option<usize>,
        choices: Vec<RawValue>,
    ) {
        let depth = depth + 1;
        if self.config.max_depth < depth {
            self.push_terminal(parent, choices, InvalidSplitReason::MaxDepth, rows, dep);
            return;
        }

        let split = self.stats.best_split(&ind, &dep);
        let node_id = self.nodes.len();
        self.nodes.push(Node::new(
            node_id,
            parent,
            choices,
            split.clone(),
            rows.clone(),
            dep.clone(),
        ));

        let Some(index) = split.predictor_index() else {
            debug!(node_id, reason = ?split.invalid_reason(), "terminal node");
            return;
        };
        debug!(node_id, split = %split, "split node");

        let codes = ind[index].codes().unwrap_or_default();
        for (group, child_choices) in split.groups().iter().zip(split.child_groups()) {
            let mask: Vec<bool> = codes.iter().map(|c| group.contains(c)).collect();
            let child_rows: Vec<usize> = rows
                .iter()
                .zip(&mask)
                .filter(|(_, keep)| **keep)
                .map(|(row, _)| *row)
                .collect();
            let child_dep = dep.subset(&mask);

            if child_rows.len() >= self.config.min_parent_node_size {
                let child_ind = ind.iter().map(|c| c.subset(&mask)).collect();
                self.build_node(
                    child_rows,
                    child_ind,
                    child_dep,
                    depth,
                    Some(node_id),
                    child_choices.clone(),
                );
            } else {
                self.push_terminal(
                    Some(node_id),
                    child_choices.clone(),
                    InvalidSplitReason::MinParentNodeSize,
                    child_rows,
                    child_dep,
                );
            }
        }
    }
}
