use crate::error::ConfigError;
use crate::split::SplitRestrictions;
use serde::{Deserialize, Serialize};

/// Code reserved for missing observations of nominal/ordinal columns.
pub const MISSING_CODE: i64 = -1;
/// Convergence threshold on the max absolute change of the IPF expected table.
pub const IPF_TOLERANCE: f64 = 10e-6;
pub const IPF_MAX_ITERATIONS: usize = 10_000;
/// Significance level of the normality test that picks Bartlett over Levene.
pub const NORMALITY_ALPHA: f64 = 0.05;
/// Bell(12) partitions is already ~4M table evaluations per predictor.
pub const MAX_BRUTE_FORCE_CATEGORIES: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeStrategy {
    /// Iterative merging of the least significant pair.
    Greedy,
    /// Every legal partition of the live categories is scored.
    BruteForce,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub alpha_merge: f64,
    pub max_depth: usize,
    pub min_parent_node_size: usize,
    pub min_child_node_size: usize,
    pub split_threshold: f64,
    pub is_exhaustive: bool,
    pub strategy: MergeStrategy,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            alpha_merge: 0.05,
            max_depth: 2,
            min_parent_node_size: 30,
            min_child_node_size: 30,
            split_threshold: 0.0,
            is_exhaustive: false,
            strategy: MergeStrategy::Greedy,
        }
    }
}

impl TreeConfig {
    pub fn with_alpha_merge(mut self, alpha_merge: f64) -> Self {
        self.alpha_merge = alpha_merge;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_min_parent_node_size(mut self, size: usize) -> Self {
        self.min_parent_node_size = size;
        self
    }

    pub fn with_min_child_node_size(mut self, size: usize) -> Self {
        self.min_child_node_size = size;
        self
    }

    pub fn with_split_threshold(mut self, split_threshold: f64) -> Self {
        self.split_threshold = split_threshold;
        self
    }

    pub fn with_exhaustive(mut self, is_exhaustive: bool) -> Self {
        self.is_exhaustive = is_exhaustive;
        self
    }

    pub fn with_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.alpha_merge > 0.0 && self.alpha_merge < 1.0) {
            return Err(ConfigError::AlphaMerge(self.alpha_merge));
        }
        if !(self.split_threshold >= 0.0 && self.split_threshold < 1.0) {
            return Err(ConfigError::SplitThreshold(self.split_threshold));
        }
        Ok(())
    }

    pub fn split_restrictions(&self) -> SplitRestrictions {
        SplitRestrictions {
            alpha_merge: self.alpha_merge,
            min_child_node_size: self.min_child_node_size as f64,
            split_threshold: self.split_threshold,
            is_exhaustive: self.is_exhaustive,
            strategy: self.strategy,
        }
    }
}
