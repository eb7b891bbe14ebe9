use crate::conf::MergeStrategy;
use crate::value::RawValue;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Why a node was not (or could not be) split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidSplitReason {
    AlphaMerge,
    MinChildNodeSize,
    MaxDepth,
    MinParentNodeSize,
    PureNode,
    NodeNotExhaustive,
}

impl InvalidSplitReason {
    pub fn message(&self) -> &'static str {
        match self {
            InvalidSplitReason::AlphaMerge => "p-value greater than alpha merge",
            InvalidSplitReason::MinChildNodeSize => {
                "splitting would create nodes with less than the minimum child node size"
            }
            InvalidSplitReason::MaxDepth => "the max depth has been reached",
            InvalidSplitReason::MinParentNodeSize => {
                "the minimum parent node size threshold has been reached"
            }
            InvalidSplitReason::PureNode => "the node only contains single category respondents",
            InvalidSplitReason::NodeNotExhaustive => "the node would split into more than two groups",
        }
    }
}

impl fmt::Display for InvalidSplitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A partition of one predictor's categories, or the reason there is none.
///
/// `predictor_index()` is `None` exactly when `invalid_reason()` is `Some`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    predictor_index: Option<usize>,
    predictor_name: Option<String>,
    groups: Vec<Vec<i64>>,
    child_groups: Vec<Vec<RawValue>>,
    statistic: f64,
    p_value: f64,
    dof: usize,
    surrogates: Vec<Split>,
    invalid_reason: Option<InvalidSplitReason>,
}

impl Split {
    /// `groups` holds the predictor codes of each child, `child_groups` the
    /// same categories as original values.
    pub fn new(
        predictor_index: usize,
        predictor_name: Option<String>,
        groups: Vec<Vec<i64>>,
        child_groups: Vec<Vec<RawValue>>,
        statistic: f64,
        p_value: f64,
        dof: usize,
    ) -> Self {
        Self {
            predictor_index: Some(predictor_index),
            predictor_name,
            groups,
            child_groups,
            statistic,
            p_value,
            dof,
            surrogates: Vec::new(),
            invalid_reason: None,
        }
    }

    pub fn invalid(reason: InvalidSplitReason) -> Self {
        Self {
            predictor_index: None,
            predictor_name: None,
            groups: Vec::new(),
            child_groups: Vec::new(),
            statistic: 0.0,
            p_value: 1.0,
            dof: 0,
            surrogates: Vec::new(),
            invalid_reason: Some(reason),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.predictor_index.is_some()
    }

    pub fn predictor_index(&self) -> Option<usize> {
        self.predictor_index
    }

    pub fn predictor_name(&self) -> Option<&str> {
        self.predictor_name.as_deref()
    }

    pub fn groups(&self) -> &[Vec<i64>] {
        &self.groups
    }

    pub fn child_groups(&self) -> &[Vec<RawValue>] {
        &self.child_groups
    }

    pub fn statistic(&self) -> f64 {
        self.statistic
    }

    pub fn p_value(&self) -> f64 {
        self.p_value
    }

    pub fn dof(&self) -> usize {
        self.dof
    }

    pub fn surrogates(&self) -> &[Split] {
        &self.surrogates
    }

    pub fn invalid_reason(&self) -> Option<InvalidSplitReason> {
        self.invalid_reason
    }

    pub(crate) fn set_invalid_reason(&mut self, reason: InvalidSplitReason) {
        if self.predictor_index.is_none() {
            self.invalid_reason = Some(reason);
        }
    }

    pub(crate) fn push_surrogate(&mut self, split: Split) {
        self.surrogates.push(split);
    }

    pub(crate) fn take_surrogates(&mut self) -> Vec<Split> {
        std::mem::take(&mut self.surrogates)
    }

    /// Strictly better: lower p-value, or equal p-value and higher statistic.
    /// Any valid split beats an invalid one.
    pub fn is_better_than(&self, other: &Split) -> bool {
        if !self.is_valid() {
            return false;
        }
        !other.is_valid()
            || self.p_value < other.p_value
            || (self.p_value == other.p_value && self.statistic > other.statistic)
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(reason) = self.invalid_reason {
            return write!(f, "<Invalid Chaid Split> - {}", reason);
        }
        let groups: Vec<String> = self
            .child_groups
            .iter()
            .map(|g| {
                let values: Vec<String> = g.iter().map(|v| v.to_string()).collect();
                format!("[{}]", values.join(", "))
            })
            .collect();
        write!(
            f,
            "({}, p={}, score={}, groups=[{}]), dof={}",
            self.predictor_name.as_deref().unwrap_or("<unnamed>"),
            self.p_value,
            self.statistic,
            groups.join(", "),
            self.dof
        )
    }
}

#[derive(Clone, Debug)]
pub struct SplitRestrictions {
    pub alpha_merge: f64,
    pub min_child_node_size: f64,
    pub split_threshold: f64,
    pub is_exhaustive: bool,
    pub strategy: MergeStrategy,
}

impl Default for SplitRestrictions {
    fn default() -> Self {
        Self {
            alpha_merge: 0.05,
            min_child_node_size: 30.0,
            split_threshold: 0.0,
            is_exhaustive: false,
            strategy: MergeStrategy::Greedy,
        }
    }
}

impl SplitRestrictions {
    /// Statistic a losing candidate needs to be kept as a surrogate of `best`.
    pub fn surrogate_threshold(&self, best: &Split) -> f64 {
        (1.0 - self.split_threshold) * best.statistic()
    }

    /// A zero threshold leaves no room for ties, so nothing is collected.
    pub fn collects_surrogates(&self) -> bool {
        self.split_threshold > 0.0
    }

    pub fn is_group_size_valid(&self, size: f64) -> bool {
        size >= self.min_child_node_size
    }
}
