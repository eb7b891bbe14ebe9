use crate::column::{Column, ColumnKind};
use crate::split::{InvalidSplitReason, Split};
use crate::value::RawValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// Summary of the dependent variable over a node's rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Members {
    /// (Weighted) count per dependent category, in code order.
    Categorical(Vec<(RawValue, f64)>),
    /// Mean and population standard deviation, weighted by row weight when
    /// the dependent carries weights.
    Continuous { mean: f64, std: f64 },
}

impl Members {
    fn from_dependent(dep: &Column) -> Self {
        if let Some(values) = dep.values() {
            let weights: Vec<f64> = match dep.weights() {
                Some(w) if w.iter().sum::<f64>() > 0.0 => w.to_vec(),
                _ => vec![1.0; values.len()],
            };
            let total: f64 = weights.iter().sum();
            let mean = values.iter().zip(&weights).map(|(v, w)| v * w).sum::<f64>() / total;
            let var = values
                .iter()
                .zip(&weights)
                .map(|(v, w)| w * (v - mean).powi(2))
                .sum::<f64>()
                / total;
            return Members::Continuous {
                mean,
                std: var.sqrt(),
            };
        }

        let mut counts: BTreeMap<i64, f64> = BTreeMap::new();
        let codes = dep.codes().unwrap_or_default();
        for (row, code) in codes.iter().enumerate() {
            let w = dep.weights().map_or(1.0, |w| w[row]);
            *counts.entry(*code).or_insert(0.0) += w;
        }
        Members::Categorical(
            counts
                .into_iter()
                .map(|(code, count)| (dep.value_of(code), count))
                .collect(),
        )
    }

    /// Most frequent category (first maximum wins) or the mean.
    pub fn prediction(&self) -> RawValue {
        match self {
            Members::Continuous { mean, .. } => RawValue::Float(*mean),
            Members::Categorical(counts) => {
                let mut best: Option<&(RawValue, f64)> = None;
                for entry in counts {
                    if best.map_or(true, |b| entry.1 > b.1) {
                        best = Some(entry);
                    }
                }
                best.map_or(RawValue::Missing, |(v, _)| v.clone())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub node_id: usize,
    pub parent: Option<usize>,
    /// Predictor values routing rows from the parent into this node.
    pub choices: Vec<RawValue>,
    pub split: Split,
    /// Training rows that fall into this node.
    pub indices: Vec<usize>,
    pub dep_v: Column,
    members: OnceLock<Members>,
}

impl Node {
    pub fn new(
        node_id: usize,
        parent: Option<usize>,
        choices: Vec<RawValue>,
        split: Split,
        indices: Vec<usize>,
        dep_v: Column,
    ) -> Self {
        Self {
            node_id,
            parent,
            choices,
            split,
            indices,
            dep_v,
            members: OnceLock::new(),
        }
    }

    pub fn terminal(
        node_id: usize,
        parent: Option<usize>,
        choices: Vec<RawValue>,
        reason: InvalidSplitReason,
        indices: Vec<usize>,
        dep_v: Column,
    ) -> Self {
        Self::new(node_id, parent, choices, Split::invalid(reason), indices, dep_v)
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_terminal(&self) -> bool {
        !self.split.is_valid()
    }

    pub fn invalid_reason(&self) -> Option<InvalidSplitReason> {
        self.split.invalid_reason()
    }

    pub fn dependent_kind(&self) -> ColumnKind {
        self.dep_v.kind()
    }

    pub fn members(&self) -> &Members {
        self.members.get_or_init(|| Members::from_dependent(&self.dep_v))
    }

    pub fn predict(&self) -> RawValue {
        self.members().prediction()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let choices: Vec<String> = self.choices.iter().map(|c| c.to_string()).collect();
        let members = match self.members() {
            Members::Categorical(counts) => {
                let parts: Vec<String> = counts.iter().map(|(v, c)| format!("{}: {}", v, c)).collect();
                format!("{{{}}}", parts.join(", "))
            }
            Members::Continuous { mean, std } => format!("{{mean: {}, s.t.d: {}}}", mean, std),
        };
        write!(
            f,
            "({}, {}, {}, {})",
            if choices.is_empty() {
                "<root>".to_string()
            } else {
                format!("[{}]", choices.join(", "))
            },
            members,
            self.split,
            self.node_id
        )
    }
}
