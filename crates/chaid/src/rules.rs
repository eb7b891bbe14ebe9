use crate::tree::Tree;
use crate::value::RawValue;
use core::fmt;
use std::collections::BTreeSet;

pub trait Rule {
    fn evaluate_one(&self, value: &RawValue) -> bool;

    fn evaluate(&self, data: &[RawValue]) -> Vec<bool> {
        data.iter().map(|x| self.evaluate_one(x)).collect()
    }
}

/// Membership in a set of category values, as routed by one split.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BelongsTo {
    pub values: BTreeSet<RawValue>,
}

impl BelongsTo {
    pub fn new(values: impl IntoIterator<Item = RawValue>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    pub fn contains(&self, v: &RawValue) -> bool {
        self.values.contains(v)
    }

    /// Values accepted by both rules.
    pub fn intersect(&self, other: &BelongsTo) -> BelongsTo {
        BelongsTo {
            values: self.values.intersection(&other.values).cloned().collect(),
        }
    }
}

impl Rule for BelongsTo {
    fn evaluate_one(&self, value: &RawValue) -> bool {
        self.contains(value)
    }
}

impl fmt::Display for BelongsTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "BelongsTo({})", values.join(", "))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RuleCondition {
    pub variable: String,
    pub predictor_index: usize,
    pub data: BelongsTo,
}

impl fmt::Display for RuleCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.variable, self.data)
    }
}

/// Constraints, root first, that lead to one terminal node.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassificationRule {
    pub node_id: usize,
    pub prediction: RawValue,
    pub rules: Vec<RuleCondition>,
}

impl ClassificationRule {
    /// Whether an observation satisfies every condition; `row[p]` is the value
    /// of predictor `p`.
    pub fn matches(&self, row: &[RawValue]) -> bool {
        self.rules.iter().all(|c| {
            row.get(c.predictor_index)
                .is_some_and(|v| c.data.evaluate_one(v))
        })
    }
}

impl fmt::Display for ClassificationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let conditions: Vec<String> = self.rules.iter().map(|r| r.to_string()).collect();
        write!(
            f,
            "node {}: {} => {}",
            self.node_id,
            if conditions.is_empty() {
                "<all>".to_string()
            } else {
                conditions.join(" and ")
            },
            self.prediction
        )
    }
}

impl Tree {
    /// Rule of every terminal node, or only of `node_id` when given.
    pub fn classification_rules(&self, node_id: Option<usize>) -> Vec<ClassificationRule> {
        self.nodes()
            .iter()
            .filter(|n| n.is_terminal() && node_id.map_or(true, |id| id == n.node_id))
            .map(|leaf| {
                let mut rules = Vec::new();
                let mut current = leaf;
                while let Some(parent) = current.parent.and_then(|p| self.get_node(p)) {
                    if let Some(index) = parent.split.predictor_index() {
                        rules.push(RuleCondition {
                            variable: parent
                                .split
                                .predictor_name()
                                .map_or_else(|| index.to_string(), str::to_string),
                            predictor_index: index,
                            data: BelongsTo::new(current.choices.iter().cloned()),
                        });
                    }
                    current = parent;
                }
                rules.reverse();
                ClassificationRule {
                    node_id: leaf.node_id,
                    prediction: leaf.predict(),
                    rules,
                }
            })
            .collect()
    }
}
