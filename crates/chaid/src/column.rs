use crate::conf::{MAX_BRUTE_FORCE_CATEGORIES, MISSING_CODE};
use crate::error::ChaidError;
use crate::value::RawValue;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    Nominal,
    Ordinal,
    Continuous,
}

impl ColumnKind {
    pub fn is_categorical(&self) -> bool {
        !matches!(self, ColumnKind::Continuous)
    }
}

impl FromStr for ColumnKind {
    type Err = ChaidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nominal" | "categorical" => Ok(ColumnKind::Nominal),
            "ordinal" => Ok(ColumnKind::Ordinal),
            "continuous" => Ok(ColumnKind::Continuous),
            other => Err(ChaidError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnKind::Nominal => "nominal",
            ColumnKind::Ordinal => "ordinal",
            ColumnKind::Continuous => "continuous",
        };
        write!(f, "{}", s)
    }
}

/// Contiguous code interval `[min, max)` owned by one live ordinal category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrdinalRange {
    pub min: i64,
    pub max: i64,
    pub includes_missing: bool,
}

impl OrdinalRange {
    fn single(code: i64) -> Self {
        Self {
            min: code,
            max: code + 1,
            includes_missing: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Groupings {
    Nominal(BTreeMap<i64, Vec<i64>>),
    Ordinal {
        ranges: BTreeMap<i64, OrdinalRange>,
        /// Missing rows exist and still form their own category.
        missing_live: bool,
    },
}

impl Groupings {
    fn derive(kind: ColumnKind, codes: &[i64]) -> Self {
        let present: BTreeSet<i64> = codes.iter().copied().collect();
        match kind {
            ColumnKind::Ordinal => {
                let missing_live = present.contains(&MISSING_CODE);
                let ranged: Vec<i64> = present.into_iter().filter(|&c| c != MISSING_CODE).collect();
                let mut ranges = BTreeMap::new();
                for (i, &code) in ranged.iter().enumerate() {
                    // gaps left by absent codes are absorbed by the lower neighbour
                    let range = match ranged.get(i + 1) {
                        Some(&next) => OrdinalRange {
                            min: code,
                            max: next,
                            includes_missing: false,
                        },
                        None => OrdinalRange::single(code),
                    };
                    ranges.insert(code, range);
                }
                Groupings::Ordinal {
                    ranges,
                    missing_live,
                }
            }
            _ => Groupings::Nominal(present.into_iter().map(|c| (c, vec![c])).collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ColumnData {
    Categorical {
        codes: Vec<i64>,
        metadata: Arc<BTreeMap<i64, RawValue>>,
        groupings: Groupings,
    },
    Continuous(Vec<f64>),
}

/// One variable's values over the rows of a node.
///
/// Nominal and ordinal values are stored as integer codes with a reverse
/// mapping in `metadata`; continuous values are kept as raw floats.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: Option<String>,
    weights: Option<Vec<f64>>,
    data: ColumnData,
}

impl Column {
    /// Encodes raw observations.
    ///
    /// Nominal and ordinal codes are the ranks of the sorted distinct
    /// non-missing values, so ordinal codes form the contiguous range
    /// `0..k`. Missing values get [`MISSING_CODE`]. For continuous columns
    /// missing values become `0.0` and any non-numeric value is an error.
    pub fn from_raw(values: &[RawValue], kind: ColumnKind) -> Result<Self, ChaidError> {
        if kind == ColumnKind::Continuous {
            let parsed = values
                .iter()
                .enumerate()
                .map(|(index, v)| match v {
                    v if v.is_missing() => Ok(0.0),
                    RawValue::Int(_) | RawValue::Float(_) => Ok(v.as_f64().unwrap_or(0.0)),
                    other => Err(ChaidError::NonNumeric {
                        index,
                        value: other.to_string(),
                    }),
                })
                .collect::<Result<Vec<f64>, ChaidError>>()?;
            return Ok(Self::from_f64(parsed));
        }

        let distinct: BTreeSet<&RawValue> = values.iter().filter(|v| !v.is_missing()).collect();
        let mut metadata: BTreeMap<i64, RawValue> = BTreeMap::new();
        metadata.insert(MISSING_CODE, RawValue::Missing);
        let lookup: std::collections::HashMap<&RawValue, i64> = distinct
            .into_iter()
            .enumerate()
            .map(|(code, value)| {
                metadata.insert(code as i64, value.clone());
                (value, code as i64)
            })
            .collect();
        let codes: Vec<i64> = values
            .iter()
            .map(|v| lookup.get(v).copied().unwrap_or(MISSING_CODE))
            .collect();

        Ok(Self::from_codes(codes, Arc::new(metadata), kind))
    }

    pub fn from_f64(values: Vec<f64>) -> Self {
        Self {
            name: None,
            weights: None,
            data: ColumnData::Continuous(values),
        }
    }

    /// Builds a categorical column from already encoded codes.
    pub fn from_codes(codes: Vec<i64>, metadata: Arc<BTreeMap<i64, RawValue>>, kind: ColumnKind) -> Self {
        let groupings = Groupings::derive(kind, &codes);
        Self {
            name: None,
            weights: None,
            data: ColumnData::Categorical {
                codes,
                metadata,
                groupings,
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_weights(mut self, weights: Vec<f64>) -> Result<Self, ChaidError> {
        if weights.len() != self.len() {
            return Err(ChaidError::WeightLengthMismatch {
                values: self.len(),
                weights: weights.len(),
            });
        }
        if let Some((index, &weight)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(ChaidError::InvalidWeight { index, weight });
        }
        self.weights = Some(weights);
        Ok(self)
    }

    pub fn kind(&self) -> ColumnKind {
        match &self.data {
            ColumnData::Continuous(_) => ColumnKind::Continuous,
            ColumnData::Categorical { groupings, .. } => match groupings {
                Groupings::Nominal(_) => ColumnKind::Nominal,
                Groupings::Ordinal { .. } => ColumnKind::Ordinal,
            },
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Categorical { codes, .. } => codes.len(),
            ColumnData::Continuous(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    /// Weighted row count, or the plain row count when unweighted.
    pub fn total_weight(&self) -> f64 {
        match &self.weights {
            Some(w) => w.iter().sum(),
            None => self.len() as f64,
        }
    }

    pub fn codes(&self) -> Option<&[i64]> {
        match &self.data {
            ColumnData::Categorical { codes, .. } => Some(codes),
            ColumnData::Continuous(_) => None,
        }
    }

    pub fn values(&self) -> Option<&[f64]> {
        match &self.data {
            ColumnData::Continuous(values) => Some(values),
            ColumnData::Categorical { .. } => None,
        }
    }

    pub fn metadata(&self) -> Option<&BTreeMap<i64, RawValue>> {
        match &self.data {
            ColumnData::Categorical { metadata, .. } => Some(metadata),
            ColumnData::Continuous(_) => None,
        }
    }

    pub fn value_of(&self, code: i64) -> RawValue {
        self.metadata()
            .and_then(|m| m.get(&code))
            .cloned()
            .unwrap_or(RawValue::Missing)
    }

    /// Row values decoded back to their original representation.
    pub fn raw_values(&self) -> Vec<RawValue> {
        match &self.data {
            ColumnData::Categorical { codes, metadata, .. } => codes
                .iter()
                .map(|c| metadata.get(c).cloned().unwrap_or(RawValue::Missing))
                .collect(),
            ColumnData::Continuous(values) => values.iter().map(|&v| RawValue::Float(v)).collect(),
        }
    }

    /// Rows where `mask` is true. Groupings are re-derived from the codes present.
    pub fn subset(&self, mask: &[bool]) -> Column {
        let keep = |i: &usize| mask.get(*i).copied().unwrap_or(false);
        let weights = self.weights.as_ref().map(|w| {
            w.iter()
                .enumerate()
                .filter(|(i, _)| keep(i))
                .map(|(_, &v)| v)
                .collect()
        });
        let data = match &self.data {
            ColumnData::Categorical { codes, metadata, .. } => {
                let codes: Vec<i64> = codes
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| keep(i))
                    .map(|(_, &c)| c)
                    .collect();
                ColumnData::Categorical {
                    groupings: Groupings::derive(self.kind(), &codes),
                    codes,
                    metadata: Arc::clone(metadata),
                }
            }
            ColumnData::Continuous(values) => ColumnData::Continuous(
                values
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| keep(i))
                    .map(|(_, &v)| v)
                    .collect(),
            ),
        };
        Column {
            name: self.name.clone(),
            weights,
            data,
        }
    }

    /// Independent working copy for destructive merging.
    pub fn deep_copy(&self) -> Column {
        self.clone()
    }

    /// Codes of the currently live categories, in group order.
    pub fn live_codes(&self) -> Vec<i64> {
        match &self.data {
            ColumnData::Categorical {
                groupings: Groupings::Nominal(groups),
                ..
            } => groups.keys().copied().collect(),
            ColumnData::Categorical {
                groupings:
                    Groupings::Ordinal {
                        ranges,
                        missing_live,
                    },
                ..
            } => {
                let mut live = Vec::with_capacity(ranges.len() + 1);
                if *missing_live {
                    live.push(MISSING_CODE);
                }
                live.extend(ranges.keys().copied());
                live
            }
            ColumnData::Continuous(_) => Vec::new(),
        }
    }

    pub fn ordinal_ranges(&self) -> Option<Vec<OrdinalRange>> {
        match &self.data {
            ColumnData::Categorical {
                groupings: Groupings::Ordinal { ranges, .. },
                ..
            } => Some(ranges.values().copied().collect()),
            _ => None,
        }
    }

    /// Pairs of live codes that may currently be merged.
    ///
    /// Nominal: every unordered pair. Ordinal: pairs with touching ranges,
    /// then `(code, MISSING_CODE)` for every range while missing is live.
    pub fn possible_groupings(&self) -> Vec<(i64, i64)> {
        match &self.data {
            ColumnData::Categorical {
                groupings: Groupings::Nominal(groups),
                ..
            } => groups.keys().copied().tuple_combinations().collect(),
            ColumnData::Categorical {
                groupings:
                    Groupings::Ordinal {
                        ranges,
                        missing_live,
                    },
                ..
            } => {
                let mut pairs: Vec<(i64, i64)> = ranges
                    .iter()
                    .tuple_windows()
                    .filter(|((_, a), (_, b))| a.max == b.min)
                    .map(|((ka, _), (kb, _))| (*ka, *kb))
                    .collect();
                if *missing_live {
                    pairs.extend(ranges.keys().map(|&k| (k, MISSING_CODE)));
                }
                pairs
            }
            ColumnData::Continuous(_) => Vec::new(),
        }
    }

    /// Irreversibly merges category `b` into category `a` and returns the
    /// code that survives. That is `a`, except for an ordinal merge whose
    /// `a` is the missing code, where the ranged category survives.
    pub fn group(&mut self, a: i64, b: i64) -> i64 {
        let (survivor, absorbed) = match &mut self.data {
            ColumnData::Categorical {
                groupings: Groupings::Nominal(groups),
                ..
            } => {
                let Some(members) = groups.remove(&b) else {
                    return a;
                };
                match groups.get_mut(&a) {
                    Some(target) => target.extend(members),
                    None => {
                        groups.insert(b, members);
                        return a;
                    }
                }
                (a, b)
            }
            ColumnData::Categorical {
                groupings:
                    Groupings::Ordinal {
                        ranges,
                        missing_live,
                    },
                ..
            } => {
                let (a, b) = if a == MISSING_CODE { (b, a) } else { (a, b) };
                if b == MISSING_CODE {
                    let Some(range) = ranges.get_mut(&a) else {
                        return a;
                    };
                    range.includes_missing = true;
                    *missing_live = false;
                } else {
                    let Some(absorbed) = ranges.remove(&b) else {
                        return a;
                    };
                    let Some(range) = ranges.get_mut(&a) else {
                        ranges.insert(b, absorbed);
                        return a;
                    };
                    debug_assert!(
                        range.max == absorbed.min || absorbed.max == range.min,
                        "ordinal merge of non-adjacent ranges"
                    );
                    range.min = range.min.min(absorbed.min);
                    range.max = range.max.max(absorbed.max);
                    range.includes_missing |= absorbed.includes_missing;
                }
                (a, b)
            }
            ColumnData::Continuous(_) => return a,
        };

        if let ColumnData::Categorical { codes, .. } = &mut self.data {
            codes
                .iter_mut()
                .filter(|c| **c == absorbed)
                .for_each(|c| *c = survivor);
        }
        survivor
    }

    /// Original codes covered by each live category.
    pub fn group_codes(&self) -> Vec<Vec<i64>> {
        match &self.data {
            ColumnData::Categorical {
                groupings: Groupings::Nominal(groups),
                ..
            } => groups.values().cloned().collect(),
            ColumnData::Categorical {
                groupings:
                    Groupings::Ordinal {
                        ranges,
                        missing_live,
                    },
                ..
            } => {
                let mut out = Vec::with_capacity(ranges.len() + 1);
                if *missing_live {
                    out.push(vec![MISSING_CODE]);
                }
                for range in ranges.values() {
                    let mut codes: Vec<i64> = (range.min..range.max).collect();
                    if range.includes_missing {
                        codes.push(MISSING_CODE);
                    }
                    out.push(codes);
                }
                out
            }
            ColumnData::Continuous(_) => Vec::new(),
        }
    }

    /// Live categories materialised as original values.
    pub fn groups(&self) -> Vec<Vec<RawValue>> {
        self.group_codes()
            .into_iter()
            .map(|codes| {
                codes
                    .into_iter()
                    .filter(|c| self.metadata().is_some_and(|m| m.contains_key(c)))
                    .map(|c| self.value_of(c))
                    .collect()
            })
            .collect()
    }

    /// Every legal partition of the live categories into two or more blocks.
    ///
    /// The first code of each block is a ranged category whenever the block
    /// has one, so merging the rest of a block into its head is always legal.
    /// Columns with more than [`MAX_BRUTE_FORCE_CATEGORIES`] live categories
    /// are rejected.
    pub fn all_combinations(&self) -> Result<Vec<Vec<Vec<i64>>>, ChaidError> {
        let live = self.live_codes().len();
        if live > MAX_BRUTE_FORCE_CATEGORIES {
            return Err(ChaidError::TooManyCategories {
                count: live,
                max: MAX_BRUTE_FORCE_CATEGORIES,
            });
        }
        Ok(match &self.data {
            ColumnData::Categorical {
                groupings: Groupings::Nominal(groups),
                ..
            } => {
                let keys: Vec<i64> = groups.keys().copied().collect();
                set_partitions(&keys)
                    .into_iter()
                    .filter(|p| p.len() >= 2)
                    .collect()
            }
            ColumnData::Categorical {
                groupings:
                    Groupings::Ordinal {
                        ranges,
                        missing_live,
                    },
                ..
            } => {
                let keys: Vec<i64> = ranges.keys().copied().collect();
                let runs = contiguous_partitions(&keys);
                if !*missing_live {
                    return Ok(runs.into_iter().filter(|p| p.len() >= 2).collect());
                }
                let mut out = Vec::new();
                for run in runs {
                    let mut alone = run.clone();
                    alone.push(vec![MISSING_CODE]);
                    out.push(alone);
                    if run.len() >= 2 {
                        for i in 0..run.len() {
                            let mut joined = run.clone();
                            joined[i].push(MISSING_CODE);
                            out.push(joined);
                        }
                    }
                }
                out
            }
            ColumnData::Continuous(_) => Vec::new(),
        })
    }
}

fn set_partitions(items: &[i64]) -> Vec<Vec<Vec<i64>>> {
    let Some((&first, rest)) = items.split_first() else {
        return vec![Vec::new()];
    };
    let mut out = Vec::new();
    for partition in set_partitions(rest) {
        for i in 0..partition.len() {
            let mut extended = partition.clone();
            extended[i].insert(0, first);
            out.push(extended);
        }
        let mut alone = partition;
        alone.insert(0, vec![first]);
        out.push(alone);
    }
    out
}

fn contiguous_partitions(items: &[i64]) -> Vec<Vec<Vec<i64>>> {
    if items.is_empty() {
        return Vec::new();
    }
    let cuts = items.len() - 1;
    (0..1u64 << cuts)
        .map(|mask| {
            let mut blocks: Vec<Vec<i64>> = vec![vec![items[0]]];
            for (i, &item) in items.iter().enumerate().skip(1) {
                if mask & (1 << (i - 1)) != 0 {
                    blocks.push(vec![item]);
                } else if let Some(last) = blocks.last_mut() {
                    last.push(item);
                }
            }
            blocks
        })
        .collect()
}
