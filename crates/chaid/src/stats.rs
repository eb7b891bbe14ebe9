use crate::column::Column;
use crate::conf::{MergeStrategy, MAX_BRUTE_FORCE_CATEGORIES};
use crate::significance::{chisquare, ContingencyTable, TestResult, VarianceTest};
use crate::split::{InvalidSplitReason, Split, SplitRestrictions};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Slack when comparing weighted sizes against zero.
const SIZE_TOLERANCE: f64 = 1e-9;

/// Finds the best split of a node given its predictors and dependent variable.
pub trait SplitSearch {
    fn best_split(&self, ind: &[Column], dep: &Column) -> Split;
}

/// Split search for the dependent variable's kind.
#[derive(Debug, Clone)]
pub enum Stats {
    Categorical(CategoricalStats),
    Continuous(ContinuousStats),
}

impl Stats {
    /// `population` is the dependent variable over the whole training set; for
    /// continuous dependents it decides which variance test is used.
    pub fn new(restrictions: SplitRestrictions, population: &Column) -> Self {
        match population.values() {
            Some(values) => Stats::Continuous(ContinuousStats::new(restrictions, values)),
            None => Stats::Categorical(CategoricalStats::new(restrictions)),
        }
    }

    pub fn restrictions(&self) -> &SplitRestrictions {
        match self {
            Stats::Categorical(s) => &s.restrictions,
            Stats::Continuous(s) => &s.restrictions,
        }
    }
}

impl SplitSearch for Stats {
    fn best_split(&self, ind: &[Column], dep: &Column) -> Split {
        match self {
            Stats::Categorical(s) => s.best_split(ind, dep),
            Stats::Continuous(s) => s.best_split(ind, dep),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CategoricalStats {
    restrictions: SplitRestrictions,
}

impl CategoricalStats {
    pub fn new(restrictions: SplitRestrictions) -> Self {
        Self { restrictions }
    }
}

impl SplitSearch for CategoricalStats {
    fn best_split(&self, ind: &[Column], dep: &Column) -> Split {
        let Some(dep_codes) = dep.codes() else {
            return Split::invalid(InvalidSplitReason::PureNode);
        };
        let distinct: BTreeSet<i64> = dep_codes.iter().copied().collect();
        let min_child = self.restrictions.min_child_node_size;
        if distinct.len() <= 1 {
            return Split::invalid(InvalidSplitReason::PureNode);
        }
        match dep.weights() {
            None if (dep.len() as f64) < min_child => {
                return Split::invalid(InvalidSplitReason::MinChildNodeSize);
            }
            Some(_) if dep.total_weight() < min_child => {
                return Split::invalid(InvalidSplitReason::PureNode);
            }
            _ => {}
        }

        let dep_keys: Vec<i64> = distinct.into_iter().collect();
        let candidates: Vec<Split> = ind
            .par_iter()
            .enumerate()
            .map(|(i, column)| {
                let table = FrequencyTable::new(column, dep, &dep_keys, min_child);
                search_predictor(&self.restrictions, i, column, table)
            })
            .collect();
        select_best(&self.restrictions, candidates)
    }
}

#[derive(Debug, Clone)]
pub struct ContinuousStats {
    restrictions: SplitRestrictions,
    test: VarianceTest,
}

impl ContinuousStats {
    pub fn new(restrictions: SplitRestrictions, population: &[f64]) -> Self {
        Self {
            restrictions,
            test: VarianceTest::for_population(population),
        }
    }

    pub fn with_test(restrictions: SplitRestrictions, test: VarianceTest) -> Self {
        Self { restrictions, test }
    }

    pub fn test(&self) -> VarianceTest {
        self.test
    }
}

impl SplitSearch for ContinuousStats {
    fn best_split(&self, ind: &[Column], dep: &Column) -> Split {
        let Some(values) = dep.values() else {
            return Split::invalid(InvalidSplitReason::PureNode);
        };
        let responses: Vec<f64> = match dep.weights() {
            Some(w) => values.iter().zip(w).map(|(v, w)| v * w).collect(),
            None => values.to_vec(),
        };

        let candidates: Vec<Split> = ind
            .par_iter()
            .enumerate()
            .map(|(i, column)| {
                let table = ResponseTable::new(column, &responses, dep.weights(), self.test);
                search_predictor(&self.restrictions, i, column, table)
            })
            .collect();
        select_best(&self.restrictions, candidates)
    }
}

/// Outcome of testing whether two categories should merge.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PairOutcome {
    /// Merging would leave the remaining categories undersized.
    Skip,
    /// The pair shows a single dependent value; merge it unconditionally.
    Degenerate,
    Tested { statistic: f64, p_value: f64 },
}

/// Per-category summary of the dependent variable that follows merges.
trait GroupTable: Clone {
    fn compare(&self, a: i64, b: i64) -> PairOutcome;
    fn merge(&mut self, into: i64, from: i64);
    fn group_size(&self, code: i64) -> f64;
    fn group_count(&self) -> usize;
    fn full_test(&self) -> TestResult;
}

fn sanitize(statistic: f64, p_value: f64) -> (f64, f64) {
    let statistic = if statistic.is_nan() { 0.0 } else { statistic };
    let p_value = if p_value.is_nan() { 1.0 } else { p_value };
    (statistic, p_value)
}

#[derive(Debug, Clone)]
struct FrequencyTable {
    /// predictor code -> dependent code -> (weighted) count
    freq: BTreeMap<i64, BTreeMap<i64, f64>>,
    dep_keys: Vec<i64>,
    row_count: f64,
    weighted: bool,
    min_child: f64,
}

impl FrequencyTable {
    fn new(column: &Column, dep: &Column, dep_keys: &[i64], min_child: f64) -> Self {
        let empty: BTreeMap<i64, f64> = dep_keys.iter().map(|&k| (k, 0.0)).collect();
        let mut freq: BTreeMap<i64, BTreeMap<i64, f64>> = column
            .live_codes()
            .into_iter()
            .map(|c| (c, empty.clone()))
            .collect();
        let weights = dep.weights();
        let codes = column.codes().unwrap_or_default();
        let dep_codes = dep.codes().unwrap_or_default();
        for (row, (code, dep_code)) in codes.iter().zip(dep_codes).enumerate() {
            let w = weights.map_or(1.0, |w| w[row]);
            *freq
                .entry(*code)
                .or_insert_with(|| empty.clone())
                .entry(*dep_code)
                .or_insert(0.0) += w;
        }
        Self {
            freq,
            dep_keys: dep_keys.to_vec(),
            row_count: dep.total_weight(),
            weighted: weights.is_some(),
            min_child,
        }
    }

    fn row(&self, code: i64) -> impl Iterator<Item = f64> + '_ {
        let counts = self.freq.get(&code);
        self.dep_keys
            .iter()
            .map(move |k| counts.and_then(|c| c.get(k)).copied().unwrap_or(0.0))
    }
}

impl GroupTable for FrequencyTable {
    fn compare(&self, a: i64, b: i64) -> PairOutcome {
        let row_a: Vec<f64> = self.row(a).collect();
        let row_b: Vec<f64> = self.row(b).collect();
        let pair_total: f64 = row_a.iter().chain(row_b.iter()).sum();

        // the pair may only merge if the rest can still form a child, unless
        // nothing else remains
        let others = self.row_count - pair_total;
        if others < self.min_child && others > SIZE_TOLERANCE {
            return PairOutcome::Skip;
        }

        let present: Vec<usize> = (0..self.dep_keys.len())
            .filter(|&j| row_a[j] + row_b[j] > 0.0)
            .collect();
        if present.len() <= 1 {
            return PairOutcome::Degenerate;
        }
        let table = ContingencyTable::from_rows(vec![
            present.iter().map(|&j| row_a[j]).collect(),
            present.iter().map(|&j| row_b[j]).collect(),
        ]);
        let result = chisquare(&table, self.weighted);
        let (statistic, p_value) = sanitize(result.statistic, result.p_value);
        PairOutcome::Tested {
            statistic,
            p_value,
        }
    }

    fn merge(&mut self, into: i64, from: i64) {
        let Some(absorbed) = self.freq.remove(&from) else {
            return;
        };
        let target = self.freq.entry(into).or_default();
        for (k, v) in absorbed {
            *target.entry(k).or_insert(0.0) += v;
        }
    }

    fn group_size(&self, code: i64) -> f64 {
        self.freq.get(&code).map_or(0.0, |c| c.values().sum())
    }

    fn group_count(&self) -> usize {
        self.freq.len()
    }

    fn full_test(&self) -> TestResult {
        let rows = self.freq.keys().map(|&c| self.row(c).collect()).collect();
        let result = chisquare(&ContingencyTable::from_rows(rows), self.weighted);
        let (statistic, p_value) = sanitize(result.statistic, result.p_value);
        TestResult {
            statistic,
            p_value,
            dof: result.dof,
        }
    }
}

#[derive(Debug, Clone)]
struct ResponseTable {
    responses: BTreeMap<i64, Vec<f64>>,
    sizes: BTreeMap<i64, f64>,
    test: VarianceTest,
}

impl ResponseTable {
    fn new(column: &Column, responses: &[f64], weights: Option<&[f64]>, test: VarianceTest) -> Self {
        let mut grouped: BTreeMap<i64, Vec<f64>> =
            column.live_codes().into_iter().map(|c| (c, Vec::new())).collect();
        let mut sizes: BTreeMap<i64, f64> = grouped.keys().map(|&c| (c, 0.0)).collect();
        let codes = column.codes().unwrap_or_default();
        for (row, (code, response)) in codes.iter().zip(responses).enumerate() {
            grouped.entry(*code).or_default().push(*response);
            *sizes.entry(*code).or_insert(0.0) += weights.map_or(1.0, |w| w[row]);
        }
        Self {
            responses: grouped,
            sizes,
            test,
        }
    }
}

impl GroupTable for ResponseTable {
    fn compare(&self, a: i64, b: i64) -> PairOutcome {
        let empty: &[f64] = &[];
        let ra = self.responses.get(&a).map_or(empty, Vec::as_slice);
        let rb = self.responses.get(&b).map_or(empty, Vec::as_slice);
        let (statistic, p_value) = self.test.test(&[ra, rb]);
        let (statistic, p_value) = sanitize(statistic, p_value);
        PairOutcome::Tested {
            statistic,
            p_value,
        }
    }

    fn merge(&mut self, into: i64, from: i64) {
        if let Some(absorbed) = self.responses.remove(&from) {
            self.responses.entry(into).or_default().extend(absorbed);
        }
        if let Some(size) = self.sizes.remove(&from) {
            *self.sizes.entry(into).or_insert(0.0) += size;
        }
    }

    fn group_size(&self, code: i64) -> f64 {
        self.sizes.get(&code).copied().unwrap_or(0.0)
    }

    fn group_count(&self) -> usize {
        self.responses.len()
    }

    /// Degrees of freedom are `N - 2` regardless of the group count.
    fn full_test(&self) -> TestResult {
        let groups: Vec<&[f64]> = self.responses.values().map(Vec::as_slice).collect();
        let total: usize = groups.iter().map(|g| g.len()).sum();
        let (statistic, p_value) = self.test.test(&groups);
        let (statistic, p_value) = sanitize(statistic, p_value);
        TestResult {
            statistic,
            p_value,
            dof: total.saturating_sub(2),
        }
    }
}

fn search_predictor<T: GroupTable>(
    restrictions: &SplitRestrictions,
    index: usize,
    column: &Column,
    table: T,
) -> Split {
    match restrictions.strategy {
        MergeStrategy::Greedy => merge_categories(restrictions, index, column, table),
        MergeStrategy::BruteForce => {
            let live = column.live_codes().len();
            if live > MAX_BRUTE_FORCE_CATEGORIES {
                warn!(
                    predictor = index,
                    categories = live,
                    "too many categories for brute force search, merging greedily"
                );
                merge_categories(restrictions, index, column, table)
            } else {
                brute_force(restrictions, index, column, table)
            }
        }
    }
}

fn finalize(index: usize, column: &Column, result: TestResult) -> Split {
    Split::new(
        index,
        column.name().map(str::to_string),
        column.group_codes(),
        column.groups(),
        result.statistic,
        result.p_value,
        result.dof,
    )
}

fn has_undersized_group<T: GroupTable>(restrictions: &SplitRestrictions, column: &Column, table: &T) -> bool {
    column
        .live_codes()
        .iter()
        .any(|&c| !restrictions.is_group_size_valid(table.group_size(c) + SIZE_TOLERANCE))
}

/// Greedy CHAID merging on a working copy of `column`.
///
/// Each round picks the least significant legal pair. The current grouping
/// becomes the split as soon as that pair is significant and every group is
/// large enough; otherwise the pair is merged and the search repeats.
fn merge_categories<T: GroupTable>(
    restrictions: &SplitRestrictions,
    index: usize,
    column: &Column,
    mut table: T,
) -> Split {
    let mut column = column.deep_copy();
    let mut reason = InvalidSplitReason::PureNode;

    loop {
        let pairs = column.possible_groupings();
        if pairs.is_empty() {
            break;
        }

        let mut choice: Option<((i64, i64), f64, f64)> = None;
        for pair in pairs {
            match table.compare(pair.0, pair.1) {
                PairOutcome::Skip => continue,
                PairOutcome::Degenerate => {
                    choice = Some((pair, 1.0, 0.0));
                    break;
                }
                PairOutcome::Tested {
                    statistic,
                    p_value,
                } => {
                    let better = match choice {
                        None => true,
                        Some((_, p, s)) => p_value > p || (p_value == p && statistic > s),
                    };
                    if better {
                        choice = Some((pair, p_value, statistic));
                    }
                }
            }
        }

        let rejection = match choice {
            Some((_, p, _)) if p >= restrictions.alpha_merge => Some(InvalidSplitReason::AlphaMerge),
            _ if has_undersized_group(restrictions, &column, &table) => {
                Some(InvalidSplitReason::MinChildNodeSize)
            }
            _ if restrictions.is_exhaustive && table.group_count() > 2 => {
                Some(InvalidSplitReason::NodeNotExhaustive)
            }
            _ => None,
        };
        match rejection {
            None => return finalize(index, &column, table.full_test()),
            Some(r) => reason = r,
        }

        let Some(((a, b), p_value, _)) = choice else {
            break;
        };
        let survivor = column.group(a, b);
        table.merge(survivor, if survivor == a { b } else { a });
        debug!(predictor = index, a, b, p_value, "merged categories");
    }

    Split::invalid(reason)
}

/// Scores every legal partition of the live categories and keeps the most
/// significant one.
fn brute_force<T: GroupTable>(
    restrictions: &SplitRestrictions,
    index: usize,
    column: &Column,
    table: T,
) -> Split {
    if column.possible_groupings().is_empty() {
        return Split::invalid(InvalidSplitReason::PureNode);
    }

    let partitions = match column.all_combinations() {
        Ok(partitions) => partitions,
        Err(err) => {
            warn!(predictor = index, %err, "merging greedily");
            return merge_categories(restrictions, index, column, table);
        }
    };
    let mut best: Option<(Column, TestResult)> = None;
    for partition in partitions {
        if restrictions.is_exhaustive && partition.len() > 2 {
            continue;
        }
        let mut working = column.deep_copy();
        let mut working_table = table.clone();
        for block in &partition {
            let Some((&first, rest)) = block.split_first() else {
                continue;
            };
            let mut head = first;
            for &code in rest {
                let survivor = working.group(head, code);
                working_table.merge(survivor, if survivor == head { code } else { head });
                head = survivor;
            }
        }
        if has_undersized_group(restrictions, &working, &working_table) {
            continue;
        }

        let result = working_table.full_test();
        let better = match &best {
            None => true,
            Some((_, b)) => {
                result.p_value < b.p_value
                    || (result.p_value == b.p_value && result.statistic > b.statistic)
            }
        };
        if better {
            best = Some((working, result));
        }
    }

    match best {
        Some((working, result)) if result.p_value < restrictions.alpha_merge => {
            finalize(index, &working, result)
        }
        Some(_) => Split::invalid(InvalidSplitReason::AlphaMerge),
        None => Split::invalid(InvalidSplitReason::MinChildNodeSize),
    }
}

/// Folds per-predictor candidates, in predictor order, into the winner and
/// its surrogates.
fn select_best(restrictions: &SplitRestrictions, candidates: Vec<Split>) -> Split {
    let mut best = Split::invalid(InvalidSplitReason::PureNode);
    let mut last_reason = None;

    for (i, candidate) in candidates.into_iter().enumerate() {
        if !candidate.is_valid() {
            last_reason = candidate.invalid_reason();
            continue;
        }
        let mut other = candidate;
        if other.is_better_than(&best) {
            std::mem::swap(&mut best, &mut other);
        }

        if !restrictions.collects_surrogates() {
            continue;
        }
        let threshold = restrictions.surrogate_threshold(&best);
        if other.is_valid() && other.statistic() >= threshold {
            for surrogate in other.take_surrogates() {
                if surrogate.predictor_index() != Some(i) && surrogate.statistic() >= threshold {
                    best.push_surrogate(surrogate);
                }
            }
            best.push_surrogate(other);
        }
    }

    if let Some(reason) = last_reason {
        best.set_invalid_reason(reason);
    }
    best
}
