//! Test statistics used to decide merges and splits.
//!
//! Categorical dependents use Pearson's chi-square on a contingency table,
//! with expected counts from iterative proportional fitting when the rows
//! are weighted. Continuous dependents compare spread with Bartlett's test
//! when the population looks normal and Levene's test otherwise.

use crate::conf::{IPF_MAX_ITERATIONS, IPF_TOLERANCE, NORMALITY_ALPHA};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestResult {
    pub statistic: f64,
    pub p_value: f64,
    pub dof: usize,
}

/// Observed (possibly weighted) frequencies, one row per predictor category.
#[derive(Debug, Clone, PartialEq)]
pub struct ContingencyTable {
    cells: Vec<Vec<f64>>,
    n_cols: usize,
}

impl ContingencyTable {
    /// Rows shorter than the widest row are padded with zeros.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        let n_cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        let cells = rows
            .into_iter()
            .map(|mut r| {
                r.resize(n_cols, 0.0);
                r
            })
            .collect();
        Self { cells, n_cols }
    }

    pub fn n_rows(&self) -> usize {
        self.cells.len()
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn cells(&self) -> &[Vec<f64>] {
        &self.cells
    }

    pub fn row_sums(&self) -> Vec<f64> {
        self.cells.iter().map(|r| r.iter().sum()).collect()
    }

    pub fn col_sums(&self) -> Vec<f64> {
        (0..self.n_cols)
            .map(|j| self.cells.iter().map(|r| r[j]).sum())
            .collect()
    }

    pub fn total(&self) -> f64 {
        self.cells.iter().flatten().sum()
    }

    /// Degrees of freedom `(rows - 1)(cols - 1)`; the weighted test uses it unchanged.
    pub fn dof(&self) -> usize {
        self.n_rows().saturating_sub(1) * self.n_cols.saturating_sub(1)
    }

    fn independence_expected(&self) -> Vec<Vec<f64>> {
        let rows = self.row_sums();
        let cols = self.col_sums();
        let total = self.total();
        rows.iter()
            .map(|r| cols.iter().map(|c| r * c / total).collect())
            .collect()
    }
}

/// Expected frequencies matching the observed margins, fitted by alternately
/// rescaling rows and columns of a seed table. Zero cells seed at `1e-6` so
/// their expected value stays strictly positive.
pub fn iterative_proportional_fit(table: &ContingencyTable) -> Vec<Vec<f64>> {
    let seed: Vec<Vec<f64>> = table
        .cells
        .iter()
        .map(|r| r.iter().map(|&n| if n > 0.0 { 1.0 } else { 0.000001 }).collect())
        .collect();
    let row_sums = table.row_sums();
    let col_sums = table.col_sums();
    let mut alpha = vec![1.0; table.n_rows()];
    let mut beta = vec![1.0; table.n_cols];
    let mut expected = seed.clone();

    let mut iterations = 0;
    loop {
        for (i, a) in alpha.iter_mut().enumerate() {
            let fitted: f64 = expected[i].iter().sum();
            *a *= row_sums[i] / fitted;
        }
        for (j, b) in beta.iter_mut().enumerate() {
            let scaled: f64 = (0..seed.len()).map(|i| alpha[i] * seed[i][j]).sum();
            *b = col_sums[j] / scaled;
        }

        let mut eps: f64 = 0.0;
        for (i, row) in expected.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                let next = seed[i][j] * alpha[i] * beta[j];
                eps = eps.max((next - *cell).abs());
                *cell = next;
            }
        }

        iterations += 1;
        if !(eps > IPF_TOLERANCE) {
            break;
        }
        if iterations >= IPF_MAX_ITERATIONS {
            warn!(iterations, eps, "iterative proportional fit did not converge");
            break;
        }
    }
    expected
}

/// Pearson chi-square of `table` against independence.
pub fn chisquare(table: &ContingencyTable, weighted: bool) -> TestResult {
    let expected = if weighted {
        iterative_proportional_fit(table)
    } else {
        table.independence_expected()
    };
    let statistic: f64 = table
        .cells
        .iter()
        .zip(expected.iter())
        .flat_map(|(obs, exp)| obs.iter().zip(exp.iter()))
        .filter(|(_, e)| **e > 0.0)
        .map(|(o, e)| (o - e).powi(2) / e)
        .sum();
    let dof = table.dof();
    TestResult {
        statistic,
        p_value: chi2_sf(statistic, dof as f64),
        dof,
    }
}

/// Upper tail of the chi-square distribution; NaN for degenerate input.
pub fn chi2_sf(x: f64, dof: f64) -> f64 {
    if !x.is_finite() {
        return if x == f64::INFINITY { 0.0 } else { f64::NAN };
    }
    ChiSquared::new(dof).map(|d| d.sf(x)).unwrap_or(f64::NAN)
}

fn f_sf(x: f64, d1: f64, d2: f64) -> f64 {
    if !x.is_finite() {
        return if x == f64::INFINITY { 0.0 } else { f64::NAN };
    }
    FisherSnedecor::new(d1, d2)
        .map(|d| d.sf(x))
        .unwrap_or(f64::NAN)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Brown-Forsythe flavour of Levene's test (deviations from group medians).
pub fn levene(groups: &[&[f64]]) -> (f64, f64) {
    let k = groups.len() as f64;
    let n: f64 = groups.iter().map(|g| g.len() as f64).sum();
    let deviations: Vec<Vec<f64>> = groups
        .iter()
        .map(|g| {
            let m = median(g);
            g.iter().map(|y| (y - m).abs()).collect()
        })
        .collect();
    let group_means: Vec<f64> = deviations.iter().map(|z| mean(z)).collect();
    let grand_mean = deviations
        .iter()
        .zip(group_means.iter())
        .map(|(z, zm)| z.len() as f64 * zm)
        .sum::<f64>()
        / n;

    let between: f64 = deviations
        .iter()
        .zip(group_means.iter())
        .map(|(z, zm)| z.len() as f64 * (zm - grand_mean).powi(2))
        .sum();
    let within: f64 = deviations
        .iter()
        .zip(group_means.iter())
        .map(|(z, zm)| z.iter().map(|v| (v - zm).powi(2)).sum::<f64>())
        .sum();

    let statistic = (n - k) / (k - 1.0) * between / within;
    (statistic, f_sf(statistic, k - 1.0, n - k))
}

/// Bartlett's test for equal variances.
pub fn bartlett(groups: &[&[f64]]) -> (f64, f64) {
    let k = groups.len() as f64;
    let n: f64 = groups.iter().map(|g| g.len() as f64).sum();
    let variances: Vec<f64> = groups
        .iter()
        .map(|g| {
            let m = mean(g);
            g.iter().map(|y| (y - m).powi(2)).sum::<f64>() / (g.len() as f64 - 1.0)
        })
        .collect();
    let pooled = groups
        .iter()
        .zip(variances.iter())
        .map(|(g, v)| (g.len() as f64 - 1.0) * v)
        .sum::<f64>()
        / (n - k);

    let numerator = (n - k) * pooled.ln()
        - groups
            .iter()
            .zip(variances.iter())
            .map(|(g, v)| (g.len() as f64 - 1.0) * v.ln())
            .sum::<f64>();
    let correction = 1.0
        + (groups.iter().map(|g| 1.0 / (g.len() as f64 - 1.0)).sum::<f64>() - 1.0 / (n - k))
            / (3.0 * (k - 1.0));

    let statistic = numerator / correction;
    (statistic, chi2_sf(statistic, k - 1.0))
}

fn central_moment(values: &[f64], m: f64, order: i32) -> f64 {
    values.iter().map(|v| (v - m).powi(order)).sum::<f64>() / values.len() as f64
}

fn skew_z(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let m = mean(values);
    let b2 = central_moment(values, m, 3) / central_moment(values, m, 2).powf(1.5);
    let mut y = b2 * ((n + 1.0) * (n + 3.0) / (6.0 * (n - 2.0))).sqrt();
    let beta2 = 3.0 * (n * n + 27.0 * n - 70.0) * (n + 1.0) * (n + 3.0)
        / ((n - 2.0) * (n + 5.0) * (n + 7.0) * (n + 9.0));
    let w2 = -1.0 + (2.0 * (beta2 - 1.0)).sqrt();
    let delta = 1.0 / (0.5 * w2.ln()).sqrt();
    let alpha = (2.0 / (w2 - 1.0)).sqrt();
    if y == 0.0 {
        y = 1.0;
    }
    delta * (y / alpha + ((y / alpha).powi(2) + 1.0).sqrt()).ln()
}

fn kurtosis_z(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let m = mean(values);
    let b2 = central_moment(values, m, 4) / central_moment(values, m, 2).powi(2);
    let expected = 3.0 * (n - 1.0) / (n + 1.0);
    let var_b2 = 24.0 * n * (n - 2.0) * (n - 3.0) / ((n + 1.0).powi(2) * (n + 3.0) * (n + 5.0));
    let x = (b2 - expected) / var_b2.sqrt();
    let sqrt_beta1 = 6.0 * (n * n - 5.0 * n + 2.0) / ((n + 7.0) * (n + 9.0))
        * (6.0 * (n + 3.0) * (n + 5.0) / (n * (n - 2.0) * (n - 3.0))).sqrt();
    let a = 6.0 + 8.0 / sqrt_beta1 * (2.0 / sqrt_beta1 + (1.0 + 4.0 / sqrt_beta1.powi(2)).sqrt());
    let term1 = 1.0 - 2.0 / (9.0 * a);
    let denom = 1.0 + x * (2.0 / (a - 4.0)).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    let term2 = denom.signum() * ((1.0 - 2.0 / a) / denom.abs()).cbrt();
    (term1 - term2) / (2.0 / (9.0 * a)).sqrt()
}

/// D'Agostino and Pearson's omnibus normality test.
///
/// Returns `None` below eight observations or for constant data.
pub fn normal_test(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 8 {
        return None;
    }
    let m = mean(values);
    if central_moment(values, m, 2) <= 0.0 {
        return None;
    }
    let k2 = skew_z(values).powi(2) + kurtosis_z(values).powi(2);
    let p = chi2_sf(k2, 2.0);
    if p.is_nan() {
        None
    } else {
        Some((k2, p))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarianceTest {
    Bartlett,
    Levene,
}

impl VarianceTest {
    /// Bartlett when the population passes the normality test, Levene otherwise.
    pub fn for_population(values: &[f64]) -> Self {
        match normal_test(values) {
            Some((_, p)) if p > NORMALITY_ALPHA => VarianceTest::Bartlett,
            _ => VarianceTest::Levene,
        }
    }

    pub fn test(&self, groups: &[&[f64]]) -> (f64, f64) {
        match self {
            VarianceTest::Bartlett => bartlett(groups),
            VarianceTest::Levene => levene(groups),
        }
    }
}
