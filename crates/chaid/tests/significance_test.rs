use approx::assert_relative_eq;
use chaid::significance::{
    bartlett, chi2_sf, chisquare, iterative_proportional_fit, levene, normal_test,
    ContingencyTable, VarianceTest,
};

fn table(rows: &[&[f64]]) -> ContingencyTable {
    ContingencyTable::from_rows(rows.iter().map(|r| r.to_vec()).collect())
}

#[test]
fn rows_are_padded_to_widest() {
    let t = ContingencyTable::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0]]);
    assert_eq!(t.n_rows(), 2);
    assert_eq!(t.n_cols(), 3);
    assert_eq!(t.cells()[1], vec![4.0, 0.0, 0.0]);
    assert_eq!(t.row_sums(), vec![6.0, 4.0]);
    assert_eq!(t.col_sums(), vec![5.0, 2.0, 3.0]);
    assert_eq!(t.total(), 10.0);
    assert_eq!(t.dof(), 2);
}

#[test]
fn chisquare_unweighted_two_by_two() {
    let result = chisquare(&table(&[&[3.0, 1.0], &[0.0, 3.0]]), false);
    assert_relative_eq!(result.statistic, 3.9375, epsilon = 1e-9);
    assert_eq!(result.dof, 1);
    assert!(
        (result.p_value - 0.0472).abs() < 5e-4,
        "expected p close to 0.0472, got {}",
        result.p_value
    );
}

#[test]
fn chisquare_independent_table_is_not_significant() {
    let result = chisquare(&table(&[&[10.0, 20.0], &[20.0, 40.0]]), false);
    assert_relative_eq!(result.statistic, 0.0, epsilon = 1e-12);
    assert_relative_eq!(result.p_value, 1.0, epsilon = 1e-12);
}

#[test]
fn weighted_matches_unweighted_without_zero_cells() {
    let t = table(&[&[3.0, 1.0, 4.0], &[2.0, 3.0, 1.5]]);
    let plain = chisquare(&t, false);
    let weighted = chisquare(&t, true);
    assert_relative_eq!(plain.statistic, weighted.statistic, epsilon = 1e-6);
    assert_relative_eq!(plain.p_value, weighted.p_value, epsilon = 1e-6);
    assert_eq!(plain.dof, weighted.dof);
}

#[test]
fn fitted_table_reproduces_margins() {
    let t = table(&[&[3.0, 1.0], &[0.0, 3.0], &[2.5, 0.5]]);
    let fitted = iterative_proportional_fit(&t);

    for (row, expected) in fitted.iter().zip(t.row_sums()) {
        assert_relative_eq!(row.iter().sum::<f64>(), expected, epsilon = 1e-4);
    }
    for (j, expected) in t.col_sums().into_iter().enumerate() {
        let sum: f64 = fitted.iter().map(|r| r[j]).sum();
        assert_relative_eq!(sum, expected, epsilon = 1e-4);
    }
    assert!(fitted[1][0] > 0.0, "zero cells stay strictly positive");
}

#[test]
fn chi2_sf_edges() {
    assert_eq!(chi2_sf(f64::INFINITY, 3.0), 0.0);
    assert!(chi2_sf(f64::NAN, 3.0).is_nan());
    assert_relative_eq!(chi2_sf(0.0, 2.0), 1.0, epsilon = 1e-12);
    // dof = 2 is exponential with mean 2
    assert_relative_eq!(chi2_sf(4.0, 2.0), (-2.0f64).exp(), epsilon = 1e-10);
}

#[test]
fn levene_uses_median_deviations() {
    let a = [1.0, 2.0, 3.0, 4.0, 5.0];
    let b = [2.0, 4.0, 6.0, 8.0, 10.0];
    let (w, p) = levene(&[&a, &b]);
    assert_relative_eq!(w, 2.057142857142857, epsilon = 1e-9);
    assert!(p > 0.15 && p < 0.25, "p = {p}");
}

#[test]
fn bartlett_two_groups() {
    let a = [1.0, 2.0, 3.0, 4.0, 5.0];
    let b = [2.0, 4.0, 6.0, 8.0, 10.0];
    let (t, p) = bartlett(&[&a, &b]);
    assert_relative_eq!(t, 1.586799, epsilon = 1e-4);
    assert!((p - 0.2078).abs() < 1e-3, "p = {p}");
}

#[test]
fn equal_spread_gives_high_p() {
    let a = [9.0, 10.0, 11.0, 9.5, 10.5];
    let b = [49.0, 50.0, 51.0, 49.5, 50.5];
    let (w, p) = levene(&[&a, &b]);
    assert!(w < 1e-9, "w = {w}");
    assert!(p > 0.99, "p = {p}");
}

#[test]
fn normal_test_needs_eight_values() {
    assert!(normal_test(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]).is_none());
    assert!(normal_test(&[2.0; 12]).is_none());
}

#[test]
fn variance_test_selection() {
    let bell = [
        -2.0, -1.5, -1.0, -1.0, -0.5, -0.5, -0.5, 0.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.5, 1.0, 1.0,
        1.5, 2.0,
    ];
    let (_, p) = normal_test(&bell).unwrap();
    assert!(p > 0.05, "bell-shaped sample rejected with p = {p}");
    assert_eq!(VarianceTest::for_population(&bell), VarianceTest::Bartlett);

    let skewed = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 100.0];
    assert_eq!(VarianceTest::for_population(&skewed), VarianceTest::Levene);
    assert_eq!(VarianceTest::for_population(&[1.0, 2.0]), VarianceTest::Levene);
}
