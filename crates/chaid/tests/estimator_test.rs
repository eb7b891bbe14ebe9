use chaid::column::ColumnKind;
use chaid::conf::TreeConfig;
use chaid::dataframe::{raw_values_to_series, ChaidDataFrameExt, ChaidSeriesExt};
use chaid::error::ChaidError;
use chaid::estimator::ChaidTree;
use chaid::tree::Tree;
use chaid::value::RawValue;
use estimator_api::api::{Estimator, FitError, PredictError};
use polars::prelude::*;

fn nested_frames() -> (DataFrame, DataFrame) {
    let side: Vec<&str> = (0..80).map(|i| if i < 40 { "l" } else { "r" }).collect();
    let level: Vec<&str> = (0..80).map(|i| if i % 40 < 20 { "u" } else { "d" }).collect();
    let target: Vec<&str> = (0..80)
        .map(|i| match (i < 40, i % 40 < 20) {
            (true, true) => "x",
            (true, false) => "y",
            (false, _) => "z",
        })
        .collect();
    let x = df!("side" => side, "level" => level).unwrap();
    let y = df!("target" => target).unwrap();
    (x, y)
}

#[test]
fn fit_and_predict_dataframe() {
    let (x, y) = nested_frames();
    let mut model = ChaidTree::new(TreeConfig::default().with_min_child_node_size(20));
    model.fit(&x, &y, None).unwrap();

    assert_eq!(model.predictors(), &["side".to_string(), "level".to_string()]);
    assert_eq!(model.dependent_name(), Some("target"));
    assert_eq!(model.tree().unwrap().num_nodes(), 5);

    let out = model.predict(&x).unwrap();
    assert_eq!(out.height(), 80);
    let node_id = out.column("node_id").unwrap().u32().unwrap();
    assert_eq!(node_id.get(0), Some(3));
    assert_eq!(node_id.get(79), Some(4));
    let prediction = out.column("prediction").unwrap().str().unwrap();
    assert_eq!(prediction.get(0), Some("x"));
    assert_eq!(prediction.get(30), Some("y"));
    assert_eq!(prediction.get(50), Some("z"));
}

#[test]
fn predict_before_fit_fails() {
    let (x, _) = nested_frames();
    let model = ChaidTree::default();
    assert!(matches!(model.predict(&x), Err(PredictError::NotFitted)));
}

#[test]
fn mismatched_heights_are_rejected() {
    let (x, _) = nested_frames();
    let y = df!("target" => &["x", "y"]).unwrap();
    let mut model = ChaidTree::default();
    assert!(matches!(model.fit(&x, &y, None), Err(FitError::InvalidInput(_))));
}

#[test]
fn continuous_predictor_is_an_input_error() {
    let x = df!("income" => &[1.0_f64, 2.0, 3.0]).unwrap();
    let y = df!("target" => &["a", "b", "a"]).unwrap();
    let mut model = ChaidTree::default().with_variable_type("income", ColumnKind::Continuous);
    match model.fit(&x, &y, None) {
        Err(FitError::InvalidInput(msg)) => assert!(msg.contains("income"), "{msg}"),
        other => panic!("expected invalid input, got {other:?}"),
    }
}

#[test]
fn sample_weights_reach_the_tree() {
    let mut segment = Vec::new();
    let mut target = Vec::new();
    for (label, major) in [("c1", "x"), ("c2", "y"), ("c3", "z")] {
        for i in 0..30 {
            segment.push(label);
            target.push(match i {
                0..=23 => major,
                24..=26 => if major == "x" { "y" } else { "x" },
                _ => if major == "z" { "y" } else { "z" },
            });
        }
    }
    let x = df!("segment" => segment).unwrap();
    let y = df!("target" => target).unwrap();
    let weights = Float64Chunked::full(PlSmallStr::from_static("w"), 2.0, 90);

    let config = TreeConfig::default().with_max_depth(1).with_min_child_node_size(60);
    let mut model = ChaidTree::new(config.clone());
    model.fit(&x, &y, Some(&weights)).unwrap();
    assert_eq!(model.tree().unwrap().num_nodes(), 4);

    let mut model = ChaidTree::new(config.clone());
    model.fit(&x, &y, None).unwrap();
    assert_eq!(model.tree().unwrap().num_nodes(), 1);
}

#[test]
fn tree_from_dataframe() {
    let (x, y) = nested_frames();
    let df = x.hstack(y.get_columns()).unwrap();
    let tree = Tree::from_dataframe(
        &df,
        &[("side", ColumnKind::Nominal), ("level", ColumnKind::Nominal)],
        ("target", ColumnKind::Nominal),
        None,
        TreeConfig::default().with_min_child_node_size(20),
    )
    .unwrap();
    assert_eq!(tree.num_nodes(), 5);
    assert_eq!(tree.predictor_names(), &["side".to_string(), "level".to_string()]);

    let missing = Tree::from_dataframe(
        &df,
        &[("age", ColumnKind::Ordinal)],
        ("target", ColumnKind::Nominal),
        None,
        TreeConfig::default(),
    );
    assert!(matches!(missing, Err(ChaidError::MissingColumn(name)) if name == "age"));
}

#[test]
fn series_values_convert_to_raw() {
    let s = Series::new(PlSmallStr::from_static("a"), &[Some(3_i32), None, Some(1)]);
    assert_eq!(
        s.raw_values().unwrap(),
        vec![RawValue::Int(3), RawValue::Missing, RawValue::Int(1)]
    );

    let s = Series::new(PlSmallStr::from_static("b"), &[Some(1.5_f64), Some(f64::NAN), None]);
    assert_eq!(
        s.raw_values().unwrap(),
        vec![RawValue::Float(1.5), RawValue::Missing, RawValue::Missing]
    );

    let s = Series::new(PlSmallStr::from_static("c"), &[true, false]);
    assert_eq!(s.raw_values().unwrap(), vec![RawValue::Bool(true), RawValue::Bool(false)]);
}

#[test]
fn row_values_follow_requested_columns() {
    let df = df!("a" => &[1_i64, 2], "b" => &["p", "q"]).unwrap();
    let rows = df.row_values(&["b", "a"]).unwrap();
    assert_eq!(
        rows,
        vec![
            vec![RawValue::from("p"), RawValue::Int(1)],
            vec![RawValue::from("q"), RawValue::Int(2)],
        ]
    );
    assert!(df.row_values(&["missing"]).is_err());
}

#[test]
fn predictions_pick_narrowest_dtype() {
    let ints = raw_values_to_series("p", &[RawValue::Int(1), RawValue::Missing]);
    assert_eq!(ints.dtype(), &DataType::Int64);
    assert_eq!(ints.null_count(), 1);

    let floats = raw_values_to_series("p", &[RawValue::Int(1), RawValue::Float(2.5)]);
    assert_eq!(floats.dtype(), &DataType::Float64);

    let strings = raw_values_to_series("p", &[RawValue::from("a"), RawValue::Bool(true)]);
    assert_eq!(strings.dtype(), &DataType::String);
}
