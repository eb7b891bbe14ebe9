use chaid::conf::{MergeStrategy, TreeConfig};
use chaid::error::ConfigError;
use chaid::split::{InvalidSplitReason, Split};

#[test]
fn defaults() {
    let config = TreeConfig::default();
    assert_eq!(config.alpha_merge, 0.05);
    assert_eq!(config.max_depth, 2);
    assert_eq!(config.min_parent_node_size, 30);
    assert_eq!(config.min_child_node_size, 30);
    assert_eq!(config.split_threshold, 0.0);
    assert!(!config.is_exhaustive);
    assert_eq!(config.strategy, MergeStrategy::Greedy);
    assert!(config.validate().is_ok());
}

#[test]
fn json_round_trip() {
    let config = TreeConfig::default()
        .with_max_depth(4)
        .with_exhaustive(true)
        .with_strategy(MergeStrategy::BruteForce);
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"strategy\":\"BruteForce\""), "{json}");
    let back: TreeConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn missing_fields_take_defaults() {
    let config: TreeConfig = serde_json::from_str(r#"{"alpha_merge": 0.01, "max_depth": 5}"#).unwrap();
    assert_eq!(config.alpha_merge, 0.01);
    assert_eq!(config.max_depth, 5);
    assert_eq!(config.min_child_node_size, 30);
    assert_eq!(config.strategy, MergeStrategy::Greedy);
}

#[test]
fn validate_rejects_out_of_range() {
    for alpha in [0.0, 1.0, -0.1, f64::NAN] {
        let err = TreeConfig::default().with_alpha_merge(alpha).validate();
        assert!(matches!(err, Err(ConfigError::AlphaMerge(_))), "alpha = {alpha}");
    }
    let err = TreeConfig::default().with_split_threshold(1.0).validate();
    assert_eq!(err, Err(ConfigError::SplitThreshold(1.0)));
    assert!(TreeConfig::default().with_split_threshold(0.5).validate().is_ok());
}

#[test]
fn restrictions_mirror_config() {
    let r = TreeConfig::default()
        .with_alpha_merge(0.1)
        .with_min_child_node_size(12)
        .with_split_threshold(0.25)
        .with_exhaustive(true)
        .split_restrictions();
    assert_eq!(r.alpha_merge, 0.1);
    assert_eq!(r.min_child_node_size, 12.0);
    assert!(r.is_exhaustive);
    assert!(r.is_group_size_valid(12.0));
    assert!(!r.is_group_size_valid(11.5));
    assert_eq!(r.surrogate_threshold(&Split::invalid(InvalidSplitReason::PureNode)), 0.0);
}

#[test]
fn invalid_reasons_have_messages() {
    assert_eq!(
        InvalidSplitReason::MaxDepth.to_string(),
        "the max depth has been reached"
    );
    assert_eq!(
        InvalidSplitReason::PureNode.message(),
        "the node only contains single category respondents"
    );
    let split = Split::invalid(InvalidSplitReason::MinParentNodeSize);
    assert!(!split.is_valid());
    assert_eq!(split.predictor_index(), None);
    assert_eq!(split.p_value(), 1.0);
    assert_eq!(split.statistic(), 0.0);
}
