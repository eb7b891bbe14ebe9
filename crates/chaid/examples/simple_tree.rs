use chaid::column::ColumnKind;
use chaid::conf::TreeConfig;
use chaid::tree::Tree;
use polars::prelude::*;
use std::time::Instant;

fn generate_sample_dataframe(n_samples: usize) -> DataFrame {
    let mut region: Vec<Option<&str>> = Vec::with_capacity(n_samples);
    let mut age_band: Vec<Option<i64>> = Vec::with_capacity(n_samples);
    let mut noise: Vec<Option<i64>> = Vec::with_capacity(n_samples);
    let mut target_strs: Vec<Option<&str>> = Vec::with_capacity(n_samples);

    for i in 0..n_samples {
        let r = ["north", "south", "east", "west"][i % 4];
        // every 17th age is unknown
        let age = if i % 17 == 0 { None } else { Some(((i * 7) % 5) as i64) };
        region.push(Some(r));
        age_band.push(age);
        noise.push(Some(((i * 13) % 3) as i64));

        // answers depend on region, and on age band in the north
        let yes = match r {
            "north" => age.is_some_and(|a| a >= 2),
            "south" => i % 10 < 8,
            _ => i % 10 < 3,
        };
        target_strs.push(Some(if yes { "yes" } else { "no" }));
    }

    let target = Series::new(PlSmallStr::from_static("answer"), target_strs);
    let cats = FrozenCategories::new(["no", "yes"]).unwrap();
    let target = target
        .cast(&DataType::from_frozen_categories(cats))
        .unwrap();

    let cols: Vec<Column> = vec![
        Series::new(PlSmallStr::from_static("region"), region).into(),
        Series::new(PlSmallStr::from_static("age_band"), age_band).into(),
        Series::new(PlSmallStr::from_static("noise"), noise).into(),
        target.into(),
    ];
    DataFrame::new(cols).unwrap()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== Simple CHAID Tree (Polars) ===");

    let df = generate_sample_dataframe(2000);
    println!(
        "DataFrame shape: {{ rows: {}, cols: {} }}",
        df.height(),
        df.width()
    );
    println!("Columns: {:?}", df.get_column_names());

    let config = TreeConfig::default()
        .with_max_depth(3)
        .with_min_parent_node_size(50)
        .with_min_child_node_size(30)
        .with_split_threshold(0.2);

    println!("\nFitting tree...");
    let start_time = Instant::now();
    let tree = Tree::from_dataframe(
        &df,
        &[
            ("region", ColumnKind::Nominal),
            ("age_band", ColumnKind::Ordinal),
            ("noise", ColumnKind::Nominal),
        ],
        ("answer", ColumnKind::Nominal),
        None,
        config,
    )
    .expect("tree fit");
    println!("Tree fitting took: {:?}", start_time.elapsed());

    println!("\n{}", tree.tree_info());

    println!("Nodes:");
    for node in tree.nodes() {
        let indent = "  ".repeat(tree.depth(node.node_id) + 1);
        println!("{}{}", indent, node);
        for surrogate in node.split.surrogates() {
            println!("{}  surrogate: {}", indent, surrogate);
        }
    }

    println!("\nClassification rules:");
    for rule in tree.classification_rules(None) {
        println!("  {}", rule);
    }

    println!(
        "\nTraining accuracy: {:.4} (risk {:.4})",
        tree.accuracy().expect("fitted"),
        tree.risk().expect("fitted")
    );
}
