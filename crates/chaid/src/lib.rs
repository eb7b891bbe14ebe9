//! # CHAID
//!
//! Chi-squared Automatic Interaction Detection decision trees.
//!
//! A CHAID tree segments a population by repeatedly splitting on the
//! predictor whose categories differ most significantly in the dependent
//! variable. Each predictor's categories are first merged greedily while
//! pairs of them are statistically indistinguishable.
//!
//! ## Key Features
//!
//! - **Nominal and ordinal predictors**: ordinal categories only merge with neighbours
//! - **Categorical and continuous dependents**: chi-square, or Bartlett/Levene variance tests
//! - **Row weights**: weighted chi-square via iterative proportional fitting
//! - **Surrogate splits**: near-equivalent alternatives kept alongside each split
//!
//! ## Example
//!
//! ```rust,ignore
//! use chaid::column::{Column, ColumnKind};
//! use chaid::conf::TreeConfig;
//! use chaid::tree::Tree;
//! use chaid::value::raw_values;
//!
//! let predictor = Column::from_raw(&raw_values(&["a", "a", "b", "b"]), ColumnKind::Nominal)?
//!     .with_name("group");
//! let dependent = Column::from_raw(&raw_values(&[1, 1, 2, 2]), ColumnKind::Nominal)?;
//!
//! let mut tree = Tree::new(TreeConfig::default().with_min_child_node_size(0));
//! tree.fit(vec![predictor], dependent)?;
//! for rule in tree.classification_rules(None) {
//!     println!("{}", rule);
//! }
//! ```

pub mod column;
pub mod conf;
pub mod dataframe;
pub mod error;
pub mod estimator;
pub mod node;
pub mod rules;
pub mod significance;
pub mod split;
pub mod stats;
pub mod tree;
pub mod value;

pub use column::{Column, ColumnKind};
pub use conf::{MergeStrategy, TreeConfig};
pub use error::{ChaidError, ConfigError};
pub use estimator::ChaidTree;
pub use split::{InvalidSplitReason, Split};
pub use tree::Tree;
pub use value::RawValue;
