//! Binary classifiers for access-grant prediction.
//!
//! Four classifier families behind one [`Estimator`]/[`Model`] interface:
//! L2 logistic regression, a bootstrap random forest and Newton-boosted
//! trees over one-hot indicators, and a boosted ensemble of oblivious trees
//! fed by ordered target statistics over raw categories. [`Pipeline`] binds a
//! preprocessor to an estimator; [`SoftVoting`] averages fitted pipelines.

mod boosting;
mod borders;
mod categorical;
mod config;
mod ctr;
mod error;
mod estimator;
mod forest;
mod importance;
mod logistic;
mod node;
mod pipeline;
mod split;
mod tree;
mod voting;

pub use boosting::{GradientBoostedTrees, GradientBoostingConfig};
pub use categorical::{CategoricalBoosting, CategoricalBoostingConfig};
pub use config::{MaxFeatures, RandomForestConfig};
pub use error::ModelError;
pub use estimator::{DECISION_THRESHOLD, Estimator, FeatureImportance, Model, decide};
pub use forest::RandomForest;
pub use importance::{RankedFeature, rank_features};
pub use logistic::{LogisticRegression, LogisticRegressionConfig};
pub use node::{FeatureIndex, Impurity, Node, NodeIndex};
pub use pipeline::{FittedPipeline, Pipeline};
pub use split::SplitCriterion;
pub use tree::{DecisionTree, DecisionTreeConfig};
pub use voting::{DynEstimator, FittedSoftVoting, SoftVoting};
