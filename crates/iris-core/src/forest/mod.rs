//! Random forest classifier
//!
//! An ensemble of CART trees, each grown on a bootstrap sample with a random
//! feature subset per split. Class probabilities are the mean of the per-tree
//! leaf distributions; the predicted class is their argmax.

mod tree;

pub use tree::{DecisionTree, TreeNode};

use crate::error::{IrisError, Result};
use crate::models::{FeatureImportance, FeatureVector, ProbabilityDistribution, Species};
use crate::models::{NUM_CLASSES, NUM_FEATURES};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;
use tree::TreeParams;

/// Default number of trees in the forest
pub const DEFAULT_N_ESTIMATORS: usize = 100;

/// Default seed; training is always seeded so runs are reproducible
pub const DEFAULT_SEED: u64 = 42;

/// Hyperparameters for forest construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum tree depth (unlimited when `None`)
    pub max_depth: Option<usize>,
    /// Minimum samples a node needs before it may split
    pub min_samples_split: usize,
    /// Features evaluated per split (`floor(sqrt(n_features))` when `None`)
    pub max_features: Option<usize>,
    /// Seed for bootstrap sampling and feature selection
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: DEFAULT_N_ESTIMATORS,
            max_depth: None,
            min_samples_split: 2,
            max_features: None,
            seed: DEFAULT_SEED,
        }
    }
}

impl ForestConfig {
    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(IrisError::InvalidInput(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(IrisError::InvalidInput(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if let Some(max_features) = self.max_features {
            if max_features == 0 || max_features > NUM_FEATURES {
                return Err(IrisError::InvalidInput(format!(
                    "max_features must be between 1 and {}",
                    NUM_FEATURES
                )));
            }
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        let default_features = ((NUM_FEATURES as f64).sqrt().floor() as usize).max(1);
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            max_features: self.max_features.unwrap_or(default_features),
        }
    }
}

/// A fitted random forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    config: ForestConfig,
    importance: FeatureImportance,
}

impl RandomForest {
    /// Fit a forest on labeled rows.
    ///
    /// Callers are expected to have checked that the data is non-empty and
    /// finite; `crate::training::train` does this.
    pub fn fit(x: &[[f64; NUM_FEATURES]], y: &[usize], config: ForestConfig) -> Result<Self> {
        config.validate()?;
        if x.is_empty() || x.len() != y.len() {
            return Err(IrisError::InvalidInput(format!(
                "feature rows ({}) and labels ({}) must be non-empty and of equal length",
                x.len(),
                y.len()
            )));
        }
        if let Some(bad) = y.iter().find(|&&label| label >= NUM_CLASSES) {
            return Err(IrisError::InvalidInput(format!("unknown class index {}", bad)));
        }

        let params = config.tree_params();
        let n_samples = x.len();
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut trees = Vec::with_capacity(config.n_estimators);

        for _ in 0..config.n_estimators {
            let bootstrap: Vec<usize> = (0..n_samples)
                .map(|_| rng.gen_range(0..n_samples))
                .collect();
            trees.push(DecisionTree::fit(x, y, bootstrap, params, &mut rng));
        }

        let importance = aggregate_importance(&trees);
        debug!(
            n_trees = trees.len(),
            max_depth = trees.iter().map(DecisionTree::depth).max().unwrap_or(0),
            "Random forest fitted"
        );

        Ok(Self {
            trees,
            config,
            importance,
        })
    }

    /// Mean of the per-tree class distributions
    pub fn predict_proba(&self, features: &FeatureVector) -> ProbabilityDistribution {
        let x = features.as_array();
        let mut sum = [0.0; NUM_CLASSES];
        for tree in &self.trees {
            for (acc, p) in sum.iter_mut().zip(tree.predict_proba(&x)) {
                *acc += p;
            }
        }
        let n_trees = self.trees.len() as f64;
        ProbabilityDistribution::new(sum.map(|s| s / n_trees))
    }

    pub fn predict(&self, features: &FeatureVector) -> Species {
        self.predict_proba(features).argmax()
    }

    /// Fraction of samples whose predicted class matches the label
    pub fn score(&self, samples: &[(FeatureVector, Species)]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let correct = samples
            .iter()
            .filter(|(features, label)| self.predict(features) == *label)
            .count();
        correct as f64 / samples.len() as f64
    }

    /// Mean decrease in impurity, computed once at fit time
    pub fn feature_importance(&self) -> FeatureImportance {
        self.importance
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Structural checks for forests that came from outside this process,
    /// given the training set size recorded alongside them
    pub(crate) fn validate(&self, n_samples: usize) -> std::result::Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        let weights = self.importance.as_slice();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err("forest has invalid feature importance".to_string());
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(n_samples).map_err(|e| format!("tree {}: {}", idx, e))?;
        }
        Ok(())
    }
}

/// Average normalized per-tree importances and renormalize.
///
/// A forest in which no tree ever split reports uniform importance.
fn aggregate_importance(trees: &[DecisionTree]) -> FeatureImportance {
    let mut total = [0.0; NUM_FEATURES];
    for tree in trees {
        for (acc, w) in total.iter_mut().zip(tree.feature_importances()) {
            *acc += w;
        }
    }
    let sum: f64 = total.iter().sum();
    if sum <= 0.0 {
        return FeatureImportance::new([1.0 / NUM_FEATURES as f64; NUM_FEATURES]);
    }
    FeatureImportance::new(total.map(|w| w / sum))
}
