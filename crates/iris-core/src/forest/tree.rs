//! CART decision tree grown on a bootstrap sample
//!
//! Splits minimize weighted Gini impurity over a random subset of features.
//! Leaves keep the class counts of the samples that reached them so the
//! forest can average class distributions instead of hard votes.

use crate::models::{NUM_CLASSES, NUM_FEATURES};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

pub(crate) type ClassCounts = [u32; NUM_CLASSES];

/// A node in a decision tree (either a split or a leaf).
///
/// Trees are stored flat; children are referenced by their index in the
/// tree's node list and always come after their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Samples with `x[feature] <= threshold` go left, the rest go right
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf { class_counts: ClassCounts },
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub max_features: usize,
}

/// A fitted classification tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Pre-order node list, root at index 0
    nodes: Vec<TreeNode>,
    /// Total weighted impurity decrease per feature, not normalized
    impurity_decrease: [f64; NUM_FEATURES],
}

impl DecisionTree {
    /// Grow a tree over the rows of `x` selected by `indices`.
    ///
    /// `indices` may contain duplicates (bootstrap sampling); each occurrence
    /// counts as one sample.
    pub(crate) fn fit(
        x: &[[f64; NUM_FEATURES]],
        y: &[usize],
        indices: Vec<usize>,
        params: TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut builder = TreeBuilder {
            x,
            y,
            params,
            nodes: Vec::new(),
            impurity_decrease: [0.0; NUM_FEATURES],
        };
        builder.build(indices, 0, rng);
        Self {
            nodes: builder.nodes,
            impurity_decrease: builder.impurity_decrease,
        }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Longest root-to-leaf path; a single leaf has depth 0
    pub fn depth(&self) -> usize {
        // Children follow their parent, so one forward pass sees every parent first
        let mut depths = vec![0usize; self.nodes.len()];
        let mut max_depth = 0;
        for (idx, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split { left, right, .. } = node {
                let child_depth = depths[idx] + 1;
                for &child in [left, right] {
                    if let Some(slot) = depths.get_mut(child) {
                        *slot = child_depth;
                    }
                }
                max_depth = max_depth.max(child_depth);
            }
        }
        max_depth
    }

    /// Class distribution of the leaf reached by `x`
    pub fn predict_proba(&self, x: &[f64; NUM_FEATURES]) -> [f64; NUM_CLASSES] {
        let mut idx = 0;
        while let Some(node) = self.nodes.get(idx) {
            match node {
                TreeNode::Leaf { class_counts } => return normalize_counts(class_counts),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
        // Only reachable for an empty tree, which validation rejects
        [1.0 / NUM_CLASSES as f64; NUM_CLASSES]
    }

    /// Per-feature impurity decrease normalized to sum to 1.0.
    ///
    /// A tree that never split returns all zeros.
    pub fn feature_importances(&self) -> [f64; NUM_FEATURES] {
        let total: f64 = self.impurity_decrease.iter().sum();
        if total <= 0.0 {
            return [0.0; NUM_FEATURES];
        }
        self.impurity_decrease.map(|v| v / total)
    }

    /// Structural checks for a tree grown on `n_samples` bootstrap draws.
    ///
    /// Every node other than the root must be the child of exactly one
    /// earlier node, and the leaf counts must add up to `n_samples`, which
    /// also bounds the node count at `2 * n_samples - 1`.
    pub(crate) fn validate(&self, n_samples: usize) -> Result<(), String> {
        if self.impurity_decrease.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err("tree has invalid impurity statistics".to_string());
        }
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        let max_nodes = (2 * n_samples).saturating_sub(1);
        if self.nodes.len() > max_nodes {
            return Err(format!(
                "tree has {} nodes, more than the {} possible for {} samples",
                self.nodes.len(),
                max_nodes,
                n_samples
            ));
        }

        let mut referenced = vec![false; self.nodes.len()];
        let mut leaf_samples: u64 = 0;
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { class_counts } => {
                    let samples: u64 = class_counts.iter().map(|&c| u64::from(c)).sum();
                    if samples == 0 {
                        return Err(format!("leaf {} has no samples", idx));
                    }
                    leaf_samples += samples;
                }
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= NUM_FEATURES {
                        return Err(format!("split on unknown feature index {}", feature));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("split {} has a non-finite threshold", idx));
                    }
                    for &child in [left, right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("split {} has invalid child index {}", idx, child));
                        }
                        if std::mem::replace(&mut referenced[child], true) {
                            return Err(format!("node {} has more than one parent", child));
                        }
                    }
                }
            }
        }

        if let Some(orphan) = referenced.iter().skip(1).position(|&r| !r) {
            return Err(format!("node {} is unreachable", orphan + 1));
        }
        if leaf_samples != n_samples as u64 {
            return Err(format!(
                "leaves hold {} samples, expected {}",
                leaf_samples, n_samples
            ));
        }
        Ok(())
    }
}

struct TreeBuilder<'a> {
    x: &'a [[f64; NUM_FEATURES]],
    y: &'a [usize],
    params: TreeParams,
    nodes: Vec<TreeNode>,
    impurity_decrease: [f64; NUM_FEATURES],
}

struct Split {
    feature: usize,
    threshold: f64,
    /// Weighted child impurity, `n_left * gini_left + n_right * gini_right`
    child_impurity: f64,
}

impl TreeBuilder<'_> {
    /// Append the subtree for `indices` and return the index of its root
    fn build(&mut self, indices: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let id = self.nodes.len();
        let class_counts = self.class_counts(&indices);
        let n_samples = indices.len();

        let is_pure = class_counts.iter().filter(|&&c| c > 0).count() <= 1;
        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
        if is_pure || depth_reached || n_samples < self.params.min_samples_split {
            self.nodes.push(TreeNode::Leaf { class_counts });
            return id;
        }

        let Some(split) = self.find_best_split(&indices, rng) else {
            self.nodes.push(TreeNode::Leaf { class_counts });
            return id;
        };

        let parent_impurity = n_samples as f64 * gini(&class_counts);
        self.impurity_decrease[split.feature] += (parent_impurity - split.child_impurity).max(0.0);

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[i][split.feature] <= split.threshold);

        // Reserve the slot so children land after their parent
        self.nodes.push(TreeNode::Leaf { class_counts });
        let left = self.build(left, depth + 1, rng);
        let right = self.build(right, depth + 1, rng);
        self.nodes[id] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    /// Evaluate `max_features` randomly chosen features; keep drawing from the
    /// remaining ones while none of them admits a valid partition.
    fn find_best_split(&self, indices: &[usize], rng: &mut StdRng) -> Option<Split> {
        let mut features: Vec<usize> = (0..NUM_FEATURES).collect();
        features.shuffle(rng);

        let mut best: Option<Split> = None;
        for (visited, &feature) in features.iter().enumerate() {
            if visited >= self.params.max_features && best.is_some() {
                break;
            }
            if let Some(candidate) = self.best_split_for_feature(indices, feature) {
                let better = best
                    .as_ref()
                    .map_or(true, |b| candidate.child_impurity < b.child_impurity);
                if better {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    fn best_split_for_feature(&self, indices: &[usize], feature: usize) -> Option<Split> {
        if indices.len() < 2 {
            return None;
        }
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_by(|&a, &b| {
            self.x[a][feature]
                .partial_cmp(&self.x[b][feature])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let n = sorted.len();
        let mut left_counts: ClassCounts = [0; NUM_CLASSES];
        let mut right_counts = self.class_counts(&sorted);
        let mut best: Option<Split> = None;

        for pos in 0..n - 1 {
            let label = self.y[sorted[pos]];
            left_counts[label] += 1;
            right_counts[label] -= 1;

            let current = self.x[sorted[pos]][feature];
            let next = self.x[sorted[pos + 1]][feature];
            if current >= next {
                continue;
            }

            let n_left = (pos + 1) as f64;
            let n_right = (n - pos - 1) as f64;
            let child_impurity = n_left * gini(&left_counts) + n_right * gini(&right_counts);

            if best.as_ref().map_or(true, |b| child_impurity < b.child_impurity) {
                let mut threshold = current + (next - current) / 2.0;
                if threshold >= next {
                    threshold = current;
                }
                best = Some(Split {
                    feature,
                    threshold,
                    child_impurity,
                });
            }
        }
        best
    }

    fn class_counts(&self, indices: &[usize]) -> ClassCounts {
        let mut counts: ClassCounts = [0; NUM_CLASSES];
        for &i in indices {
            counts[self.y[i]] += 1;
        }
        counts
    }
}

/// Gini impurity `1 - Σ p_i²` of a class-count histogram
pub(crate) fn gini(counts: &ClassCounts) -> f64 {
    let total: u32 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
}

fn normalize_counts(counts: &ClassCounts) -> [f64; NUM_CLASSES] {
    let total: u32 = counts.iter().sum();
    if total == 0 {
        return [1.0 / NUM_CLASSES as f64; NUM_CLASSES];
    }
    counts.map(|c| c as f64 / total as f64)
}
