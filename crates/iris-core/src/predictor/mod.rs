//! Inference pipeline

mod features;
mod inference;
mod output;


pub use features::FeatureExtractor;
pub use inference::{InferencePipeline, InferenceStats, MAX_INFERENCE_MS};
pub use output::{OutputConfig, OutputFormatter, LOW_CONFIDENCE_THRESHOLD};

use crate::models::{FeatureImportance, FeatureVector, ProbabilityDistribution, Species};

/// Contract every model served by the pipeline must satisfy.
///
/// Implementations are immutable after construction so they can be shared
/// across threads without locking.
pub trait Classifier: Send + Sync {
    /// Discrete class decision; must equal the argmax of `predict_proba`
    fn predict_class(&self, features: &FeatureVector) -> Species;

    /// Probability per class, summing to 1.0
    fn predict_proba(&self, features: &FeatureVector) -> ProbabilityDistribution;

    /// Global feature importance computed at training time
    fn feature_importance(&self) -> FeatureImportance;

    /// Identifier of the loaded model
    fn model_version(&self) -> &str;
}
