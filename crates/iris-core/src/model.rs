//! Trained model: a fitted forest plus the metadata stored alongside it

use crate::forest::{ForestConfig, RandomForest};
use crate::models::{
    FeatureImportance, FeatureName, FeatureVector, ProbabilityDistribution, Species,
};
use crate::predictor::Classifier;
use serde::{Deserialize, Serialize};

/// Descriptive information persisted with every model artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Content-derived version identifier, e.g. `rf-3f2a9c01b7de`
    pub version: String,
    /// Unix timestamp of training completion
    pub trained_at: i64,
    pub n_samples: usize,
    /// Accuracy on the training set itself
    pub training_accuracy: f64,
    pub config: ForestConfig,
    /// Feature display names in contract order
    pub feature_names: Vec<String>,
    /// Class names in contract order
    pub class_names: Vec<String>,
}

impl ModelMetadata {
    pub(crate) fn contract_feature_names() -> Vec<String> {
        FeatureName::ALL
            .iter()
            .map(|f| f.display_name().to_string())
            .collect()
    }

    pub(crate) fn contract_class_names() -> Vec<String> {
        Species::ALL.iter().map(|s| s.name().to_string()).collect()
    }
}

/// An immutable trained classifier.
///
/// Created once by training or loading an artifact, then shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    metadata: ModelMetadata,
    forest: RandomForest,
}

impl TrainedModel {
    pub(crate) fn new(metadata: ModelMetadata, forest: RandomForest) -> Self {
        Self { metadata, forest }
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }
}

impl Classifier for TrainedModel {
    fn predict_class(&self, features: &FeatureVector) -> Species {
        self.forest.predict(features)
    }

    fn predict_proba(&self, features: &FeatureVector) -> ProbabilityDistribution {
        self.forest.predict_proba(features)
    }

    fn feature_importance(&self) -> FeatureImportance {
        self.forest.feature_importance()
    }

    fn model_version(&self) -> &str {
        &self.metadata.version
    }
}
