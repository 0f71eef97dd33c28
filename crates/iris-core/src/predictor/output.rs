//! Prediction output assembly
//!
//! Combines the model's probabilities with the input and range checks into a
//! `Prediction`, and scores how much the caller should trust it.

use crate::models::{FeatureName, FeatureVector, Prediction, ProbabilityDistribution};

/// Top-class probability below which a prediction counts as low confidence
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Configuration for output assembly
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub low_confidence_threshold: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: LOW_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Builds `Prediction` values from raw model outputs
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter {
    config: OutputConfig,
}

impl OutputFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn format(
        &self,
        features: FeatureVector,
        probabilities: ProbabilityDistribution,
        out_of_range: Vec<FeatureName>,
        model_version: &str,
    ) -> Prediction {
        Prediction {
            features,
            species: probabilities.argmax(),
            confidence: probabilities.max(),
            probabilities,
            out_of_range,
            model_version: model_version.to_string(),
        }
    }

    pub fn is_low_confidence(&self, prediction: &Prediction) -> bool {
        prediction.confidence < self.config.low_confidence_threshold
            || !prediction.out_of_range.is_empty()
    }

    /// Human-readable reason a prediction should be treated with care
    pub fn low_confidence_reason(&self, prediction: &Prediction) -> Option<String> {
        let mut reasons = Vec::new();
        if prediction.confidence < self.config.low_confidence_threshold {
            reasons.push(format!(
                "top probability {:.0}% is below {:.0}%",
                prediction.confidence * 100.0,
                self.config.low_confidence_threshold * 100.0
            ));
        }
        if !prediction.out_of_range.is_empty() {
            let names: Vec<&str> = prediction
                .out_of_range
                .iter()
                .map(|f| f.display_name())
                .collect();
            reasons.push(format!("out-of-range input: {}", names.join(", ")));
        }
        if reasons.is_empty() {
            None
        } else {
            Some(reasons.join("; "))
        }
    }
}
