//! Inference over a shared, immutable classifier
//!
//! The pipeline receives its model at construction time and only ever reads
//! it, so one pipeline can serve concurrent callers without locks.

use super::features::FeatureExtractor;
use super::output::OutputFormatter;
use super::Classifier;
use crate::error::{IrisError, Result};
use crate::models::{FeatureImportance, FeatureVector, Prediction, ProbabilityDistribution, Species};
use crate::observability::PipelineMetrics;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Inference latency above which a warning is logged
pub const MAX_INFERENCE_MS: u128 = 5;

/// Validates input, runs the classifier and assembles predictions
pub struct InferencePipeline {
    model: Arc<dyn Classifier>,
    extractor: FeatureExtractor,
    output_formatter: OutputFormatter,
    metrics: Option<PipelineMetrics>,
    inference_count: AtomicU64,
    slow_inference_count: AtomicU64,
    rejected_count: AtomicU64,
}

impl InferencePipeline {
    pub fn new(model: Arc<dyn Classifier>) -> Self {
        Self {
            model,
            extractor: FeatureExtractor::new(),
            output_formatter: OutputFormatter::new(),
            metrics: None,
            inference_count: AtomicU64::new(0),
            slow_inference_count: AtomicU64::new(0),
            rejected_count: AtomicU64::new(0),
        }
    }

    pub fn with_extractor(mut self, extractor: FeatureExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_output_formatter(mut self, formatter: OutputFormatter) -> Self {
        self.output_formatter = formatter;
        self
    }

    /// Report latency and counters to the global Prometheus registry
    pub fn with_metrics(mut self, metrics: PipelineMetrics) -> Self {
        metrics.set_model_version(self.model.model_version());
        self.metrics = Some(metrics);
        self
    }

    pub fn model_version(&self) -> &str {
        self.model.model_version()
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    /// Predicted class for one raw feature row
    pub fn predict_class(&self, input: &[f64]) -> Result<Species> {
        let features = self.validate(input)?;
        let start = Instant::now();
        let species = self.model.predict_class(&features);
        self.record_inference(start, species, self.is_out_of_range(&features));
        Ok(species)
    }

    /// Class probabilities for one raw feature row
    pub fn predict_probabilities(&self, input: &[f64]) -> Result<ProbabilityDistribution> {
        let features = self.validate(input)?;
        let start = Instant::now();
        let probabilities = self.model.predict_proba(&features);
        self.record_inference(start, probabilities.argmax(), self.is_out_of_range(&features));
        Ok(probabilities)
    }

    /// Model-level feature importance; identical on every call
    pub fn feature_importance(&self) -> FeatureImportance {
        self.model.feature_importance()
    }

    /// Class, probabilities and range flags for one raw feature row
    pub fn predict(&self, input: &[f64]) -> Result<Prediction> {
        let features = self.validate(input)?;
        Ok(self.predict_vector(features))
    }

    /// Predict every row, or fail without partial results if any row is invalid
    pub fn predict_batch<R: AsRef<[f64]>>(&self, rows: &[R]) -> Result<Vec<Prediction>> {
        let vectors = self
            .extractor
            .extract_batch(rows)
            .inspect_err(|e| self.record_rejection(e))?;
        Ok(vectors.into_iter().map(|v| self.predict_vector(v)).collect())
    }

    /// Predict an already validated vector
    pub fn predict_vector(&self, features: FeatureVector) -> Prediction {
        let start = Instant::now();

        let probabilities = self.model.predict_proba(&features);
        let out_of_range = self.extractor.out_of_range(&features);
        if !out_of_range.is_empty() {
            debug!(features = ?out_of_range, "Input outside the training distribution");
        }
        let prediction = self.output_formatter.format(
            features,
            probabilities,
            out_of_range,
            self.model.model_version(),
        );

        self.record_inference(start, prediction.species, !prediction.out_of_range.is_empty());
        prediction
    }

    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_inferences: self.inference_count.load(Ordering::Relaxed),
            slow_inferences: self.slow_inference_count.load(Ordering::Relaxed),
            rejected_inputs: self.rejected_count.load(Ordering::Relaxed),
        }
    }

    fn is_out_of_range(&self, features: &FeatureVector) -> bool {
        !self.extractor.out_of_range(features).is_empty()
    }

    fn validate(&self, input: &[f64]) -> Result<FeatureVector> {
        self.extractor
            .extract(input)
            .inspect_err(|e| self.record_rejection(e))
    }

    /// Count a successful inference and report its latency
    fn record_inference(&self, start: Instant, species: Species, out_of_range: bool) {
        let elapsed = start.elapsed();
        self.inference_count.fetch_add(1, Ordering::Relaxed);
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            self.slow_inference_count.fetch_add(1, Ordering::Relaxed);
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                "Inference exceeded {}ms target", MAX_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros() as u64, "Inference completed");
        }

        if let Some(metrics) = &self.metrics {
            metrics.observe_prediction_latency(elapsed.as_secs_f64());
            metrics.inc_predictions(species);
            if out_of_range {
                metrics.inc_out_of_range_inputs();
            }
        }
    }

    fn record_rejection(&self, error: &IrisError) {
        self.rejected_count.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics.inc_prediction_errors();
        }
        debug!(error = %error, "Rejected inference input");
    }
}

/// Inference statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceStats {
    pub total_inferences: u64,
    pub slow_inferences: u64,
    pub rejected_inputs: u64,
}
