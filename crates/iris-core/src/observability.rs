//! Observability infrastructure for the iris predictor
//!
//! Provides:
//! - Prometheus metrics (prediction latency, predictions per species, errors, model version)
//! - Structured logging of significant events with tracing

use crate::models::{Prediction, Species};
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

struct PipelineMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_total: IntCounterVec,
    prediction_errors: IntCounter,
    out_of_range_inputs: IntCounter,
    model_version_info: GaugeVec,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "iris_prediction_latency_seconds",
                "Time spent running inference for a single feature vector",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "iris_predictions_total",
                "Predictions served, by predicted species",
                &["species"]
            )
            .expect("Failed to register predictions_total"),

            prediction_errors: register_int_counter!(
                "iris_prediction_errors_total",
                "Prediction requests rejected as invalid input"
            )
            .expect("Failed to register prediction_errors"),

            out_of_range_inputs: register_int_counter!(
                "iris_out_of_range_inputs_total",
                "Predictions whose input fell outside the sane measurement ranges"
            )
            .expect("Failed to register out_of_range_inputs"),

            model_version_info: register_gauge_vec!(
                "iris_model_version_info",
                "Information about the currently loaded model",
                &["version"]
            )
            .expect("Failed to register model_version_info"),
        }
    }
}

/// Pipeline metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct PipelineMetrics {
    _private: (),
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PipelineMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self, species: Species) {
        self.inner()
            .predictions_total
            .with_label_values(&[species.name()])
            .inc();
    }

    pub fn predictions(&self, species: Species) -> u64 {
        self.inner()
            .predictions_total
            .with_label_values(&[species.name()])
            .get()
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors.inc();
    }

    pub fn inc_out_of_range_inputs(&self) {
        self.inner().out_of_range_inputs.inc();
    }

    /// Set model version info gauge; previous versions are cleared
    pub fn set_model_version(&self, version: &str) {
        let inner = self.inner();
        inner.model_version_info.reset();
        inner.model_version_info.with_label_values(&[version]).set(1.0);
    }
}

/// Structured logger for predictor events
///
/// Emits consistently named events so log pipelines can key on `event`.
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn log_prediction(&self, prediction: &Prediction) {
        info!(
            event = "prediction_generated",
            component = %self.component,
            species = %prediction.species,
            confidence = prediction.confidence,
            p_setosa = prediction.probabilities.get(Species::Setosa),
            p_versicolor = prediction.probabilities.get(Species::Versicolor),
            p_virginica = prediction.probabilities.get(Species::Virginica),
            out_of_range = prediction.out_of_range.len(),
            model_version = %prediction.model_version,
            "Generated species prediction"
        );
    }

    pub fn log_invalid_input(&self, reason: &str) {
        warn!(
            event = "invalid_input",
            component = %self.component,
            reason = %reason,
            "Rejected prediction input"
        );
    }

    pub fn log_model_loaded(&self, version: &str, path: &str) {
        info!(
            event = "model_loaded",
            component = %self.component,
            model_version = %version,
            path = %path,
            "Model artifact loaded"
        );
    }

    pub fn log_model_load_failed(&self, path: &str, error: &str) {
        warn!(
            event = "model_load_failed",
            component = %self.component,
            path = %path,
            error = %error,
            "Model artifact could not be loaded"
        );
    }

    pub fn log_startup(&self, version: &str, model_version: &str) {
        info!(
            event = "server_started",
            component = %self.component,
            server_version = %version,
            model_version = %model_version,
            "Iris predictor started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "server_shutdown",
            component = %self.component,
            reason = %reason,
            "Iris predictor shutting down"
        );
    }
}
