//! Server configuration

use anyhow::{bail, Context, Result};
use iris_core::predictor::{FeatureExtractor, OutputConfig, OutputFormatter};
use iris_core::InferencePipeline;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Server configuration, read from `iris.toml` (optional) and `IRIS_*` variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port for the prediction, health and metrics endpoints
    #[serde(default = "default_port")]
    pub port: u16,

    /// Location of the serialized model artifact
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Train on the embedded dataset and save the artifact when none exists
    #[serde(default = "default_train_if_missing")]
    pub train_if_missing: bool,

    /// Trees to grow when training at startup
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    /// Seed used when training at startup
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Reject measurements outside the sane ranges instead of flagging them
    #[serde(default)]
    pub strict_ranges: bool,

    /// Top-class probability below which predictions carry a warning
    #[serde(default = "default_low_confidence_threshold")]
    pub low_confidence_threshold: f64,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_model_path() -> PathBuf {
    PathBuf::from("model.bin")
}

fn default_train_if_missing() -> bool {
    true
}

fn default_n_estimators() -> usize {
    iris_core::forest::DEFAULT_N_ESTIMATORS
}

fn default_seed() -> u64 {
    iris_core::forest::DEFAULT_SEED
}

fn default_low_confidence_threshold() -> f64 {
    iris_core::predictor::LOW_CONFIDENCE_THRESHOLD
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            model_path: default_model_path(),
            train_if_missing: default_train_if_missing(),
            n_estimators: default_n_estimators(),
            seed: default_seed(),
            strict_ranges: false,
            low_confidence_threshold: default_low_confidence_threshold(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the optional config file and environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("iris").required(false))
            .add_source(config::Environment::with_prefix("IRIS").try_parsing(true))
            .build()
            .context("Failed to read server configuration")?;

        config
            .try_deserialize()
            .context("Invalid server configuration")
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Build the inference pipeline around a loaded model
    pub fn pipeline(&self, model: iris_core::TrainedModel) -> Result<InferencePipeline> {
        if !(0.0..=1.0).contains(&self.low_confidence_threshold) {
            bail!(
                "low_confidence_threshold must be within [0, 1], got {}",
                self.low_confidence_threshold
            );
        }
        let extractor = if self.strict_ranges {
            FeatureExtractor::strict()
        } else {
            FeatureExtractor::new()
        };
        let formatter = OutputFormatter::with_config(OutputConfig {
            low_confidence_threshold: self.low_confidence_threshold,
        });

        Ok(InferencePipeline::new(Arc::new(model))
            .with_extractor(extractor)
            .with_output_formatter(formatter))
    }

    pub fn forest_config(&self) -> iris_core::ForestConfig {
        iris_core::ForestConfig::default()
            .with_n_estimators(self.n_estimators)
            .with_seed(self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source_uses_defaults() {
        let config: ServerConfig = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.model_path, PathBuf::from("model.bin"));
        assert!(config.train_if_missing);
        assert!(!config.strict_ranges);
        assert_eq!(config.low_confidence_threshold, 0.6);
        assert_eq!(config.listen_addr(), "127.0.0.1:8080");
    }

    fn tiny_model() -> iris_core::TrainedModel {
        let config = iris_core::ForestConfig::default().with_n_estimators(5);
        iris_core::train(&iris_core::dataset::load_iris(), &config).unwrap()
    }

    #[test]
    fn test_pipeline_applies_threshold_and_strictness() {
        let config = ServerConfig {
            strict_ranges: true,
            low_confidence_threshold: 1.01,
            ..ServerConfig::default()
        };
        assert!(config.pipeline(tiny_model()).is_err());

        let config = ServerConfig {
            low_confidence_threshold: 1.0,
            ..config
        };
        let pipeline = config.pipeline(tiny_model()).unwrap();
        assert!(pipeline.predict(&[5.4, 3.4, 1.3, 3.0]).is_err());

        let prediction = pipeline.predict(&[6.0, 2.7, 5.1, 1.6]).unwrap();
        assert_eq!(
            pipeline.output_formatter().is_low_confidence(&prediction),
            prediction.confidence < 1.0
        );
    }

    #[test]
    fn test_overrides() {
        let config: ServerConfig = config::Config::builder()
            .set_override("port", 9191)
            .unwrap()
            .set_override("seed", 7)
            .unwrap()
            .set_override("strict_ranges", true)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.port, 9191);
        assert_eq!(config.forest_config().seed, 7);
        assert!(config.strict_ranges);
    }
}
