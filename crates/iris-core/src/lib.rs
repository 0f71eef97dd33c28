//! Core library for the iris species predictor
//!
//! This crate provides:
//! - Random forest training on the canonical iris dataset
//! - An inference pipeline over an immutable, shared model
//! - Model artifact save/load with checksum validation
//! - Metrics and structured logging

pub mod artifact;
pub mod dataset;
pub mod error;
pub mod forest;
pub mod model;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod training;

pub use error::{IrisError, ModelLoadError, Result};
pub use forest::ForestConfig;
pub use model::{ModelMetadata, TrainedModel};
pub use models::*;
pub use observability::{PipelineMetrics, StructuredLogger};
pub use predictor::{Classifier, InferencePipeline};
pub use training::train;
