//! CLI subcommands

pub mod batch;
pub mod model;
pub mod predict;
pub mod train;

use anyhow::{Context, Result};
use iris_core::{artifact, InferencePipeline, ModelLoadError, TrainedModel};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Load a model artifact, pointing at `iris train` when none exists yet
pub fn load_model(path: &Path) -> Result<TrainedModel> {
    let model = artifact::load(path).map_err(|e| match e {
        ModelLoadError::NotFound(_) => anyhow::anyhow!(
            "No model at {}; run `iris train` first or pass --model",
            path.display()
        ),
        other => anyhow::Error::new(other)
            .context(format!("Failed to load model from {}", path.display())),
    })?;
    debug!(
        path = %path.display(),
        version = %model.metadata().version,
        "Loaded model"
    );
    Ok(model)
}

pub fn load_pipeline(path: &Path) -> Result<InferencePipeline> {
    let model = load_model(path).context("Cannot run inference")?;
    Ok(InferencePipeline::new(Arc::new(model)))
}
