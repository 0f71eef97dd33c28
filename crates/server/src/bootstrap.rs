//! Model acquisition at startup

use crate::config::ServerConfig;
use anyhow::{bail, Context, Result};
use iris_core::{artifact, dataset, train, ModelLoadError, StructuredLogger, TrainedModel};
use tracing::info;

/// Load the configured artifact, training and saving a fresh model when it
/// is absent and `train_if_missing` is set.
///
/// A corrupt or incompatible artifact is always an error; it is never
/// silently replaced.
pub fn load_or_train(config: &ServerConfig, logger: &StructuredLogger) -> Result<TrainedModel> {
    let path = &config.model_path;
    let path_str = path.display().to_string();

    match artifact::load(path) {
        Ok(model) => {
            logger.log_model_loaded(&model.metadata().version, &path_str);
            Ok(model)
        }
        Err(ModelLoadError::NotFound(_)) if config.train_if_missing => {
            info!(path = %path_str, "No model artifact found, training on the embedded dataset");
            let model = train(&dataset::load_iris(), &config.forest_config())
                .context("Training at startup failed")?;
            artifact::save(&model, path)
                .with_context(|| format!("Failed to save model artifact to {}", path_str))?;
            Ok(model)
        }
        Err(e) => {
            logger.log_model_load_failed(&path_str, &e.to_string());
            bail!("Cannot start without a model: {}", e)
        }
    }
}
