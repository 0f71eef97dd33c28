//! Error types for training, inference and model artifacts

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, IrisError>;

/// Errors surfaced by the inference pipeline and the model provider.
///
/// All of these are deterministic validation failures; retrying the same
/// call yields the same error.
#[derive(Debug, Error)]
pub enum IrisError {
    /// Feature vector has the wrong dimensionality or a non-numeric component
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Training set is empty or covers fewer than two classes
    #[error("insufficient training data: {0}")]
    InsufficientData(String),

    /// Model artifact could not be loaded
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),

    /// Model artifact could not be written
    #[error("failed to save model artifact to {path:?}: {source}")]
    ModelSave {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Model could not be encoded into an artifact payload
    #[error("failed to encode model artifact: {0}")]
    Encode(String),
}

impl IrisError {
    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            IrisError::InvalidInput(_) => "invalid_input",
            IrisError::InsufficientData(_) => "insufficient_data",
            IrisError::ModelLoad(_) => "model_load",
            IrisError::ModelSave { .. } => "model_save",
            IrisError::Encode(_) => "encode",
        }
    }
}

/// Reasons a serialized model cannot be turned back into a trained model
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model artifact not found: {0:?}")]
    NotFound(PathBuf),

    #[error("failed to read model artifact {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model artifact is corrupt: {0}")]
    Corrupt(String),

    #[error("model artifact is incompatible: {0}")]
    IncompatibleVersion(String),
}
