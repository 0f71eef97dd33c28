//! Configuration management for the CLI

use crate::output::OutputFormat;
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model artifact used when neither the flag, env var nor config names one
pub const DEFAULT_MODEL_PATH: &str = "model.bin";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default model artifact path
    pub model_path: Option<PathBuf>,
    /// Default output format ("table" or "json")
    pub default_format: Option<String>,
    #[serde(default)]
    pub presentation: Presentation,
}

/// How predictions are rendered in the terminal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Presentation {
    /// Hex colors for Setosa, Versicolor and Virginica
    pub species_colors: [String; 3],
    /// Width of probability and importance bars, in characters
    pub bar_width: usize,
    /// Show per-class probability bars under a prediction
    pub show_probabilities: bool,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            species_colors: [
                "#66bb6a".to_string(),
                "#ffa726".to_string(),
                "#42a5f5".to_string(),
            ],
            bar_width: 30,
            show_probabilities: true,
        }
    }
}

impl Config {
    /// Load configuration from `IRIS_CONFIG` or `~/.config/iris/config.json`
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Model path from the command line, else the config, else the default
    pub fn model_path(&self, override_path: Option<PathBuf>) -> PathBuf {
        override_path
            .or_else(|| self.model_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH))
    }

    /// Configured default output format; unknown values fall back to table
    pub fn output_format(&self) -> OutputFormat {
        self.default_format
            .as_deref()
            .and_then(|f| OutputFormat::from_str(f, true).ok())
            .unwrap_or_default()
    }

    /// Get the configuration file path
    fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("IRIS_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("iris").join("config.json"))
    }
}
