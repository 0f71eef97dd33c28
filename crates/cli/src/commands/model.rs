//! Model inspection commands

use anyhow::Result;
use chrono::{TimeZone, Utc};
use iris_core::Classifier;
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use super::load_model;
use super::train::importance_rows;
use crate::config::Presentation;
use crate::output::{format_percent, print_json, OutputFormat};

#[derive(Serialize)]
struct FeatureWeight {
    feature: String,
    importance: f64,
}

#[derive(Tabled)]
struct InfoRow {
    #[tabled(rename = "Property")]
    key: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

impl InfoRow {
    fn new(key: &'static str, value: impl std::fmt::Display) -> Self {
        Self {
            key,
            value: value.to_string(),
        }
    }
}

/// Show ranked feature importance
pub fn show_importance(
    model_path: &Path,
    format: OutputFormat,
    presentation: &Presentation,
) -> Result<()> {
    let model = load_model(model_path)?;

    match format {
        OutputFormat::Json => {
            let weights: Vec<FeatureWeight> = model
                .feature_importance()
                .ranked()
                .into_iter()
                .map(|(feature, importance)| FeatureWeight {
                    feature: feature.display_name().to_string(),
                    importance,
                })
                .collect();
            print_json(&weights)?;
        }
        OutputFormat::Table => {
            let table = tabled::Table::new(importance_rows(&model, presentation.bar_width))
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}

/// Show model metadata
pub fn show_info(model_path: &Path, format: OutputFormat) -> Result<()> {
    let model = load_model(model_path)?;
    let metadata = model.metadata();

    match format {
        OutputFormat::Json => print_json(metadata)?,
        OutputFormat::Table => {
            let trained_at = Utc
                .timestamp_opt(metadata.trained_at, 0)
                .single()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| metadata.trained_at.to_string());
            let max_depth = metadata
                .config
                .max_depth
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unlimited".to_string());

            let rows = vec![
                InfoRow::new("Version", &metadata.version),
                InfoRow::new("Path", model_path.display()),
                InfoRow::new("Trained", trained_at),
                InfoRow::new("Samples", metadata.n_samples),
                InfoRow::new("Training accuracy", format_percent(metadata.training_accuracy)),
                InfoRow::new("Trees", metadata.config.n_estimators),
                InfoRow::new("Max depth", max_depth),
                InfoRow::new("Seed", metadata.config.seed),
                InfoRow::new("Features", metadata.feature_names.join(", ")),
                InfoRow::new("Classes", metadata.class_names.join(", ")),
            ];

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}
