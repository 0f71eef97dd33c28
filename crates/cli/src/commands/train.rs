//! Training harness

use anyhow::{Context, Result};
use iris_core::{artifact, dataset, train, Classifier, ForestConfig, TrainedModel};
use serde::Serialize;
use std::path::PathBuf;
use tabled::Tabled;

use crate::config::Presentation;
use crate::output::{bar, format_percent, print_info, print_json, print_success, OutputFormat};

pub struct TrainOptions {
    pub output: PathBuf,
    pub trees: usize,
    pub seed: u64,
    pub max_depth: Option<usize>,
}

impl TrainOptions {
    fn forest_config(&self) -> ForestConfig {
        let config = ForestConfig::default()
            .with_n_estimators(self.trees)
            .with_seed(self.seed);
        match self.max_depth {
            Some(depth) => config.with_max_depth(depth),
            None => config,
        }
    }
}

#[derive(Serialize)]
struct TrainSummary<'a> {
    version: &'a str,
    path: String,
    checksum: String,
    n_samples: usize,
    n_estimators: usize,
    seed: u64,
    training_accuracy: f64,
    feature_importance: Vec<(String, f64)>,
}

#[derive(Tabled)]
pub(crate) struct ImportanceRow {
    #[tabled(rename = "Feature")]
    pub feature: String,
    #[tabled(rename = "Importance")]
    pub importance: String,
    #[tabled(rename = "")]
    pub bar: String,
}

pub(crate) fn importance_rows(model: &TrainedModel, width: usize) -> Vec<ImportanceRow> {
    model
        .feature_importance()
        .ranked()
        .into_iter()
        .map(|(feature, weight)| ImportanceRow {
            feature: feature.display_name().to_string(),
            importance: format_percent(weight),
            bar: bar(weight, width),
        })
        .collect()
}

/// Train on the embedded dataset and save the artifact
pub fn run(
    options: &TrainOptions,
    format: OutputFormat,
    presentation: &Presentation,
) -> Result<()> {
    let samples = dataset::load_iris();
    let model = train(&samples, &options.forest_config()).context("Training failed")?;
    let checksum = artifact::save(&model, &options.output)
        .with_context(|| format!("Failed to save model to {}", options.output.display()))?;

    let metadata = model.metadata();
    match format {
        OutputFormat::Json => {
            let summary = TrainSummary {
                version: &metadata.version,
                path: options.output.display().to_string(),
                checksum,
                n_samples: metadata.n_samples,
                n_estimators: metadata.config.n_estimators,
                seed: metadata.config.seed,
                training_accuracy: metadata.training_accuracy,
                feature_importance: model
                    .feature_importance()
                    .ranked()
                    .into_iter()
                    .map(|(f, w)| (f.display_name().to_string(), w))
                    .collect(),
            };
            print_json(&summary)?;
        }
        OutputFormat::Table => {
            print_success(&format!(
                "Trained {} on {} samples ({} trees, seed {})",
                metadata.version,
                metadata.n_samples,
                metadata.config.n_estimators,
                metadata.config.seed
            ));
            print_info(&format!(
                "Training accuracy: {}",
                format_percent(metadata.training_accuracy)
            ));
            let table = tabled::Table::new(importance_rows(&model, presentation.bar_width))
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            print_success(&format!("Saved model to {}", options.output.display()));
        }
    }

    Ok(())
}
