//! Single-flower prediction

use anyhow::{Context, Result};
use colored::Colorize;
use iris_core::{FeatureName, FeatureVector, Prediction, Species};
use serde::Serialize;
use std::path::Path;

use super::load_pipeline;
use crate::config::Presentation;
use crate::output::{
    bar, color_confidence, format_percent, paint_species, print_json, print_success,
    print_warning, OutputFormat,
};

#[derive(Serialize)]
struct PredictOutput<'a> {
    #[serde(flatten)]
    prediction: &'a Prediction,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

/// Classify one set of measurements
pub fn run(
    model_path: &Path,
    values: &[String],
    export: Option<&Path>,
    format: OutputFormat,
    presentation: &Presentation,
) -> Result<()> {
    let pipeline = load_pipeline(model_path)?;
    let features = FeatureVector::parse_fields(values).context("Invalid measurements")?;
    let prediction = pipeline.predict(&features.as_array())?;
    let warning = pipeline.output_formatter().low_confidence_reason(&prediction);

    match format {
        OutputFormat::Json => print_json(&PredictOutput {
            prediction: &prediction,
            warning: warning.clone(),
        })?,
        OutputFormat::Table => print_prediction(&prediction, warning.as_deref(), presentation),
    }

    if let Some(path) = export {
        export_csv(&prediction, path)?;
        if matches!(format, OutputFormat::Table) {
            print_success(&format!("Exported prediction to {}", path.display()));
        }
    }

    Ok(())
}

fn print_prediction(prediction: &Prediction, warning: Option<&str>, presentation: &Presentation) {
    let species = prediction.species;
    println!(
        "Predicted species: {} ({} confidence)",
        paint_species(species.name(), species, presentation).bold(),
        color_confidence(prediction.confidence)
    );

    if presentation.show_probabilities {
        println!();
        for other in Species::ALL {
            let p = prediction.probabilities.get(other);
            println!(
                "  {:<11} {} {:>6}",
                other.name(),
                paint_species(&bar(p, presentation.bar_width), other, presentation),
                format_percent(p)
            );
        }
        println!();
    }

    if let Some(reason) = warning {
        print_warning(&format!("Low confidence: {}", reason));
    }
    for feature in &prediction.out_of_range {
        let range = feature.valid_range();
        print_warning(&format!(
            "{} = {} is outside the expected {}-{} cm",
            feature,
            prediction.features.get(*feature),
            range.start(),
            range.end()
        ));
    }
}

/// Write the measurements and predicted species as a one-row CSV
pub fn export_csv(prediction: &Prediction, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut header: Vec<&str> = FeatureName::ALL.iter().map(|f| f.display_name()).collect();
    header.push("Predicted Species");
    writer.write_record(&header)?;

    let mut row: Vec<String> = prediction
        .features
        .as_array()
        .iter()
        .map(|v| v.to_string())
        .collect();
    row.push(prediction.species.name().to_string());
    writer.write_record(&row)?;

    writer.flush().context("Failed to write CSV export")?;
    Ok(())
}
