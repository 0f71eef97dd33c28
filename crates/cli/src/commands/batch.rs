//! CSV batch prediction

use anyhow::{Context, Result};
use iris_core::{FeatureName, FeatureVector, Prediction, Species, NUM_FEATURES};
use std::path::Path;
use tabled::Tabled;

use super::load_pipeline;
use crate::config::Presentation;
use crate::output::{
    color_confidence, paint_species, print_json, print_success, print_warning, OutputFormat,
};

#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "#")]
    row: usize,
    #[tabled(rename = "Sepal L")]
    sepal_length: f64,
    #[tabled(rename = "Sepal W")]
    sepal_width: f64,
    #[tabled(rename = "Petal L")]
    petal_length: f64,
    #[tabled(rename = "Petal W")]
    petal_width: f64,
    #[tabled(rename = "Species")]
    species: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
}

/// Read measurement rows from a CSV file with a header row.
///
/// Only the first four columns are used; a row with fewer, or with a
/// non-numeric cell, fails the whole file.
pub fn read_rows(path: &Path) -> Result<Vec<[f64; NUM_FEATURES]>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        // Header is line 1
        let line = idx + 2;
        let record = record.with_context(|| format!("Malformed CSV at line {}", line))?;
        let fields: Vec<&str> = record.iter().take(NUM_FEATURES).collect();
        let features = FeatureVector::parse_fields(&fields)
            .with_context(|| format!("Invalid measurements at line {}", line))?;
        rows.push(features.as_array());
    }
    Ok(rows)
}

/// Write predictions with per-class probabilities
pub fn write_predictions(predictions: &[Prediction], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut header: Vec<String> = FeatureName::ALL
        .iter()
        .map(|f| f.display_name().to_string())
        .collect();
    header.push("Predicted Species".to_string());
    header.extend(Species::ALL.iter().map(|s| format!("P({})", s.name())));
    writer.write_record(&header)?;

    for prediction in predictions {
        let mut row: Vec<String> = prediction
            .features
            .as_array()
            .iter()
            .map(|v| v.to_string())
            .collect();
        row.push(prediction.species.name().to_string());
        row.extend(prediction.probabilities.as_slice().iter().map(|p| format!("{:.4}", p)));
        writer.write_record(&row)?;
    }

    writer.flush().context("Failed to write predictions")?;
    Ok(())
}

/// Predict every row of `input`; nothing is written if any row is invalid
pub fn run(
    model_path: &Path,
    input: &Path,
    output: Option<&Path>,
    format: OutputFormat,
    presentation: &Presentation,
) -> Result<()> {
    let pipeline = load_pipeline(model_path)?;
    let rows = read_rows(input)?;
    if rows.is_empty() {
        print_warning(&format!("No rows in {}", input.display()));
        return Ok(());
    }
    let predictions = pipeline.predict_batch(&rows)?;

    if let Some(path) = output {
        write_predictions(&predictions, path)?;
        print_success(&format!(
            "Wrote {} predictions to {}",
            predictions.len(),
            path.display()
        ));
        return Ok(());
    }

    match format {
        OutputFormat::Json => print_json(&predictions)?,
        OutputFormat::Table => {
            let table_rows: Vec<PredictionRow> = predictions
                .iter()
                .enumerate()
                .map(|(idx, p)| PredictionRow {
                    row: idx + 1,
                    sepal_length: p.features.sepal_length,
                    sepal_width: p.features.sepal_width,
                    petal_length: p.features.petal_length,
                    petal_width: p.features.petal_width,
                    species: paint_species(p.species.name(), p.species, presentation),
                    confidence: color_confidence(p.confidence),
                })
                .collect();

            let table = tabled::Table::new(table_rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);

            let flagged = predictions
                .iter()
                .filter(|p| pipeline.output_formatter().is_low_confidence(p))
                .count();
            println!("\nTotal: {} predictions", predictions.len());
            if flagged > 0 {
                print_warning(&format!("{} low-confidence predictions", flagged));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("input.csv");
        std::fs::write(
            &path,
            "sepal_length,sepal_width,petal_length,petal_width\n5.4, 3.4, 1.3, 0.2\n6.0,2.7,5.1,1.6\n",
        )
        .unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows, vec![[5.4, 3.4, 1.3, 0.2], [6.0, 2.7, 5.1, 1.6]]);
    }

    #[test]
    fn test_read_rows_reports_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("input.csv");
        std::fs::write(&path, "a,b,c,d\n5.4,3.4,1.3,0.2\n6.0,x,5.1,1.6\n").unwrap();

        let err = read_rows(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("line 3"));
    }

    #[test]
    fn test_read_rows_short_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("input.csv");
        std::fs::write(&path, "a,b,c,d\n5.4,3.4,1.3\n").unwrap();
        assert!(read_rows(&path).is_err());
    }
}
