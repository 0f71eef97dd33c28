//! Training harness: labeled samples in, immutable trained model out

use crate::artifact::fingerprint;
use crate::error::{IrisError, Result};
use crate::forest::{ForestConfig, RandomForest};
use crate::model::{ModelMetadata, TrainedModel};
use crate::models::{FeatureVector, Species, NUM_FEATURES};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::info;

/// Minimum number of distinct classes a training set must cover
pub const MIN_DISTINCT_CLASSES: usize = 2;

/// Train a random forest on labeled samples.
///
/// Fails with `InsufficientData` when the set is empty or covers fewer than
/// two classes, and with `InvalidInput` when a sample holds a non-finite value.
pub fn train(samples: &[(FeatureVector, Species)], config: &ForestConfig) -> Result<TrainedModel> {
    if samples.is_empty() {
        return Err(IrisError::InsufficientData(
            "training set is empty".to_string(),
        ));
    }

    let distinct: BTreeSet<Species> = samples.iter().map(|(_, s)| *s).collect();
    if distinct.len() < MIN_DISTINCT_CLASSES {
        return Err(IrisError::InsufficientData(format!(
            "training set covers {} class(es), need at least {}",
            distinct.len(),
            MIN_DISTINCT_CLASSES
        )));
    }

    let mut x: Vec<[f64; NUM_FEATURES]> = Vec::with_capacity(samples.len());
    let mut y: Vec<usize> = Vec::with_capacity(samples.len());
    for (row, (features, species)) in samples.iter().enumerate() {
        let values = features.as_array();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(IrisError::InvalidInput(format!(
                "training sample {} has a non-finite value",
                row
            )));
        }
        x.push(values);
        y.push(species.index());
    }

    let start = Instant::now();
    let forest = RandomForest::fit(&x, &y, config.clone())?;
    let training_accuracy = forest.score(samples);
    let version = format!("rf-{}", &fingerprint(&forest)?[..12]);

    let metadata = ModelMetadata {
        version,
        trained_at: chrono::Utc::now().timestamp(),
        n_samples: samples.len(),
        training_accuracy,
        config: config.clone(),
        feature_names: ModelMetadata::contract_feature_names(),
        class_names: ModelMetadata::contract_class_names(),
    };

    info!(
        event = "model_trained",
        version = %metadata.version,
        n_samples = metadata.n_samples,
        n_estimators = config.n_estimators,
        seed = config.seed,
        training_accuracy = training_accuracy,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Trained random forest"
    );

    Ok(TrainedModel::new(metadata, forest))
}
