//! Core data models for the iris predictor

use crate::error::{IrisError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Number of input features expected by every model
pub const NUM_FEATURES: usize = 4;

/// Number of class labels produced by every model
pub const NUM_CLASSES: usize = 3;

/// Input measurement, in the fixed order stored models depend on.
///
/// Reordering these variants is a breaking change for saved artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureName {
    SepalLength,
    SepalWidth,
    PetalLength,
    PetalWidth,
}

impl FeatureName {
    pub const ALL: [FeatureName; NUM_FEATURES] = [
        FeatureName::SepalLength,
        FeatureName::SepalWidth,
        FeatureName::PetalLength,
        FeatureName::PetalWidth,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn display_name(self) -> &'static str {
        match self {
            FeatureName::SepalLength => "Sepal Length",
            FeatureName::SepalWidth => "Sepal Width",
            FeatureName::PetalLength => "Petal Length",
            FeatureName::PetalWidth => "Petal Width",
        }
    }

    /// Physically sane range in centimeters.
    ///
    /// Values outside are still accepted by the model but are out of the
    /// training distribution.
    pub fn valid_range(self) -> RangeInclusive<f64> {
        match self {
            FeatureName::SepalLength => 4.0..=8.0,
            FeatureName::SepalWidth => 2.0..=4.5,
            FeatureName::PetalLength => 1.0..=7.0,
            FeatureName::PetalWidth => 0.1..=2.5,
        }
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Iris species; the class label set of every model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Species {
    Setosa = 0,
    Versicolor = 1,
    Virginica = 2,
}

impl Species {
    pub const ALL: [Species; NUM_CLASSES] =
        [Species::Setosa, Species::Versicolor, Species::Virginica];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Species::Setosa => "Setosa",
            Species::Versicolor => "Versicolor",
            Species::Virginica => "Virginica",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Four flower measurements in centimeters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub sepal_length: f64,
    pub sepal_width: f64,
    pub petal_length: f64,
    pub petal_width: f64,
}

impl FeatureVector {
    /// Build a vector from already-checked values
    pub fn new(sepal_length: f64, sepal_width: f64, petal_length: f64, petal_width: f64) -> Self {
        Self {
            sepal_length,
            sepal_width,
            petal_length,
            petal_width,
        }
    }

    /// Build a vector from raw numbers, rejecting wrong arity and non-finite values
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        if values.len() != NUM_FEATURES {
            return Err(IrisError::InvalidInput(format!(
                "expected {} features, got {}",
                NUM_FEATURES,
                values.len()
            )));
        }
        for (name, value) in FeatureName::ALL.iter().zip(values) {
            if !value.is_finite() {
                return Err(IrisError::InvalidInput(format!(
                    "{} must be a finite number, got {}",
                    name, value
                )));
            }
        }
        Ok(Self::new(values[0], values[1], values[2], values[3]))
    }

    /// Build a vector from text fields such as CSV cells or form values
    pub fn parse_fields<S: AsRef<str>>(fields: &[S]) -> Result<Self> {
        if fields.len() != NUM_FEATURES {
            return Err(IrisError::InvalidInput(format!(
                "expected {} features, got {}",
                NUM_FEATURES,
                fields.len()
            )));
        }
        let mut values = [0.0; NUM_FEATURES];
        for ((slot, field), name) in values.iter_mut().zip(fields).zip(FeatureName::ALL) {
            let raw = field.as_ref().trim();
            *slot = raw.parse::<f64>().map_err(|_| {
                IrisError::InvalidInput(format!("{} is not numeric: {:?}", name, raw))
            })?;
        }
        Self::from_slice(&values)
    }

    pub fn as_array(&self) -> [f64; NUM_FEATURES] {
        [
            self.sepal_length,
            self.sepal_width,
            self.petal_length,
            self.petal_width,
        ]
    }

    pub fn get(&self, feature: FeatureName) -> f64 {
        self.as_array()[feature.index()]
    }

    /// Features whose value falls outside the sane input range
    pub fn out_of_range_features(&self) -> Vec<FeatureName> {
        FeatureName::ALL
            .into_iter()
            .filter(|f| !f.valid_range().contains(&self.get(*f)))
            .collect()
    }
}

/// Per-class probabilities, indexed by `Species::index`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityDistribution([f64; NUM_CLASSES]);

impl ProbabilityDistribution {
    pub fn new(values: [f64; NUM_CLASSES]) -> Self {
        Self(values)
    }

    pub fn get(&self, species: Species) -> f64 {
        self.0[species.index()]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Most probable class; ties go to the lowest class index
    pub fn argmax(&self) -> Species {
        let mut best = 0;
        for (idx, &p) in self.0.iter().enumerate().skip(1) {
            if p > self.0[best] {
                best = idx;
            }
        }
        Species::ALL[best]
    }

    /// Probability of the most probable class
    pub fn max(&self) -> f64 {
        self.get(self.argmax())
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }
}

/// Relative influence of each feature, summing to 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance([f64; NUM_FEATURES]);

impl FeatureImportance {
    pub fn new(weights: [f64; NUM_FEATURES]) -> Self {
        Self(weights)
    }

    pub fn get(&self, feature: FeatureName) -> f64 {
        self.0[feature.index()]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Features sorted by descending weight; equal weights keep contract order
    pub fn ranked(&self) -> Vec<(FeatureName, f64)> {
        let mut ranked: Vec<_> = FeatureName::ALL.iter().map(|f| (*f, self.get(*f))).collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}

/// Outcome of a single inference call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub features: FeatureVector,
    pub species: Species,
    pub probabilities: ProbabilityDistribution,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub out_of_range: Vec<FeatureName>,
    pub model_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_wrong_arity() {
        let err = FeatureVector::from_slice(&[5.4, 3.4, 1.3]).unwrap_err();
        assert!(matches!(err, IrisError::InvalidInput(_)));
        assert!(FeatureVector::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]).is_err());
    }

    #[test]
    fn test_from_slice_rejects_non_finite() {
        assert!(FeatureVector::from_slice(&[5.4, f64::NAN, 1.3, 0.2]).is_err());
        assert!(FeatureVector::from_slice(&[5.4, 3.4, f64::INFINITY, 0.2]).is_err());
    }

    #[test]
    fn test_parse_fields() {
        let v = FeatureVector::parse_fields(&["5.4", " 3.4", "1.3 ", "0.2"]).unwrap();
        assert_eq!(v.as_array(), [5.4, 3.4, 1.3, 0.2]);

        let err = FeatureVector::parse_fields(&["5.4", "wide", "1.3", "0.2"]).unwrap_err();
        assert!(err.to_string().contains("Sepal Width"));
    }

    #[test]
    fn test_out_of_range_features() {
        let v = FeatureVector::new(5.4, 3.4, 1.3, 0.2);
        assert!(v.out_of_range_features().is_empty());

        let v = FeatureVector::new(9.0, 3.4, 0.5, 0.2);
        assert_eq!(
            v.out_of_range_features(),
            vec![FeatureName::SepalLength, FeatureName::PetalLength]
        );
    }

    #[test]
    fn test_species_index_contract() {
        assert_eq!(Species::Setosa.index(), 0);
        assert_eq!(Species::Versicolor.index(), 1);
        assert_eq!(Species::Virginica.index(), 2);
        assert_eq!(Species::from_index(1), Some(Species::Versicolor));
        assert_eq!(Species::from_index(3), None);
    }

    #[test]
    fn test_argmax_ties_go_to_lowest_index() {
        let p = ProbabilityDistribution::new([0.4, 0.4, 0.2]);
        assert_eq!(p.argmax(), Species::Setosa);
        let p = ProbabilityDistribution::new([0.1, 0.3, 0.6]);
        assert_eq!(p.argmax(), Species::Virginica);
        assert!((p.max() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_importance_ranked() {
        let imp = FeatureImportance::new([0.1, 0.05, 0.45, 0.4]);
        let ranked: Vec<_> = imp.ranked().into_iter().map(|(f, _)| f).collect();
        assert_eq!(
            ranked,
            vec![
                FeatureName::PetalLength,
                FeatureName::PetalWidth,
                FeatureName::SepalLength,
                FeatureName::SepalWidth
            ]
        );
    }

    #[test]
    fn test_prediction_json_shape() {
        let prediction = Prediction {
            features: FeatureVector::new(5.4, 3.4, 1.3, 0.2),
            species: Species::Setosa,
            probabilities: ProbabilityDistribution::new([0.9, 0.1, 0.0]),
            confidence: 0.9,
            out_of_range: vec![],
            model_version: "rf-test".to_string(),
        };
        let json = serde_json::to_value(&prediction).unwrap();
        assert_eq!(json["species"], "Setosa");
        assert_eq!(json["features"]["petal_width"], 0.2);
        assert!(json.get("out_of_range").is_none());

        let flagged = Prediction {
            out_of_range: vec![FeatureName::PetalWidth],
            ..prediction
        };
        let json = serde_json::to_value(&flagged).unwrap();
        assert_eq!(json["out_of_range"][0], "petal_width");
    }
}
