//! Feature validation for inference
//!
//! Turns raw caller input (numbers or text fields) into checked feature
//! vectors and reports values that fall outside the training distribution.

use crate::error::{IrisError, Result};
use crate::models::{FeatureName, FeatureVector};

/// Validates raw input rows before they reach the model
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    reject_out_of_range: bool,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat values outside the sane measurement ranges as invalid input
    /// instead of only flagging them.
    pub fn strict() -> Self {
        Self {
            reject_out_of_range: true,
        }
    }

    pub fn extract(&self, values: &[f64]) -> Result<FeatureVector> {
        let features = FeatureVector::from_slice(values)?;
        self.check_range(&features)?;
        Ok(features)
    }

    pub fn extract_fields<S: AsRef<str>>(&self, fields: &[S]) -> Result<FeatureVector> {
        let features = FeatureVector::parse_fields(fields)?;
        self.check_range(&features)?;
        Ok(features)
    }

    /// Validate every row; the first bad row fails the whole batch
    pub fn extract_batch<R: AsRef<[f64]>>(&self, rows: &[R]) -> Result<Vec<FeatureVector>> {
        rows.iter()
            .enumerate()
            .map(|(idx, row)| {
                self.extract(row.as_ref()).map_err(|e| match e {
                    IrisError::InvalidInput(msg) => {
                        IrisError::InvalidInput(format!("row {}: {}", idx, msg))
                    }
                    other => other,
                })
            })
            .collect()
    }

    pub fn out_of_range(&self, features: &FeatureVector) -> Vec<FeatureName> {
        features.out_of_range_features()
    }

    fn check_range(&self, features: &FeatureVector) -> Result<()> {
        if !self.reject_out_of_range {
            return Ok(());
        }
        if let Some(name) = features.out_of_range_features().first() {
            let range = name.valid_range();
            return Err(IrisError::InvalidInput(format!(
                "{} {} is outside {}..={}",
                name,
                features.get(*name),
                range.start(),
                range.end()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_accepts_out_of_range() {
        let extractor = FeatureExtractor::new();
        let f = extractor.extract(&[9.5, 3.0, 1.3, 0.2]).unwrap();
        assert_eq!(extractor.out_of_range(&f), vec![FeatureName::SepalLength]);
    }

    #[test]
    fn test_strict_rejects_out_of_range() {
        let extractor = FeatureExtractor::strict();
        let err = extractor.extract(&[9.5, 3.0, 1.3, 0.2]).unwrap_err();
        assert!(err.to_string().contains("Sepal Length"));
        assert!(extractor.extract(&[5.4, 3.4, 1.3, 0.2]).is_ok());
    }

    #[test]
    fn test_wrong_dimensionality() {
        let extractor = FeatureExtractor::new();
        assert!(matches!(
            extractor.extract(&[5.4, 3.4, 1.3]),
            Err(IrisError::InvalidInput(_))
        ));
        assert!(extractor.extract(&[]).is_err());
    }

    #[test]
    fn test_batch_reports_row_index() {
        let extractor = FeatureExtractor::new();
        let rows = vec![vec![5.4, 3.4, 1.3, 0.2], vec![6.0, 2.7, 5.1]];
        let err = extractor.extract_batch(&rows).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_extract_fields() {
        let extractor = FeatureExtractor::new();
        assert!(extractor.extract_fields(&["6.0", "2.7", "5.1", "1.6"]).is_ok());
        assert!(extractor.extract_fields(&["6.0", "2.7", "", "1.6"]).is_err());
    }
}
