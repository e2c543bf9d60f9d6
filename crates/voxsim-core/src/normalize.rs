//! Min-max normalization against persisted corpus bounds

use crate::error::{Error, Result};
use crate::stats::NormalizationBounds;
use crate::summary::{Field, NormalizedVector, SummaryVector};
use voxsim_store::BoundsEntry;

/// Value used for every element of a feature whose corpus min equals its max
pub const DEGENERATE_VALUE: f64 = 0.5;

/// Map a single value into corpus-relative units
///
/// Values outside the corpus range are not clamped, so a query louder than
/// anything in the corpus lands above 1.0.
pub fn scale(value: f64, bounds: BoundsEntry) -> f64 {
    let range = bounds.max - bounds.min;
    if range == 0.0 {
        DEGENERATE_VALUE
    } else {
        (value - bounds.min) / range
    }
}

/// Normalize every element of a summary vector
pub fn normalize(vector: &SummaryVector, bounds: &NormalizationBounds) -> Result<NormalizedVector> {
    let fields = vector
        .fields()
        .map(|(field, values)| {
            let entry = bounds
                .get(field.name())
                .ok_or_else(|| Error::MissingBounds(field.name().to_string()))?;
            Ok((field, values.iter().map(|&v| scale(v, entry)).collect()))
        })
        .collect::<Result<Vec<(Field, Vec<f64>)>>>()?;

    Ok(NormalizedVector::from_summary(SummaryVector::from_fields(fields)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::compute_bounds;
    use crate::summary::SUMMARY_DIM;
    use approx::assert_abs_diff_eq;

    fn ramp(offset: f64) -> SummaryVector {
        let flat: Vec<f64> = (0..SUMMARY_DIM).map(|i| i as f64 + offset).collect();
        SummaryVector::from_flat(&flat).unwrap()
    }

    #[test]
    fn test_corpus_vectors_land_in_unit_range() {
        let corpus = vec![ramp(0.0), ramp(5.0), ramp(-2.0)];
        let bounds = compute_bounds(&corpus).bounds;
        for vector in &corpus {
            let normalized = normalize(vector, &bounds).unwrap();
            assert!(normalized.flatten().iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_degenerate_field_maps_to_half() {
        // Every vector agrees on the scalar fields, so their min equals their max
        let corpus = vec![ramp(0.0), ramp(0.0)];
        let bounds = compute_bounds(&corpus).bounds;
        let normalized = normalize(&ramp(3.0), &bounds).unwrap();
        assert_eq!(normalized.get(Field::SpectralCentroid), &[0.5]);
        assert_eq!(normalized.get(Field::SpectralFlatness), &[0.5]);
    }

    #[test]
    fn test_scale() {
        let bounds = BoundsEntry { min: 2.0, max: 6.0 };
        assert_abs_diff_eq!(scale(2.0, bounds), 0.0);
        assert_abs_diff_eq!(scale(5.0, bounds), 0.75);
        assert_abs_diff_eq!(scale(10.0, bounds), 2.0);
        assert_eq!(scale(-1e9, BoundsEntry { min: 1.0, max: 1.0 }), 0.5);
    }

    #[test]
    fn test_missing_field_bounds_is_an_error() {
        let mut bounds = NormalizationBounds::new();
        for field in Field::ALL.iter().filter(|f| **f != Field::DeltaMfccStd) {
            bounds.insert(field.name(), 0.0, 1.0);
        }
        let err = normalize(&ramp(0.0), &bounds).unwrap_err();
        assert!(matches!(err, Error::MissingBounds(ref name) if name == "delta_mfcc_std"));
        assert!(err.is_missing_bounds());
    }
}
