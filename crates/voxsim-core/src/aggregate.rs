//! Collapse per-frame features into a summary vector

use crate::error::ExtractionError;
use crate::extractor::FrameFeatures;
use crate::summary::{Field, SummaryVector};

/// Time-axis statistics of each feature row
///
/// MFCC and delta-MFCC contribute mean and population standard deviation,
/// contrast, centroid and flatness contribute their mean.
pub fn aggregate(features: &FrameFeatures) -> Result<SummaryVector, ExtractionError> {
    let fields = [
        (Field::MfccMean, row_means(Field::MfccMean, &features.mfcc)?),
        (Field::MfccStd, row_stds(Field::MfccStd, &features.mfcc)?),
        (
            Field::DeltaMfccMean,
            row_means(Field::DeltaMfccMean, &features.delta_mfcc)?,
        ),
        (
            Field::DeltaMfccStd,
            row_stds(Field::DeltaMfccStd, &features.delta_mfcc)?,
        ),
        (
            Field::SpectralContrastMean,
            row_means(Field::SpectralContrastMean, &features.spectral_contrast)?,
        ),
        (
            Field::SpectralCentroid,
            row_means(Field::SpectralCentroid, &features.spectral_centroid)?,
        ),
        (
            Field::SpectralFlatness,
            row_means(Field::SpectralFlatness, &features.spectral_flatness)?,
        ),
    ];

    for (field, values) in &fields {
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ExtractionError::InvalidFeatures(format!(
                "non-finite value in {}",
                field
            )));
        }
    }

    SummaryVector::from_fields(fields)
        .map_err(|e| ExtractionError::InvalidFeatures(e.to_string()))
}

fn check_shape(field: Field, rows: &[Vec<f64>]) -> Result<(), ExtractionError> {
    if rows.len() != field.width() {
        return Err(ExtractionError::InvalidFeatures(format!(
            "{} has {} rows, expected {}",
            field,
            rows.len(),
            field.width()
        )));
    }
    if rows.iter().any(|row| row.is_empty()) {
        return Err(ExtractionError::InvalidFeatures(format!(
            "{} has no frames",
            field
        )));
    }
    Ok(())
}

fn mean(row: &[f64]) -> f64 {
    row.iter().sum::<f64>() / row.len() as f64
}

fn row_means(field: Field, rows: &[Vec<f64>]) -> Result<Vec<f64>, ExtractionError> {
    check_shape(field, rows)?;
    Ok(rows.iter().map(|row| mean(row)).collect())
}

fn row_stds(field: Field, rows: &[Vec<f64>]) -> Result<Vec<f64>, ExtractionError> {
    check_shape(field, rows)?;
    Ok(rows
        .iter()
        .map(|row| {
            let m = mean(row);
            let var = row.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / row.len() as f64;
            var.sqrt()
        })
        .collect())
}
