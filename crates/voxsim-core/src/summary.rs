//! Summary vectors: the fixed-shape fingerprint of one recording
//!
//! Every vector carries the same seven features in canonical order. The order
//! defines the flattened layout used for scoring, so it must never change
//! without rebuilding every corpus.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use voxsim_store::{FeatureFile, FeatureValue};

/// Flattened dimensionality of a summary vector
pub const SUMMARY_DIM: usize = 53;

/// A named feature of the summary vector, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    MfccMean,
    MfccStd,
    DeltaMfccMean,
    DeltaMfccStd,
    SpectralContrastMean,
    SpectralCentroid,
    SpectralFlatness,
}

impl Field {
    pub const COUNT: usize = 7;

    /// Canonical order
    pub const ALL: [Field; Field::COUNT] = [
        Field::MfccMean,
        Field::MfccStd,
        Field::DeltaMfccMean,
        Field::DeltaMfccStd,
        Field::SpectralContrastMean,
        Field::SpectralCentroid,
        Field::SpectralFlatness,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Field::MfccMean => "mfcc_mean",
            Field::MfccStd => "mfcc_std",
            Field::DeltaMfccMean => "delta_mfcc_mean",
            Field::DeltaMfccStd => "delta_mfcc_std",
            Field::SpectralContrastMean => "spectral_contrast_mean",
            Field::SpectralCentroid => "spectral_centroid",
            Field::SpectralFlatness => "spectral_flatness",
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|field| field.name() == name)
    }

    /// Number of scalar elements
    pub const fn width(self) -> usize {
        match self {
            Field::MfccMean | Field::MfccStd | Field::DeltaMfccMean | Field::DeltaMfccStd => 11,
            Field::SpectralContrastMean => 7,
            Field::SpectralCentroid | Field::SpectralFlatness => 1,
        }
    }

    /// Stored as a bare number rather than a list
    pub const fn is_scalar(self) -> bool {
        matches!(self, Field::SpectralCentroid)
    }

    /// Importance weight for voice similarity. Weights sum to 1.0.
    pub const fn weight(self) -> f64 {
        match self {
            Field::MfccMean => 0.35,
            Field::MfccStd => 0.15,
            Field::DeltaMfccMean => 0.25,
            Field::DeltaMfccStd => 0.10,
            Field::SpectralContrastMean => 0.10,
            Field::SpectralCentroid => 0.03,
            Field::SpectralFlatness => 0.02,
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Position of the field's first element in the flattened vector
    pub fn offset(self) -> usize {
        Field::ALL[..self.index()].iter().map(|f| f.width()).sum()
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-shape fingerprint of one recording, in raw (unnormalized) units
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryVector {
    values: [Vec<f64>; Field::COUNT],
}

impl SummaryVector {
    /// Build from per-field values. Every field must be present exactly once
    /// with its canonical width.
    pub fn from_fields<I>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Field, Vec<f64>)>,
    {
        let mut slots: [Option<Vec<f64>>; Field::COUNT] = Default::default();
        for (field, values) in fields {
            if values.len() != field.width() {
                return Err(Error::InvalidVector(format!(
                    "feature '{}' has {} values, expected {}",
                    field,
                    values.len(),
                    field.width()
                )));
            }
            if slots[field.index()].replace(values).is_some() {
                return Err(Error::InvalidVector(format!("feature '{}' given twice", field)));
            }
        }

        let mut values: [Vec<f64>; Field::COUNT] = Default::default();
        for field in Field::ALL {
            values[field.index()] = slots[field.index()]
                .take()
                .ok_or_else(|| Error::InvalidVector(format!("feature '{}' is missing", field)))?;
        }
        Ok(Self { values })
    }

    /// Split a flattened vector back into fields
    pub fn from_flat(flat: &[f64]) -> Result<Self> {
        if flat.len() != SUMMARY_DIM {
            return Err(Error::InvalidVector(format!(
                "flattened vector has {} values, expected {}",
                flat.len(),
                SUMMARY_DIM
            )));
        }
        Self::from_fields(Field::ALL.into_iter().map(|field| {
            let start = field.offset();
            (field, flat[start..start + field.width()].to_vec())
        }))
    }

    /// Parse a per-recording feature file, rejecting missing, mis-sized or unknown features
    pub fn from_feature_file(file: &FeatureFile) -> Result<Self> {
        if let Some(unknown) = file.extra.keys().next() {
            return Err(Error::InvalidVector(format!("unknown feature '{}'", unknown)));
        }
        let mut fields = Vec::with_capacity(Field::COUNT);
        for field in Field::ALL {
            let value = file
                .get(field.name())
                .ok_or_else(|| Error::InvalidVector(format!("feature '{}' is missing", field)))?;
            fields.push((field, value.elements().to_vec()));
        }
        Self::from_fields(fields)
    }

    pub fn get(&self, field: Field) -> &[f64] {
        &self.values[field.index()]
    }

    /// Fields with their values, in canonical order
    pub fn fields(&self) -> impl Iterator<Item = (Field, &[f64])> + '_ {
        Field::ALL.into_iter().map(move |field| (field, self.get(field)))
    }

    /// Concatenate all fields in canonical order
    pub fn flatten(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(SUMMARY_DIM);
        for values in &self.values {
            flat.extend_from_slice(values);
        }
        flat
    }

    /// Render as a per-recording feature file
    pub fn to_feature_file(&self) -> FeatureFile {
        let mut file = FeatureFile::default();
        for (field, values) in self.fields() {
            let value = if field.is_scalar() {
                FeatureValue::Scalar(values[0])
            } else {
                FeatureValue::List(values.to_vec())
            };
            file.set(field.name(), value);
        }
        file
    }
}

/// A summary vector mapped into corpus-relative units
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedVector(SummaryVector);

impl NormalizedVector {
    pub(crate) fn from_summary(values: SummaryVector) -> Self {
        Self(values)
    }

    /// Wrap an already-normalized flattened vector
    pub fn from_flat(flat: &[f64]) -> Result<Self> {
        SummaryVector::from_flat(flat).map(Self)
    }

    pub fn get(&self, field: Field) -> &[f64] {
        self.0.get(field)
    }

    pub fn flatten(&self) -> Vec<f64> {
        self.0.flatten()
    }

    pub fn to_feature_file(&self) -> FeatureFile {
        self.0.to_feature_file()
    }
}
