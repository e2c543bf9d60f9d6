//! Corpus-wide normalization bounds
//!
//! Bounds are a min/max reduction over every element of every vector, so the
//! result does not depend on the order vectors are visited in.

use crate::error::{Error, Result};
use crate::summary::{Field, SummaryVector};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use voxsim_store::{BoundsEntry, BoundsFile};

/// Per-feature min/max bounds, keyed by feature name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizationBounds {
    entries: BTreeMap<String, BoundsEntry>,
}

impl NormalizationBounds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, min: f64, max: f64) {
        self.entries.insert(name.into(), BoundsEntry { min, max });
    }

    pub fn get(&self, name: &str) -> Option<BoundsEntry> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, BoundsEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), *entry))
    }

    /// Load persisted bounds; an absent file means the corpus was never built
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::BoundsNotFound(path.to_path_buf()));
        }
        Ok(BoundsFile::load(path)?.into())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        Ok(self.to_file().save(path)?)
    }

    pub fn to_file(&self) -> BoundsFile {
        BoundsFile(self.entries.clone())
    }
}

impl From<BoundsFile> for NormalizationBounds {
    fn from(file: BoundsFile) -> Self {
        Self { entries: file.0 }
    }
}

/// Data-quality findings from a statistics pass
#[derive(Debug, Clone, PartialEq)]
pub enum StatsDiagnostic {
    /// No numeric value was seen for the feature; bounds default to {0, 0}
    EmptyField(Field),
    /// Non-finite elements were skipped
    NonFinite {
        vector: usize,
        field: Field,
        count: usize,
    },
}

impl fmt::Display for StatsDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatsDiagnostic::EmptyField(field) => {
                write!(f, "feature '{}' has no numeric values; bounds set to [0, 0]", field)
            }
            StatsDiagnostic::NonFinite {
                vector,
                field,
                count,
            } => write!(
                f,
                "vector {} has {} non-finite value(s) in '{}'; skipped",
                vector, count, field
            ),
        }
    }
}

/// Bounds plus the diagnostics raised while computing them
#[derive(Debug, Clone, Default)]
pub struct StatsReport {
    pub bounds: NormalizationBounds,
    pub diagnostics: Vec<StatsDiagnostic>,
}

/// Compute global per-feature bounds over a corpus of summary vectors
pub fn compute_bounds(vectors: &[SummaryVector]) -> StatsReport {
    let mut report = StatsReport::default();

    for field in Field::ALL {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for (index, vector) in vectors.iter().enumerate() {
            let mut skipped = 0;
            for &v in vector.get(field) {
                if v.is_finite() {
                    min = min.min(v);
                    max = max.max(v);
                } else {
                    skipped += 1;
                }
            }
            if skipped > 0 {
                report.diagnostics.push(StatsDiagnostic::NonFinite {
                    vector: index,
                    field,
                    count: skipped,
                });
            }
        }

        if min > max {
            report.diagnostics.push(StatsDiagnostic::EmptyField(field));
            report.bounds.insert(field.name(), 0.0, 0.0);
        } else {
            report.bounds.insert(field.name(), min, max);
        }
    }

    for diagnostic in &report.diagnostics {
        log::warn!("{}", diagnostic);
    }
    log::debug!(
        "Computed bounds for {} features over {} vectors",
        report.bounds.len(),
        vectors.len()
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::SUMMARY_DIM;
    use tempfile::TempDir;

    fn filled(value: f64) -> SummaryVector {
        SummaryVector::from_flat(&[value; SUMMARY_DIM]).unwrap()
    }

    #[test]
    fn test_list_fields_reduce_to_one_pair() {
        let mut flat = [0.0; SUMMARY_DIM];
        flat[0] = -3.0;
        flat[10] = 7.0;
        let report = compute_bounds(&[SummaryVector::from_flat(&flat).unwrap(), filled(1.0)]);

        let mfcc = report.bounds.get("mfcc_mean").unwrap();
        assert_eq!((mfcc.min, mfcc.max), (-3.0, 7.0));
        let flatness = report.bounds.get("spectral_flatness").unwrap();
        assert_eq!((flatness.min, flatness.max), (0.0, 1.0));
        assert_eq!(report.bounds.len(), Field::COUNT);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_order_independent() {
        let vectors: Vec<SummaryVector> = (0..5)
            .map(|i| {
                let flat: Vec<f64> = (0..SUMMARY_DIM).map(|d| ((i * 7 + d * 3) % 11) as f64).collect();
                SummaryVector::from_flat(&flat).unwrap()
            })
            .collect();
        let mut reversed = vectors.clone();
        reversed.reverse();
        assert_eq!(compute_bounds(&vectors).bounds, compute_bounds(&reversed).bounds);
    }

    #[test]
    fn test_empty_corpus_defaults_to_zero_bounds() {
        let report = compute_bounds(&[]);
        assert_eq!(report.diagnostics.len(), Field::COUNT);
        for field in Field::ALL {
            let entry = report.bounds.get(field.name()).unwrap();
            assert_eq!((entry.min, entry.max), (0.0, 0.0));
        }
    }

    #[test]
    fn test_non_finite_values_are_skipped() {
        let mut flat = [2.0; SUMMARY_DIM];
        flat[Field::SpectralCentroid.offset()] = f64::NAN;
        let report = compute_bounds(&[SummaryVector::from_flat(&flat).unwrap(), filled(4.0)]);

        let centroid = report.bounds.get("spectral_centroid").unwrap();
        assert_eq!((centroid.min, centroid.max), (4.0, 4.0));
        assert_eq!(
            report.diagnostics,
            vec![StatsDiagnostic::NonFinite {
                vector: 0,
                field: Field::SpectralCentroid,
                count: 1
            }]
        );
    }

    #[test]
    fn test_missing_bounds_file() {
        let dir = TempDir::new().unwrap();
        let err = NormalizationBounds::load(&dir.path().join("configs.json")).unwrap_err();
        assert!(matches!(err, Error::BoundsNotFound(_)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("configs.json");
        let bounds = compute_bounds(&[filled(1.0), filled(3.0)]).bounds;
        bounds.save(&path).unwrap();
        assert_eq!(NormalizationBounds::load(&path).unwrap(), bounds);
    }
}
