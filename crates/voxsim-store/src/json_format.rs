//! JSON formats for per-recording feature files and corpus bounds
//!
//! A feature file mirrors the summary vector layout: one key per feature, each
//! holding a list of numbers or a single number. Keys are written in canonical
//! feature order. Unknown keys are preserved in `extra` so readers can reject
//! files produced by a different pipeline instead of silently dropping data.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A feature value: either a single number or a list of numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Scalar(f64),
    List(Vec<f64>),
}

impl FeatureValue {
    /// All scalar elements, in order
    pub fn elements(&self) -> &[f64] {
        match self {
            FeatureValue::Scalar(v) => std::slice::from_ref(v),
            FeatureValue::List(values) => values,
        }
    }

    pub fn len(&self) -> usize {
        self.elements().len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements().is_empty()
    }
}

/// Per-recording feature file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfcc_mean: Option<FeatureValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfcc_std: Option<FeatureValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_mfcc_mean: Option<FeatureValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_mfcc_std: Option<FeatureValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectral_contrast_mean: Option<FeatureValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectral_centroid: Option<FeatureValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectral_flatness: Option<FeatureValue>,
    /// Keys this format version does not know about
    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl FeatureFile {
    /// Look up a known feature by name
    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        match name {
            "mfcc_mean" => self.mfcc_mean.as_ref(),
            "mfcc_std" => self.mfcc_std.as_ref(),
            "delta_mfcc_mean" => self.delta_mfcc_mean.as_ref(),
            "delta_mfcc_std" => self.delta_mfcc_std.as_ref(),
            "spectral_contrast_mean" => self.spectral_contrast_mean.as_ref(),
            "spectral_centroid" => self.spectral_centroid.as_ref(),
            "spectral_flatness" => self.spectral_flatness.as_ref(),
            _ => None,
        }
    }

    /// Set a feature by name. Returns false for names this format does not know.
    pub fn set(&mut self, name: &str, value: FeatureValue) -> bool {
        let slot = match name {
            "mfcc_mean" => &mut self.mfcc_mean,
            "mfcc_std" => &mut self.mfcc_std,
            "delta_mfcc_mean" => &mut self.delta_mfcc_mean,
            "delta_mfcc_std" => &mut self.delta_mfcc_std,
            "spectral_contrast_mean" => &mut self.spectral_contrast_mean,
            "spectral_centroid" => &mut self.spectral_centroid,
            "spectral_flatness" => &mut self.spectral_flatness,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Save to JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json_str = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json_str)
            .with_context(|| format!("Failed to write feature file: {}", path.display()))?;
        Ok(())
    }

    /// Load from JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read feature file: {}", path.display()))?;
        let file: FeatureFile = serde_json::from_str(&json_str)
            .with_context(|| format!("Malformed feature file: {}", path.display()))?;
        Ok(file)
    }
}

/// Min/max pair for one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsEntry {
    pub min: f64,
    pub max: f64,
}

/// Corpus bounds file: feature name -> {min, max}
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundsFile(pub BTreeMap<String, BoundsEntry>);

impl BoundsFile {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json_str = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json_str)
            .with_context(|| format!("Failed to write bounds file: {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read bounds file: {}", path.display()))?;
        let bounds: BoundsFile = serde_json::from_str(&json_str)
            .with_context(|| format!("Malformed bounds file: {}", path.display()))?;
        Ok(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_file_keeps_canonical_key_order() {
        let mut file = FeatureFile::default();
        file.set("spectral_flatness", FeatureValue::List(vec![0.1]));
        file.set("spectral_centroid", FeatureValue::Scalar(1200.0));
        file.set("mfcc_mean", FeatureValue::List(vec![1.0, 2.0]));

        let json = serde_json::to_string(&file).unwrap();
        let mfcc = json.find("mfcc_mean").unwrap();
        let centroid = json.find("spectral_centroid").unwrap();
        let flatness = json.find("spectral_flatness").unwrap();
        assert!(mfcc < centroid && centroid < flatness);
        assert!(json.contains("\"spectral_centroid\":1200.0"));
    }

    #[test]
    fn test_feature_file_collects_unknown_keys() {
        let json = r#"{"mfcc_mean": [1, 2], "zero_crossing_rate": 0.3}"#;
        let file: FeatureFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.get("mfcc_mean").unwrap().elements(), &[1.0, 2.0]);
        assert!(file.extra.contains_key("zero_crossing_rate"));
        assert!(file.get("mfcc_std").is_none());
    }

    #[test]
    fn test_set_rejects_unknown_name() {
        let mut file = FeatureFile::default();
        assert!(!file.set("pitch", FeatureValue::Scalar(1.0)));
    }

    #[test]
    fn test_bounds_file_accepts_integer_values() {
        let json = r#"{"spectral_centroid": {"min": 0, "max": 0}}"#;
        let bounds: BoundsFile = serde_json::from_str(json).unwrap();
        let entry = bounds.0["spectral_centroid"];
        assert_eq!(entry.min, 0.0);
        assert_eq!(entry.max, 0.0);
    }

    #[test]
    fn test_bounds_file_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("configs.json");
        let mut bounds = BoundsFile::default();
        bounds.0.insert("mfcc_mean".to_string(), BoundsEntry { min: -3.5, max: 12.0 });
        bounds.save(&path).unwrap();
        assert_eq!(BoundsFile::load(&path).unwrap(), bounds);
    }
}
