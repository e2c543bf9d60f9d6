//! TOML configuration for voxsim tools
//!
//! Every section is optional; missing keys take their defaults. Command-line
//! flags override whatever the file says.

use crate::audio::AudioFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct VoxsimConfig {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub preprocess: PreprocessConfig,
}

/// Where recordings live and which of them to index
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CorpusConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: None,
            extensions: default_extensions(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    AudioFormat::EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

/// Persisted index layout
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreFormat {
    /// One normalized JSON file per recording
    #[default]
    Json,
    /// A single binary `.vsi` file
    Snapshot,
    /// Write both, load the snapshot when present
    Auto,
}

impl std::str::FromStr for StoreFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(StoreFormat::Json),
            "snapshot" | "vsi" => Ok(StoreFormat::Snapshot),
            "auto" => Ok(StoreFormat::Auto),
            other => anyhow::bail!("Unknown store format '{}' (expected json, snapshot or auto)", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub format: StoreFormat,
    /// zstd-compress the snapshot payload
    #[serde(default = "default_compress")]
    pub compress: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            format: StoreFormat::default(),
            compress: default_compress(),
        }
    }
}

fn default_compress() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QueryConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}

fn default_top_n() -> usize {
    5
}

/// Optional waveform cleanup applied before extraction
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PreprocessConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Absolute amplitude below which a sample counts as silent
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold: f32,
    /// Silent runs shorter than this are kept
    #[serde(default = "default_min_silence_duration")]
    pub min_silence_duration_s: f64,
    #[serde(default = "default_normalize_amplitude")]
    pub normalize_amplitude: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            silence_threshold: default_silence_threshold(),
            min_silence_duration_s: default_min_silence_duration(),
            normalize_amplitude: default_normalize_amplitude(),
        }
    }
}

fn default_silence_threshold() -> f32 {
    0.009
}
fn default_min_silence_duration() -> f64 {
    0.1
}
fn default_normalize_amplitude() -> bool {
    true
}

impl VoxsimConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        let config: VoxsimConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML config: {}", e))?;
        Ok(config)
    }

    /// Load `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
