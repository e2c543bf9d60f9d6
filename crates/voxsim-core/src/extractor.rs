//! Per-frame feature extraction
//!
//! The rest of the pipeline depends only on the shape of [`FrameFeatures`];
//! [`SpectralExtractor`] is the in-process implementation.

use crate::audio::resample_linear;
use crate::config::AnalysisConfig;
use crate::error::ExtractionError;
use crate::transform::{self, delta, mel, spectral};

/// Per-frame analysis of one recording. Every matrix is [row][frame].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameFeatures {
    /// MFCC with the leading coefficients already dropped
    pub mfcc: Vec<Vec<f64>>,
    pub delta_mfcc: Vec<Vec<f64>>,
    pub spectral_contrast: Vec<Vec<f64>>,
    /// Single row
    pub spectral_centroid: Vec<Vec<f64>>,
    /// Single row
    pub spectral_flatness: Vec<Vec<f64>>,
}

impl FrameFeatures {
    pub fn num_frames(&self) -> usize {
        self.mfcc.first().map_or(0, |row| row.len())
    }
}

/// Turns a waveform into per-frame features
pub trait FeatureExtractor: Send + Sync {
    /// Analyze mono samples recorded at `sample_rate`
    fn extract(&self, samples: &[f32], sample_rate: u32) -> Result<FrameFeatures, ExtractionError>;

    /// Rate recordings should be decoded to before extraction
    fn sample_rate(&self) -> u32;

    /// Parameters recorded alongside a persisted corpus
    fn describe(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// MFCC, delta, contrast, centroid and flatness computed with `rustfft`
#[derive(Debug, Clone)]
pub struct SpectralExtractor {
    config: AnalysisConfig,
}

impl SpectralExtractor {
    pub fn new(config: AnalysisConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }
}

impl Default for SpectralExtractor {
    fn default() -> Self {
        Self {
            config: AnalysisConfig::default(),
        }
    }
}

impl FeatureExtractor for SpectralExtractor {
    fn extract(&self, samples: &[f32], sample_rate: u32) -> Result<FrameFeatures, ExtractionError> {
        if samples.is_empty() {
            return Err(ExtractionError::Empty);
        }
        if samples.iter().any(|s| !s.is_finite()) {
            return Err(ExtractionError::Decode(
                "waveform contains non-finite samples".to_string(),
            ));
        }

        let cfg = &self.config;
        let samples: Vec<f64> = resample_linear(samples, sample_rate, cfg.sample_rate)
            .into_iter()
            .map(f64::from)
            .collect();

        // MFCC and centroid share the fine-hop STFT
        let fine = transform::stft(&samples, cfg.n_fft, cfg.hop_length, cfg.sample_rate);
        let mfcc = mel::mfcc(
            &fine.power(),
            &mel::MfccParams {
                sample_rate: cfg.sample_rate,
                n_fft: cfg.n_fft,
                n_mels: cfg.n_mels,
                n_mfcc: cfg.n_mfcc,
                skip: cfg.mfcc_skip,
                amin: cfg.amin,
                top_db: cfg.top_db,
            },
        );
        let delta_mfcc = delta::delta(&mfcc, cfg.delta_width);
        let centroid = spectral::spectral_centroid(&fine);

        let contrast_spec =
            transform::stft(&samples, cfg.n_fft, cfg.contrast_hop_length, cfg.sample_rate);
        let contrast = spectral::spectral_contrast(
            &contrast_spec,
            &spectral::ContrastParams {
                n_bands: cfg.contrast_bands,
                fmin: cfg.contrast_fmin,
                quantile: cfg.contrast_quantile,
                amin: cfg.amin,
                top_db: cfg.top_db,
            },
        );

        let flatness = if cfg.flatness_hop_length == cfg.contrast_hop_length {
            spectral::spectral_flatness(&contrast_spec, cfg.amin)
        } else {
            let spec =
                transform::stft(&samples, cfg.n_fft, cfg.flatness_hop_length, cfg.sample_rate);
            spectral::spectral_flatness(&spec, cfg.amin)
        };

        Ok(FrameFeatures {
            mfcc,
            delta_mfcc,
            spectral_contrast: contrast,
            spectral_centroid: vec![centroid],
            spectral_flatness: vec![flatness],
        })
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    fn describe(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null)
    }
}
