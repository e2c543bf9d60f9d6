//! Analysis parameters for feature extraction
//!
//! Defaults are the fixed parameters every corpus and query is analyzed with.
//! Changing any of them produces vectors that are not comparable with a corpus
//! built under the old values.

use serde::{Deserialize, Serialize};

/// Feature extraction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    // Audio processing
    pub sample_rate: u32,

    // STFT used by MFCC and spectral centroid
    pub n_fft: usize,
    pub hop_length: usize,

    // MFCC
    pub n_mfcc: usize,
    /// Leading coefficients dropped (they mostly track loudness)
    pub mfcc_skip: usize,
    pub n_mels: usize,
    /// Dynamic range kept by the dB conversion
    pub top_db: f64,
    /// Savitzky-Golay window for delta coefficients (odd)
    pub delta_width: usize,

    // Spectral contrast
    pub contrast_bands: usize,
    pub contrast_fmin: f64,
    pub contrast_quantile: f64,
    pub contrast_hop_length: usize,

    // Spectral flatness
    pub flatness_hop_length: usize,

    /// Magnitude floor for logarithms
    pub amin: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,

            n_fft: 2048,
            hop_length: 160,

            n_mfcc: 13,
            mfcc_skip: 2,
            n_mels: 128,
            top_db: 80.0,
            delta_width: 9,

            contrast_bands: 6,
            contrast_fmin: 200.0,
            contrast_quantile: 0.02,
            contrast_hop_length: 512,

            flatness_hop_length: 512,

            amin: 1e-10,
        }
    }
}

impl AnalysisConfig {
    /// Number of MFCC rows left after dropping the leading coefficients
    pub fn mfcc_rows(&self) -> usize {
        self.n_mfcc.saturating_sub(self.mfcc_skip)
    }

    /// Number of spectral contrast rows (one per band plus the residual band)
    pub fn contrast_rows(&self) -> usize {
        self.contrast_bands + 1
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sample_rate == 0 {
            anyhow::bail!("Sample rate must be > 0");
        }
        if self.n_fft < 2 || self.hop_length == 0 {
            anyhow::bail!("n_fft must be >= 2 and hop_length must be > 0");
        }
        if self.contrast_hop_length == 0 || self.flatness_hop_length == 0 {
            anyhow::bail!("contrast and flatness hop lengths must be > 0");
        }
        if self.mfcc_skip >= self.n_mfcc {
            anyhow::bail!("mfcc_skip must be < n_mfcc");
        }
        if self.n_mfcc > self.n_mels {
            anyhow::bail!("n_mfcc must be <= n_mels");
        }
        if self.delta_width < 3 || self.delta_width % 2 == 0 {
            anyhow::bail!("delta_width must be odd and >= 3");
        }
        if !(0.0..1.0).contains(&self.contrast_quantile) {
            anyhow::bail!("contrast_quantile must be in [0, 1)");
        }
        let nyquist = self.sample_rate as f64 / 2.0;
        let top_edge = self.contrast_fmin * 2f64.powi(self.contrast_bands as i32 - 1);
        if self.contrast_fmin <= 0.0 || top_edge >= nyquist {
            anyhow::bail!("spectral contrast band edges exceed Nyquist; reduce contrast_fmin or contrast_bands");
        }
        Ok(())
    }
}
