//! Optional waveform cleanup: peak normalization and silence removal
//!
//! Only silent runs bounded by sound on both sides are removed; leading and
//! trailing silence is kept.

use crate::audio::Waveform;
use crate::settings::PreprocessConfig;

/// Waveform-to-waveform cleanup stage
#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Apply the configured steps; returns the input unchanged when disabled
    pub fn process(&self, wave: Waveform) -> Waveform {
        if !self.config.enabled {
            return wave;
        }

        let original_len = wave.samples.len();
        let mut samples = wave.samples;
        if self.config.normalize_amplitude {
            normalize_peak(&mut samples);
        }
        let min_run =
            (self.config.min_silence_duration_s * wave.sample_rate as f64).round() as usize;
        let samples = remove_silence(&samples, self.config.silence_threshold, min_run.max(1));

        log::debug!(
            "Preprocessed waveform: {} -> {} samples",
            original_len,
            samples.len()
        );
        Waveform::new(samples, wave.sample_rate)
    }
}

/// Scale so the loudest sample has magnitude 1.0. Silent input is left alone.
pub fn normalize_peak(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak > 0.0 {
        for s in samples.iter_mut() {
            *s /= peak;
        }
    }
}

/// Drop interior runs of at least `min_run` samples below `threshold`
pub fn remove_silence(samples: &[f32], threshold: f32, min_run: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(samples.len());
    let mut seen_sound = false;
    let mut run_start: Option<usize> = None;

    for (i, &s) in samples.iter().enumerate() {
        if s.abs() < threshold {
            if run_start.is_none() {
                run_start = Some(i);
            }
            continue;
        }
        if let Some(start) = run_start.take() {
            let leading = !seen_sound;
            if leading || i - start < min_run {
                out.extend_from_slice(&samples[start..i]);
            }
        }
        seen_sound = true;
        out.push(s);
    }

    // Trailing silence is kept
    if let Some(start) = run_start {
        out.extend_from_slice(&samples[start..]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> PreprocessConfig {
        PreprocessConfig {
            enabled: true,
            ..PreprocessConfig::default()
        }
    }

    #[test]
    fn test_disabled_is_identity() {
        let wave = Waveform::new(vec![0.1, 0.0, 0.0, 0.3], 10);
        let out = Preprocessor::new(PreprocessConfig::default()).process(wave.clone());
        assert_eq!(out, wave);
    }

    #[test]
    fn test_normalize_peak() {
        let mut samples = vec![0.25, -0.5, 0.1];
        normalize_peak(&mut samples);
        assert_eq!(samples, vec![0.5, -1.0, 0.2]);

        let mut silent = vec![0.0; 4];
        normalize_peak(&mut silent);
        assert_eq!(silent, vec![0.0; 4]);
    }

    #[test]
    fn test_removes_only_long_interior_runs() {
        let samples = [0.0, 0.5, 0.0, 0.0, 0.0, 0.6, 0.0, 0.7, 0.0];
        let out = remove_silence(&samples, 0.01, 3);
        assert_eq!(out, vec![0.0, 0.5, 0.6, 0.0, 0.7, 0.0]);
    }

    #[test]
    fn test_all_silent_input_is_kept() {
        let samples = vec![0.001; 50];
        assert_eq!(remove_silence(&samples, 0.009, 5), samples);
    }

    #[test]
    fn test_process_uses_sample_rate_for_run_length() {
        // 0.1 s at 100 Hz is 10 samples
        let mut samples = vec![0.5; 5];
        samples.extend(vec![0.0; 10]);
        samples.extend(vec![0.5; 5]);
        samples.extend(vec![0.0; 9]);
        samples.extend(vec![0.5; 5]);

        let out = Preprocessor::new(enabled()).process(Waveform::new(samples, 100));
        assert_eq!(out.samples.len(), 5 + 5 + 9 + 5);
        assert_eq!(out.samples[0], 1.0);
        assert_eq!(out.sample_rate, 100);
    }
}
