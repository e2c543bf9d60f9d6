//! Spectral shape features: contrast, centroid and flatness

use super::{power_to_db, Spectrogram};

/// Spectral contrast parameters
#[derive(Debug, Clone, Copy)]
pub struct ContrastParams {
    pub n_bands: usize,
    pub fmin: f64,
    pub quantile: f64,
    pub amin: f64,
    pub top_db: f64,
}

/// Octave-band spectral contrast, [band][frame] with `n_bands + 1` rows
///
/// Band `k` spans `[fmin * 2^(k-1), fmin * 2^k]` (the first starts at 0 Hz,
/// the last extends to Nyquist). Each value is the dB difference between the
/// mean of the loudest and the quietest `quantile` share of the band's bins.
pub fn spectral_contrast(spec: &Spectrogram, params: &ContrastParams) -> Vec<Vec<f64>> {
    let freqs = spec.bin_frequencies();
    let num_bins = freqs.len();
    let n_bands = params.n_bands;

    let mut edges = vec![0.0; n_bands + 2];
    for (k, edge) in edges.iter_mut().skip(1).enumerate() {
        *edge = params.fmin * 2f64.powi(k as i32);
    }

    let mut peak = vec![vec![0.0; spec.num_frames()]; n_bands + 1];
    let mut valley = vec![vec![0.0; spec.num_frames()]; n_bands + 1];

    for k in 0..=n_bands {
        let (low, high) = (edges[k], edges[k + 1]);
        let mut band: Vec<usize> = (0..num_bins)
            .filter(|&i| freqs[i] >= low && freqs[i] <= high)
            .collect();
        let (Some(&first), Some(&last)) = (band.first(), band.last()) else {
            continue;
        };

        // Bands overlap by one bin at the lower edge
        if k > 0 && first > 0 {
            band.insert(0, first - 1);
        }
        if k == n_bands {
            band.extend(last + 1..num_bins);
        }
        let count = band.len();
        if k < n_bands {
            band.pop();
        }
        if band.is_empty() {
            continue;
        }

        let take = ((params.quantile * count as f64).round_ties_even() as usize)
            .max(1)
            .min(band.len());

        let mut sorted = Vec::with_capacity(band.len());
        for (t, frame) in spec.frames.iter().enumerate() {
            sorted.clear();
            sorted.extend(band.iter().map(|&i| frame[i]));
            sorted.sort_by(|a, b| a.total_cmp(b));

            valley[k][t] = mean(&sorted[..take]);
            peak[k][t] = mean(&sorted[sorted.len() - take..]);
        }
    }

    let peak_db = power_to_db(&peak, params.amin, params.top_db);
    let valley_db = power_to_db(&valley, params.amin, params.top_db);

    peak_db
        .iter()
        .zip(&valley_db)
        .map(|(p, v)| p.iter().zip(v).map(|(p, v)| p - v).collect())
        .collect()
}

/// Magnitude-weighted mean frequency of every frame; silent frames give 0
pub fn spectral_centroid(spec: &Spectrogram) -> Vec<f64> {
    let freqs = spec.bin_frequencies();
    spec.frames
        .iter()
        .map(|frame| {
            let total: f64 = frame.iter().sum();
            if total <= f64::MIN_POSITIVE {
                return 0.0;
            }
            frame.iter().zip(&freqs).map(|(m, f)| m * f).sum::<f64>() / total
        })
        .collect()
}

/// Ratio of geometric to arithmetic mean of the power spectrum per frame
pub fn spectral_flatness(spec: &Spectrogram, amin: f64) -> Vec<f64> {
    spec.frames
        .iter()
        .map(|frame| {
            let n = frame.len() as f64;
            let mut log_sum = 0.0;
            let mut sum = 0.0;
            for &m in frame {
                let power = (m * m).max(amin);
                log_sum += power.ln();
                sum += power;
            }
            (log_sum / n).exp() / (sum / n)
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::stft;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn params() -> ContrastParams {
        ContrastParams {
            n_bands: 6,
            fmin: 200.0,
            quantile: 0.02,
            amin: 1e-10,
            top_db: 80.0,
        }
    }

    fn sine(freq: f64, sr: u32, secs: f64) -> Vec<f64> {
        (0..(sr as f64 * secs) as usize)
            .map(|n| (2.0 * PI * freq * n as f64 / sr as f64).sin())
            .collect()
    }

    #[test]
    fn test_contrast_has_one_row_per_band_plus_residual() {
        let spec = stft(&sine(440.0, 16000, 0.5), 2048, 512, 16000);
        let contrast = spectral_contrast(&spec, &params());
        assert_eq!(contrast.len(), 7);
        assert!(contrast.iter().all(|row| row.len() == spec.num_frames()));
        assert!(contrast.iter().flatten().all(|v| v.is_finite()));
        // A pure tone is strongly peaked in its band
        assert!(contrast[2][spec.num_frames() / 2] > 10.0);
    }

    #[test]
    fn test_contrast_of_silence_is_zero() {
        let spec = stft(&vec![0.0; 8000], 2048, 512, 16000);
        let contrast = spectral_contrast(&spec, &params());
        assert!(contrast.iter().flatten().all(|&v| v == 0.0));
    }

    #[test]
    fn test_centroid_tracks_tone_frequency() {
        let spec = stft(&sine(1000.0, 16000, 0.5), 2048, 160, 16000);
        let centroid = spectral_centroid(&spec);
        assert_abs_diff_eq!(centroid[centroid.len() / 2], 1000.0, epsilon = 5.0);
    }

    #[test]
    fn test_centroid_of_silence_is_zero() {
        let spec = stft(&vec![0.0; 4000], 2048, 160, 16000);
        assert!(spectral_centroid(&spec).iter().all(|&c| c == 0.0));
    }

    #[test]
    fn test_flatness_bounds() {
        let silent = stft(&vec![0.0; 4000], 2048, 512, 16000);
        for f in spectral_flatness(&silent, 1e-10) {
            assert_abs_diff_eq!(f, 1.0, epsilon = 1e-9);
        }

        let tone = stft(&sine(1000.0, 16000, 0.5), 2048, 512, 16000);
        let flatness = spectral_flatness(&tone, 1e-10);
        assert!(flatness[flatness.len() / 2] < 0.01);
    }
}
