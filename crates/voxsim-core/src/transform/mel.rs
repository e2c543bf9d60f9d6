//! Mel filterbank and MFCC
//!
//! Uses the Slaney mel scale (linear below 1 kHz, logarithmic above) with
//! area-normalized triangular filters.

use super::{fft_frequencies, power_to_db};
use std::f64::consts::PI;

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular mel filters spanning 0 Hz to Nyquist, [mel_band][fft_bin]
pub fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<Vec<f64>> {
    let fft_freqs = fft_frequencies(sample_rate, n_fft);

    let mel_max = hz_to_mel(sample_rate as f64 / 2.0);
    let mel_points: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (left, center, right) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
            let enorm = 2.0 / (right - left);
            fft_freqs
                .iter()
                .map(|&f| {
                    let lower = (f - left) / (center - left);
                    let upper = (right - f) / (right - center);
                    lower.min(upper).max(0.0) * enorm
                })
                .collect()
        })
        .collect()
}

/// Orthonormal DCT-II basis, [coefficient][input]
fn dct_basis(n_out: usize, n_in: usize) -> Vec<Vec<f64>> {
    let n = n_in as f64;
    (0..n_out)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..n_in)
                .map(|i| scale * (PI * k as f64 * (2 * i + 1) as f64 / (2.0 * n)).cos())
                .collect()
        })
        .collect()
}

/// MFCC parameters
#[derive(Debug, Clone, Copy)]
pub struct MfccParams {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub n_mels: usize,
    pub n_mfcc: usize,
    /// Leading coefficients to drop
    pub skip: usize,
    pub amin: f64,
    pub top_db: f64,
}

/// MFCC from a power spectrogram ([frame][bin]), returned as [coefficient][frame]
/// with the first `skip` coefficients removed
pub fn mfcc(power: &[Vec<f64>], params: &MfccParams) -> Vec<Vec<f64>> {
    let filters = mel_filterbank(params.sample_rate, params.n_fft, params.n_mels);

    let mel_frames: Vec<Vec<f64>> = power
        .iter()
        .map(|frame| {
            filters
                .iter()
                .map(|filter| filter.iter().zip(frame).map(|(w, p)| w * p).sum())
                .collect()
        })
        .collect();

    // dB clipping is relative to the peak over the whole recording
    let log_mel = power_to_db(&mel_frames, params.amin, params.top_db);

    let basis = dct_basis(params.n_mfcc, params.n_mels);
    basis[params.skip..]
        .iter()
        .map(|row| {
            log_mel
                .iter()
                .map(|frame| row.iter().zip(frame).map(|(b, v)| b * v).sum())
                .collect()
        })
        .collect()
}
