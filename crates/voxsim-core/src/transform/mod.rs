//! Short-time Fourier transform and the per-frame features built on it
//!
//! Frames are centered: the signal is zero-padded by `n_fft / 2` on both sides,
//! so frame `t` is centered on sample `t * hop`.

pub mod delta;
pub mod mel;
pub mod spectral;

use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

/// Magnitude spectrogram
#[derive(Debug, Clone)]
pub struct Spectrogram {
    /// Magnitude values [time_frame][frequency_bin]
    pub frames: Vec<Vec<f64>>,
    pub n_fft: usize,
    pub sample_rate: u32,
}

impl Spectrogram {
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn num_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Center frequency of every bin in Hz
    pub fn bin_frequencies(&self) -> Vec<f64> {
        fft_frequencies(self.sample_rate, self.n_fft)
    }

    /// Squared magnitudes
    pub fn power(&self) -> Vec<Vec<f64>> {
        self.frames
            .iter()
            .map(|frame| frame.iter().map(|m| m * m).collect())
            .collect()
    }
}

/// Compute the centered magnitude STFT of a mono signal
pub fn stft(samples: &[f64], n_fft: usize, hop: usize, sample_rate: u32) -> Spectrogram {
    let pad = n_fft / 2;
    let mut padded = vec![0.0; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    let num_frames = 1 + (padded.len() - n_fft) / hop;
    let num_bins = n_fft / 2 + 1;

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n_fft);
    let window = hann_window(n_fft);

    let mut buffer = vec![Complex::new(0.0, 0.0); n_fft];
    let mut frames = Vec::with_capacity(num_frames);

    for frame_idx in 0..num_frames {
        let start = frame_idx * hop;
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = Complex::new(padded[start + i] * window[i], 0.0);
        }

        fft.process(&mut buffer);

        frames.push(buffer[..num_bins].iter().map(|c| c.norm()).collect());
    }

    Spectrogram {
        frames,
        n_fft,
        sample_rate,
    }
}

/// Periodic Hann window
fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / size as f64).cos())
        .collect()
}

/// Frequencies of the non-negative FFT bins
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f64> {
    let step = sample_rate as f64 / n_fft as f64;
    (0..=n_fft / 2).map(|k| k as f64 * step).collect()
}

/// Convert a power-like matrix to decibels, clipped to `top_db` below its peak
pub fn power_to_db(values: &[Vec<f64>], amin: f64, top_db: f64) -> Vec<Vec<f64>> {
    let mut db: Vec<Vec<f64>> = values
        .iter()
        .map(|row| row.iter().map(|&v| 10.0 * v.max(amin).log10()).collect())
        .collect();

    let peak = db
        .iter()
        .flatten()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    if peak.is_finite() {
        let floor = peak - top_db;
        for v in db.iter_mut().flatten() {
            *v = v.max(floor);
        }
    }
    db
}

/// Swap a [frame][row] matrix into [row][frame]
pub fn transpose(matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let rows = matrix.first().map_or(0, |r| r.len());
    (0..rows)
        .map(|r| matrix.iter().map(|frame| frame[r]).collect())
        .collect()
}
