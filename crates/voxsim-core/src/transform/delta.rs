//! Delta (first time-derivative) features
//!
//! Savitzky-Golay derivative of order 1: interior frames use the centered
//! regression slope over `width` frames, the first and last `width / 2` frames
//! take the slope of a line fitted to the first or last full window.

/// Delta of every row of a [row][frame] matrix
pub fn delta(rows: &[Vec<f64>], width: usize) -> Vec<Vec<f64>> {
    rows.iter().map(|row| delta_row(row, width)).collect()
}

fn delta_row(row: &[f64], width: usize) -> Vec<f64> {
    let n = row.len();
    let half = width / 2;

    if n < width {
        return clamped_regression(row, half);
    }

    let denom = regression_denominator(half);
    let head = window_slope(&row[..width]);
    let tail = window_slope(&row[n - width..]);

    (0..n)
        .map(|t| {
            if t < half {
                head
            } else if t >= n - half {
                tail
            } else {
                (1..=half)
                    .map(|k| k as f64 * (row[t + k] - row[t - k]))
                    .sum::<f64>()
                    / denom
            }
        })
        .collect()
}

/// Σ k² for k in -half..=half
fn regression_denominator(half: usize) -> f64 {
    2.0 * (1..=half).map(|k| (k * k) as f64).sum::<f64>()
}

/// Least-squares slope of a window against its frame index
fn window_slope(window: &[f64]) -> f64 {
    let n = window.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = window.iter().sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in window.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Regression slope with edge frames repeated, for rows shorter than the window
fn clamped_regression(row: &[f64], half: usize) -> Vec<f64> {
    let n = row.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let at = |i: isize| row[i.clamp(0, n as isize - 1) as usize];
    let denom = regression_denominator(half);

    (0..n as isize)
        .map(|t| {
            (1..=half as isize)
                .map(|k| k as f64 * (at(t + k) - at(t - k)))
                .sum::<f64>()
                / denom
        })
        .collect()
}
