//! Octave-band spectral contrast

use super::mel::AMIN;
use ndarray::Array2;

/// Octave bands above [`CONTRAST_FMIN`]; one extra band covers 0..fmin
pub const N_OCTAVE_BANDS: usize = 6;

/// Total contrast values per frame
pub const N_CONTRAST: usize = N_OCTAVE_BANDS + 1;

/// Lower edge of the first octave band in Hz
pub const CONTRAST_FMIN: f32 = 200.0;

/// Fraction of a band averaged for its peak and valley
pub const CONTRAST_QUANTILE: f32 = 0.02;

/// Band edges `[0, fmin, 2·fmin, …, 2^6·fmin]`
fn band_edges() -> [f32; N_CONTRAST + 1] {
    let mut edges = [0.0; N_CONTRAST + 1];
    for (i, edge) in edges.iter_mut().enumerate().skip(1) {
        *edge = CONTRAST_FMIN * 2f32.powi(i as i32 - 1);
    }
    edges
}

/// Peak-minus-valley contrast in dB, shape `[frames, 7]`
pub fn spectral_contrast(magnitude: &Array2<f32>, bin_hz: &[f32]) -> Array2<f32> {
    let edges = band_edges();
    let bands: Vec<Vec<usize>> = (0..N_CONTRAST)
        .map(|b| {
            bin_hz
                .iter()
                .enumerate()
                .filter(|(_, &f)| f >= edges[b] && f <= edges[b + 1])
                .map(|(k, _)| k)
                .collect()
        })
        .collect();

    let mut contrast = Array2::<f32>::zeros((magnitude.nrows(), N_CONTRAST));
    let mut scratch = Vec::new();

    for (frame, mut out) in magnitude.outer_iter().zip(contrast.outer_iter_mut()) {
        for (b, bins) in bands.iter().enumerate() {
            if bins.is_empty() {
                continue;
            }
            scratch.clear();
            scratch.extend(bins.iter().map(|&k| frame[k]));
            scratch.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

            let take = ((CONTRAST_QUANTILE * scratch.len() as f32).round() as usize).max(1);
            let valley = scratch[..take].iter().sum::<f32>() / take as f32;
            let peak = scratch[scratch.len() - take..].iter().sum::<f32>() / take as f32;
            out[b] = to_db(peak) - to_db(valley);
        }
    }
    contrast
}

fn to_db(v: f32) -> f32 {
    10.0 * v.max(AMIN).log10()
}
