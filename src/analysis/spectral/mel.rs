//! Mel filterbank, decibel scaling and MFCC
//!
//! Slaney-style mel scale and area normalisation, matching the defaults
//! most music-analysis toolkits ship with.

use ndarray::Array2;
use std::f32::consts::PI;

/// Number of mel bands
pub const N_MELS: usize = 128;

/// Floor applied before taking logarithms
pub const AMIN: f32 = 1e-10;

/// Dynamic range kept by [`power_to_db`]
pub const TOP_DB: f32 = 80.0;

const F_SP: f32 = 200.0 / 3.0;
const MIN_LOG_HZ: f32 = 1000.0;
const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;

fn log_step() -> f32 {
    6.4f32.ln() / 27.0
}

/// Hz → mel (linear below 1 kHz, logarithmic above)
pub fn hz_to_mel(hz: f32) -> f32 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

/// mel → Hz
pub fn mel_to_hz(mel: f32) -> f32 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        mel * F_SP
    }
}

/// Triangular mel filters, shape `[n_mels, n_bins]`
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    weights: Array2<f32>,
}

impl MelFilterbank {
    /// Filters spanning 0 Hz to Nyquist for an `n_fft`-point STFT
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize) -> Self {
        let n_bins = n_fft / 2 + 1;
        let fmax = sample_rate as f32 / 2.0;
        let bin_hz: Vec<f32> = (0..n_bins)
            .map(|k| k as f32 * sample_rate as f32 / n_fft as f32)
            .collect();

        let mel_max = hz_to_mel(fmax);
        let edges: Vec<f32> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_max * i as f32 / (n_mels + 1) as f32))
            .collect();

        let mut weights = Array2::<f32>::zeros((n_mels, n_bins));
        for m in 0..n_mels {
            let (lo, centre, hi) = (edges[m], edges[m + 1], edges[m + 2]);
            let norm = 2.0 / (hi - lo);
            for (k, &f) in bin_hz.iter().enumerate() {
                let rising = (f - lo) / (centre - lo);
                let falling = (hi - f) / (hi - centre);
                let w = rising.min(falling).max(0.0);
                weights[[m, k]] = w * norm;
            }
        }

        Self { weights }
    }

    pub fn n_mels(&self) -> usize {
        self.weights.nrows()
    }

    /// Project a power spectrogram `[frames, bins]` onto mel bands
    pub fn apply(&self, power: &Array2<f32>) -> Array2<f32> {
        power.dot(&self.weights.t())
    }
}

/// Convert power to decibels relative to 1.0, clipped to [`TOP_DB`] below the peak
pub fn power_to_db(power: &Array2<f32>) -> Array2<f32> {
    let mut db = power.mapv(|p| 10.0 * p.max(AMIN).log10());
    let peak = db.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let floor = peak - TOP_DB;
    db.mapv_inplace(|v| v.max(floor));
    db
}

/// Orthonormal DCT-II matrix, shape `[n_out, n_in]`
pub fn dct_matrix(n_in: usize, n_out: usize) -> Array2<f32> {
    let mut matrix = Array2::<f32>::zeros((n_out, n_in));
    let scale = (2.0 / n_in as f32).sqrt();
    for k in 0..n_out {
        let s = if k == 0 { 0.5f32.sqrt() } else { 1.0 };
        for n in 0..n_in {
            let v = (PI / n_in as f32 * (n as f32 + 0.5) * k as f32).cos();
            matrix[[k, n]] = scale * s * v;
        }
    }
    matrix
}

/// MFCCs from a log-mel spectrogram `[frames, n_mels]`, result `[frames, n_mfcc]`
pub fn mfcc(log_mel: &Array2<f32>, n_mfcc: usize) -> Array2<f32> {
    let dct = dct_matrix(log_mel.ncols(), n_mfcc);
    log_mel.dot(&dct.t())
}
