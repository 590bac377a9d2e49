//! STFT (Short-Time Fourier Transform) for spectral features
//!
//! Parameters follow the usual music-analysis defaults: n_fft = 2048,
//! hop = 512, periodic Hann window, frames centred on their hop position
//! by reflect-padding n_fft / 2 samples at each end.

use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};

/// FFT window size (128 ms at 16 kHz)
pub const N_FFT: usize = 2048;

/// Hop length between frames (75% overlap)
pub const HOP_LENGTH: usize = 512;

/// Number of bins in the positive-frequency half of the spectrum
pub const NUM_FREQ_BINS: usize = N_FFT / 2 + 1;

/// Magnitude spectrogram, shape `[frames, bins]`
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub magnitude: Array2<f32>,
    pub sample_rate: u32,
    pub n_fft: usize,
}

impl Spectrogram {
    pub fn num_frames(&self) -> usize {
        self.magnitude.nrows()
    }

    pub fn num_bins(&self) -> usize {
        self.magnitude.ncols()
    }

    /// Centre frequency of every bin in Hz
    pub fn bin_frequencies(&self) -> Vec<f32> {
        let step = self.sample_rate as f32 / self.n_fft as f32;
        (0..self.num_bins()).map(|k| k as f32 * step).collect()
    }

    /// Power spectrogram (`magnitude²`)
    pub fn power(&self) -> Array2<f32> {
        self.magnitude.mapv(|m| m * m)
    }
}

/// Compute a centred magnitude STFT of a mono signal
pub fn compute_stft(samples: &[f32], sample_rate: u32) -> Spectrogram {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(N_FFT);
    let window = hann_window(N_FFT);

    let pad = N_FFT / 2;
    let padded = reflect_pad(samples, pad);
    let num_frames = if samples.is_empty() {
        0
    } else {
        1 + samples.len() / HOP_LENGTH
    };

    let mut magnitude = Array2::<f32>::zeros((num_frames, NUM_FREQ_BINS));
    let mut buffer = vec![Complex::new(0.0f32, 0.0); N_FFT];

    for (frame_idx, mut row) in magnitude.outer_iter_mut().enumerate() {
        let start = frame_idx * HOP_LENGTH;
        for (i, (slot, &w)) in buffer.iter_mut().zip(&window).enumerate() {
            let s = padded.get(start + i).copied().unwrap_or(0.0);
            *slot = Complex::new(s * w, 0.0);
        }

        fft.process(&mut buffer);

        for (out, c) in row.iter_mut().zip(&buffer[..NUM_FREQ_BINS]) {
            *out = c.norm();
        }
    }

    Spectrogram {
        magnitude,
        sample_rate,
        n_fft: N_FFT,
    }
}

/// Periodic Hann window
pub fn hann_window(size: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Mirror `pad` samples onto each end, excluding the edge sample itself
fn reflect_pad(samples: &[f32], pad: usize) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let n = samples.len();
    (0..n + 2 * pad)
        .map(|i| samples[reflect_index(i as isize - pad as isize, n)])
        .collect()
}

fn reflect_index(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let m = i.rem_euclid(period);
    if m >= n as isize {
        (period - m) as usize
    } else {
        m as usize
    }
}
