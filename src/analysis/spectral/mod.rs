//! Spectral/timbral feature extraction
//!
//! Produces the fixed 50-value spectral block of the fused vector:
//!
//! | offset | values | feature |
//! |--------|--------|---------|
//! | 0      | 13     | MFCC means |
//! | 13     | 13     | MFCC standard deviations |
//! | 26     | 12     | chroma means |
//! | 38     | 1      | spectral centroid (Hz) |
//! | 39     | 1      | spectral bandwidth (Hz) |
//! | 40     | 1      | zero-crossing rate |
//! | 41     | 1      | tempo (reserved, always 0.0) |
//! | 42     | 1      | duration (s) |
//! | 43     | 7      | spectral contrast means |

pub mod chroma;
pub mod contrast;
pub mod mel;

use crate::analysis::stft::{compute_stft, Spectrogram, HOP_LENGTH, N_FFT};
use crate::analysis::traits::{SpectralExtractor, SpectralFeatures};
use crate::error::{Result, SoundalikeError};
use crate::types::AudioBuffer;
use ndarray::{Array2, Axis};
use tracing::trace;

use chroma::{chromagram, N_CHROMA};
use contrast::{spectral_contrast, N_CONTRAST};
use mel::{mfcc, power_to_db, MelFilterbank, N_MELS};

/// Number of MFCC coefficients
pub const N_MFCC: usize = 13;

/// Scalar descriptors between chroma and contrast
const N_SCALARS: usize = 5;

/// Length of the spectral block
pub const SPECTRAL_BLOCK_LEN: usize = 2 * N_MFCC + N_CHROMA + N_SCALARS + N_CONTRAST;

/// Built-in MFCC / chroma / contrast extractor
#[derive(Debug, Default, Clone, Copy)]
pub struct SpectralFeatureExtractor;

impl SpectralFeatureExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl SpectralExtractor for SpectralFeatureExtractor {
    fn extract(&self, buffer: &AudioBuffer) -> Result<SpectralFeatures> {
        if buffer.is_empty() || buffer.sample_rate == 0 {
            return Err(SoundalikeError::extraction(self.name(), "empty signal"));
        }
        if let Some(idx) = buffer.samples.iter().position(|s| !s.is_finite()) {
            return Err(SoundalikeError::extraction(
                self.name(),
                format!("non-finite sample at index {}", idx),
            ));
        }

        let spec = compute_stft(&buffer.samples, buffer.sample_rate);
        let bin_hz = spec.bin_frequencies();
        let power = spec.power();

        let mel_bank = MelFilterbank::new(buffer.sample_rate, N_FFT, N_MELS);
        let log_mel = power_to_db(&mel_bank.apply(&power));
        let coeffs = mfcc(&log_mel, N_MFCC);

        let (centroid, bandwidth) = centroid_and_bandwidth(&spec, &bin_hz);
        let duration = buffer.duration as f32;

        let mut block = Vec::with_capacity(SPECTRAL_BLOCK_LEN);
        block.extend(column_means(&coeffs));
        block.extend(column_stds(&coeffs));
        block.extend(column_means(&chromagram(&power, &bin_hz)));
        block.push(centroid);
        block.push(bandwidth);
        block.push(zero_crossing_rate(&buffer.samples));
        block.push(0.0);
        block.push(duration);
        block.extend(column_means(&spectral_contrast(&spec.magnitude, &bin_hz)));

        if block.len() != SPECTRAL_BLOCK_LEN {
            return Err(SoundalikeError::extraction(
                self.name(),
                format!("produced {} values, expected {}", block.len(), SPECTRAL_BLOCK_LEN),
            ));
        }
        if block.iter().any(|v| !v.is_finite()) {
            return Err(SoundalikeError::extraction(self.name(), "non-finite feature value"));
        }

        trace!(
            "Spectral block over {} frames: centroid {:.1} Hz, duration {:.2}s",
            spec.num_frames(),
            centroid,
            duration
        );
        Ok(SpectralFeatures { block, duration })
    }

    fn block_len(&self) -> usize {
        SPECTRAL_BLOCK_LEN
    }

    fn name(&self) -> &'static str {
        "spectral"
    }
}

fn column_means(frames: &Array2<f32>) -> Vec<f32> {
    frames
        .mean_axis(Axis(0))
        .map(|m| m.to_vec())
        .unwrap_or_else(|| vec![0.0; frames.ncols()])
}

/// Population standard deviation of each column
fn column_stds(frames: &Array2<f32>) -> Vec<f32> {
    if frames.nrows() == 0 {
        return vec![0.0; frames.ncols()];
    }
    frames.std_axis(Axis(0), 0.0).to_vec()
}

/// Frame-averaged spectral centroid and bandwidth (p = 2), in Hz
fn centroid_and_bandwidth(spec: &Spectrogram, bin_hz: &[f32]) -> (f32, f32) {
    let mut centroid_sum = 0.0f64;
    let mut bandwidth_sum = 0.0f64;
    let frames = spec.num_frames().max(1) as f64;

    for frame in spec.magnitude.outer_iter() {
        let total: f32 = frame.sum();
        if total <= 0.0 {
            continue;
        }
        let centroid: f32 = frame.iter().zip(bin_hz).map(|(m, f)| m * f).sum::<f32>() / total;
        let spread: f32 = frame
            .iter()
            .zip(bin_hz)
            .map(|(m, f)| (m / total) * (f - centroid).powi(2))
            .sum();
        centroid_sum += centroid as f64;
        bandwidth_sum += spread.sqrt() as f64;
    }

    ((centroid_sum / frames) as f32, (bandwidth_sum / frames) as f32)
}

/// Mean fraction of sign changes per centred frame
fn zero_crossing_rate(samples: &[f32]) -> f32 {
    let n = samples.len();
    let frames = 1 + n / HOP_LENGTH;
    let half = N_FFT / 2;
    let mut total = 0.0f64;

    for f in 0..frames {
        let centre = f * HOP_LENGTH;
        let start = centre.saturating_sub(half);
        let end = (centre + half).min(n);
        if end <= start + 1 {
            continue;
        }
        let crossings = samples[start..end]
            .windows(2)
            .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
            .count();
        total += crossings as f64 / N_FFT as f64;
    }

    (total / frames as f64) as f32
}
