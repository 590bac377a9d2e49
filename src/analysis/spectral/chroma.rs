//! Chroma by pitch-class folding of STFT bins

use ndarray::Array2;

/// Number of pitch classes
pub const N_CHROMA: usize = 12;

/// Lowest frequency folded into chroma (C1)
const MIN_CHROMA_HZ: f32 = 32.703;

/// Pitch class (C = 0) of a frequency
pub fn pitch_class(hz: f32) -> usize {
    let midi = 69.0 + 12.0 * (hz / 440.0).log2();
    (midi.round() as i64).rem_euclid(N_CHROMA as i64) as usize
}

/// Chromagram `[frames, 12]` from a power spectrogram, each frame scaled to max 1
pub fn chromagram(power: &Array2<f32>, bin_hz: &[f32]) -> Array2<f32> {
    let classes: Vec<Option<usize>> = bin_hz
        .iter()
        .map(|&f| (f >= MIN_CHROMA_HZ).then(|| pitch_class(f)))
        .collect();

    let mut chroma = Array2::<f32>::zeros((power.nrows(), N_CHROMA));
    for (frame, mut out) in power.outer_iter().zip(chroma.outer_iter_mut()) {
        for (&p, class) in frame.iter().zip(&classes) {
            if let Some(c) = class {
                out[*c] += p;
            }
        }
        let peak = out.iter().cloned().fold(0.0f32, f32::max);
        if peak > 0.0 {
            out.mapv_inplace(|v| v / peak);
        }
    }
    chroma
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_classes() {
        assert_eq!(pitch_class(440.0), 9); // A
        assert_eq!(pitch_class(261.63), 0); // C
        assert_eq!(pitch_class(880.0), 9);
        assert_eq!(pitch_class(466.16), 10); // A#
    }

    #[test]
    fn test_chromagram_normalised_per_frame() {
        let bin_hz = vec![0.0, 261.63, 440.0, 880.0];
        let power = Array2::from_shape_vec((2, 4), vec![5.0, 1.0, 2.0, 2.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        let chroma = chromagram(&power, &bin_hz);
        assert_eq!(chroma.dim(), (2, N_CHROMA));
        assert!((chroma[[0, 9]] - 1.0).abs() < 1e-6);
        assert!((chroma[[0, 0]] - 0.25).abs() < 1e-6);
        // DC is ignored, silent frames stay zero
        assert!(chroma.row(1).iter().all(|&v| v == 0.0));
    }
}
