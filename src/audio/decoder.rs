//! Audio decoding using symphonia
//!
//! Produces the decoded, mono, fixed-rate signal both feature extractors
//! consume. Resampling uses rubato with a linear fallback.

use crate::error::{Result, SoundalikeError};
use crate::types::{AudioBuffer, AudioFormat};
use rubato::{FftFixedInOut, Resampler};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

/// Sample rate the spectral and embedding extractors expect (16 kHz)
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Largest file we attempt to decode (2 GB)
const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Rubato chunk size in input frames
const RESAMPLE_CHUNK: usize = 1024;

/// Decode an audio file to mono at [`TARGET_SAMPLE_RATE`]
pub fn decode(path: &Path) -> Result<AudioBuffer> {
    decode_at(path, TARGET_SAMPLE_RATE)
}

/// Decode an audio file to mono at an arbitrary rate
pub fn decode_at(path: &Path, target_rate: u32) -> Result<AudioBuffer> {
    check_input(path)?;

    let (mut format, mut decoder, track_id, source_rate, channels) = open(path)?;
    debug!(
        "Decoding: {} @ {}Hz, {} channels",
        path.display(),
        source_rate,
        channels
    );

    let mono = read_mono(path, format.as_mut(), decoder.as_mut(), track_id, channels)?;
    if mono.is_empty() {
        return Err(SoundalikeError::decode_error(path, "Stream contains no audio samples"));
    }

    let samples = resample(&mono, source_rate, target_rate);
    let buffer = AudioBuffer::new(samples, target_rate);
    debug!("Decoded {} samples ({:.2}s)", buffer.len(), buffer.duration);
    Ok(buffer)
}

fn check_input(path: &Path) -> Result<()> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SoundalikeError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => {
            return Err(SoundalikeError::decode_error(
                path,
                format!("Failed to read file metadata: {}", e),
            ))
        }
    };

    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if AudioFormat::from_extension(ext).is_none() {
            return Err(SoundalikeError::UnsupportedFormat {
                path: path.to_path_buf(),
                format: ext.to_string(),
            });
        }
    }

    if metadata.len() > MAX_FILE_SIZE {
        return Err(SoundalikeError::decode_error(
            path,
            format!(
                "File too large ({:.1} GB). Maximum supported size is 2 GB.",
                metadata.len() as f64 / (1024.0 * 1024.0 * 1024.0)
            ),
        ));
    }
    Ok(())
}

type OpenedTrack = (Box<dyn FormatReader>, Box<dyn Decoder>, u32, u32, usize);

/// Probe the container and build a decoder for its first audio track
fn open(path: &Path) -> Result<OpenedTrack> {
    let file = std::fs::File::open(path)
        .map_err(|e| SoundalikeError::decode_error(path, format!("Failed to open file: {}", e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| SoundalikeError::decode_error(path, format!("Failed to probe format: {}", e)))?;
    let format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SoundalikeError::decode_error(path, "No audio tracks found"))?;

    let track_id = track.id;
    let source_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);

    let decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| {
            SoundalikeError::decode_error(path, format!("Failed to create decoder: {}", e))
        })?;

    Ok((format, decoder, track_id, source_rate, channels))
}

/// Pull every packet of `track_id`, downmixing to mono
fn read_mono(
    path: &Path,
    format: &mut dyn FormatReader,
    decoder: &mut dyn Decoder,
    track_id: u32,
    channels: usize,
) -> Result<Vec<f32>> {
    let mut mono = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                return Err(SoundalikeError::decode_error(
                    path,
                    format!("Failed to read packet: {}", e),
                ));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                trace!("Skipping corrupted frame: {}", e);
                continue;
            }
            Err(e) => {
                return Err(SoundalikeError::decode_error(path, format!("Decode error: {}", e)));
            }
        };

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        mono.extend(to_mono(sample_buf.samples(), channels));
    }

    Ok(mono)
}

/// Average interleaved channels into one
fn to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Resample mono audio with rubato's FFT resampler
///
/// Falls back to linear interpolation if rubato cannot be built or fails
/// part-way through.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let mut resampler =
        match FftFixedInOut::<f32>::new(from_rate as usize, to_rate as usize, RESAMPLE_CHUNK, 1) {
            Ok(r) => r,
            Err(e) => {
                debug!("Rubato initialization failed ({}), using fallback", e);
                return resample_linear(samples, from_rate, to_rate);
            }
        };

    let frames_in = resampler.input_frames_next();
    let frames_out = resampler.output_frames_next();
    let ratio = to_rate as f64 / from_rate as f64;
    let expected_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(expected_len + frames_out);

    for (i, chunk) in samples.chunks(frames_in).enumerate() {
        let mut block = chunk.to_vec();
        block.resize(frames_in, 0.0);
        let input = vec![block];

        match resampler.process(&input, None) {
            Ok(resampled) => {
                if let Some(channel) = resampled.first() {
                    let valid = ((chunk.len() as f64 * ratio).ceil() as usize)
                        .min(frames_out)
                        .min(channel.len());
                    output.extend_from_slice(&channel[..valid]);
                }
            }
            Err(e) => {
                debug!("Rubato processing error ({}), using fallback for remaining", e);
                output.extend(resample_linear(&samples[i * frames_in..], from_rate, to_rate));
                break;
            }
        }
    }

    output
}

/// Linear-interpolation resampler
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let step = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / step) as usize;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = pos as usize;
            let frac = (pos - idx as f64) as f32;
            if idx < last {
                samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
            } else {
                samples[last]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_mono_stereo() {
        let stereo = vec![0.5, 0.3, 0.8, 0.2, 1.0, 0.0];
        let mono = to_mono(&stereo, 2);
        assert_eq!(mono.len(), 3);
        assert!((mono[0] - 0.4).abs() < 0.001);
        assert!((mono[1] - 0.5).abs() < 0.001);
        assert!((mono[2] - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_to_mono_already_mono() {
        let mono = vec![0.5, 0.8, 1.0];
        assert_eq!(to_mono(&mono, 1), mono);
    }

    #[test]
    fn test_resample_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }

    #[test]
    fn test_resample_44k_to_16k_length() {
        let samples: Vec<f32> = (0..44100).map(|i| (i as f32 * 0.01).sin()).collect();
        let result = resample(&samples, 44100, TARGET_SAMPLE_RATE);
        assert!((result.len() as f64 - 16000.0).abs() < 20.0, "got {}", result.len());
    }

    #[test]
    fn test_resample_keeps_sine_amplitude() {
        use std::f32::consts::PI;
        let samples: Vec<f32> = (0..8820)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / 44100.0).sin())
            .collect();
        let result = resample(&samples, 44100, 22050);
        let max = result.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min = result.iter().cloned().fold(f32::INFINITY, f32::min);
        assert!(max > 0.9, "max {} should be > 0.9", max);
        assert!(min < -0.9, "min {} should be < -0.9", min);
    }

    #[test]
    fn test_linear_fallback_length() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let result = resample_linear(&samples, 32000, 16000);
        assert_eq!(result.len(), 50);
        assert!((result[1] - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = decode(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, SoundalikeError::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();
        let err = decode(&path).unwrap_err();
        assert!(matches!(err, SoundalikeError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_garbage_wav_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"RIFF....not really a wave file").unwrap();
        let err = decode(&path).unwrap_err();
        assert!(matches!(err, SoundalikeError::DecodeError { .. }));
        assert!(err.is_request_error());
    }

    #[test]
    fn test_decode_wav_resamples_to_16k() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..44100 {
            let s = ((i as f32 * 0.05).sin() * 10000.0) as i16;
            writer.write_sample(s).unwrap();
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let buffer = decode(&path).unwrap();
        assert_eq!(buffer.sample_rate, TARGET_SAMPLE_RATE);
        assert!((buffer.duration - 1.0).abs() < 0.01, "duration {}", buffer.duration);
    }
}
