//! Fixed-length chunking and frame averaging for the embedding model
//!
//! The model is run on consecutive non-overlapping chunks. Every chunk
//! yields one or more frames of (embedding, class scores); the track-level
//! result is the mean over all frames of all chunks.

use crate::error::{Result, SoundalikeError};

/// Chunk length fed to the model in seconds
pub const CHUNK_SECONDS: f32 = 2.0;

/// Class scores at or below this are not reported as a detected class
pub const CLASS_SCORE_THRESHOLD: f32 = 0.15;

/// Split a signal into consecutive chunks of `seconds` (the last may be shorter)
pub fn chunk_signal(samples: &[f32], sample_rate: u32, seconds: f32) -> std::slice::Chunks<'_, f32> {
    let chunk_len = ((seconds * sample_rate as f32) as usize).max(1);
    samples.chunks(chunk_len)
}

/// Running mean over rows of a `[frames, dim]` tensor
#[derive(Debug, Clone)]
pub struct FrameAverager {
    sums: Vec<f64>,
    rows: usize,
}

impl FrameAverager {
    pub fn new(dim: usize) -> Self {
        Self {
            sums: vec![0.0; dim],
            rows: 0,
        }
    }

    pub fn dim(&self) -> usize {
        self.sums.len()
    }

    pub fn frames(&self) -> usize {
        self.rows
    }

    /// Add a row-major block of frames
    pub fn push_frames(&mut self, data: &[f32], what: &str) -> Result<()> {
        let dim = self.dim();
        if dim == 0 || data.len() % dim != 0 {
            return Err(SoundalikeError::extraction(
                "embedding",
                format!("{} tensor of {} values is not a multiple of {}", what, data.len(), dim),
            ));
        }
        for row in data.chunks(dim) {
            for (s, v) in self.sums.iter_mut().zip(row) {
                *s += *v as f64;
            }
            self.rows += 1;
        }
        Ok(())
    }

    /// Mean row, or zeros when nothing was pushed
    pub fn mean(&self) -> Vec<f32> {
        if self.rows == 0 {
            return vec![0.0; self.dim()];
        }
        let n = self.rows as f64;
        self.sums.iter().map(|s| (s / n) as f32).collect()
    }
}

/// Highest mean class score, or 0.0 if none clears [`CLASS_SCORE_THRESHOLD`]
pub fn top_class_score(mean_scores: &[f32]) -> f32 {
    mean_scores
        .iter()
        .cloned()
        .filter(|s| s.is_finite())
        .fold(None, |best: Option<f32>, s| Some(best.map_or(s, |b| b.max(s))))
        .filter(|&s| s > CLASS_SCORE_THRESHOLD)
        .unwrap_or(0.0)
}
