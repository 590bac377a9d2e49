//! Versioned feature layout
//!
//! The fused vector is `spectral ++ embedding_reduced ++ [instrument] ++ [duration]`.
//! Both the offline catalogue builder and the online pipeline go through this
//! type, and every artifact carries it, so a layout change fails loudly
//! instead of silently skewing distances.

use crate::analysis::spectral::SPECTRAL_BLOCK_LEN;
use crate::error::{Result, SoundalikeError};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Current layout version written by the catalogue builder
pub const LAYOUT_VERSION: u32 = 1;

/// Output dimensionality of the embedding reducer in layout v1
pub const REDUCED_EMBEDDING_LEN: usize = 64;

/// Named blocks of the fused vector, in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureBlock {
    Spectral,
    Embedding,
    Instrument,
    Duration,
}

impl FeatureBlock {
    pub const ALL: [FeatureBlock; 4] = [
        FeatureBlock::Spectral,
        FeatureBlock::Embedding,
        FeatureBlock::Instrument,
        FeatureBlock::Duration,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FeatureBlock::Spectral => "spectral block",
            FeatureBlock::Embedding => "reduced embedding block",
            FeatureBlock::Instrument => "instrument score",
            FeatureBlock::Duration => "duration",
        }
    }
}

impl std::fmt::Display for FeatureBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Shape of the fused feature vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureLayout {
    pub version: u32,
    pub spectral_len: usize,
    pub embedding_len: usize,
}

impl Default for FeatureLayout {
    fn default() -> Self {
        Self::v1()
    }
}

impl FeatureLayout {
    /// The layout produced by the built-in spectral extractor and a 64-d reducer
    pub fn v1() -> Self {
        Self {
            version: LAYOUT_VERSION,
            spectral_len: SPECTRAL_BLOCK_LEN,
            embedding_len: REDUCED_EMBEDDING_LEN,
        }
    }

    /// Length of one block
    pub fn block_len(&self, block: FeatureBlock) -> usize {
        match block {
            FeatureBlock::Spectral => self.spectral_len,
            FeatureBlock::Embedding => self.embedding_len,
            FeatureBlock::Instrument | FeatureBlock::Duration => 1,
        }
    }

    /// Offset range of one block inside the fused vector
    pub fn range(&self, block: FeatureBlock) -> Range<usize> {
        let mut start = 0;
        for b in FeatureBlock::ALL {
            let len = self.block_len(b);
            if b == block {
                return start..start + len;
            }
            start += len;
        }
        unreachable!("FeatureBlock::ALL covers every block")
    }

    /// Total length `L` of the fused vector
    pub fn total_len(&self) -> usize {
        FeatureBlock::ALL.iter().map(|&b| self.block_len(b)).sum()
    }

    /// Fail unless `other` describes exactly the same vector shape
    pub fn ensure_compatible(&self, other: &FeatureLayout, context: &str) -> Result<()> {
        if self != other {
            return Err(SoundalikeError::SchemaError(format!(
                "{} uses layout v{} (spectral {}, embedding {}), expected v{} (spectral {}, embedding {})",
                context,
                other.version,
                other.spectral_len,
                other.embedding_len,
                self.version,
                self.spectral_len,
                self.embedding_len
            )));
        }
        Ok(())
    }

    /// Validate a fused vector against this layout
    pub fn check_vector(&self, vector: &[f32], context: &str) -> Result<()> {
        if vector.len() != self.total_len() {
            return Err(SoundalikeError::length_mismatch(
                context,
                self.total_len(),
                vector.len(),
            ));
        }
        if let Some(idx) = vector.iter().position(|v| !v.is_finite()) {
            return Err(SoundalikeError::SchemaError(format!(
                "{}: non-finite value at offset {} ({})",
                context,
                idx,
                self.block_at(idx).name()
            )));
        }
        Ok(())
    }

    /// Which block a fused-vector offset belongs to
    pub fn block_at(&self, offset: usize) -> FeatureBlock {
        FeatureBlock::ALL
            .into_iter()
            .find(|&b| self.range(b).contains(&offset))
            .unwrap_or(FeatureBlock::Duration)
    }
}
