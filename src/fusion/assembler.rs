//! Feature vector assembly
//!
//! Concatenates extractor outputs into one fused vector in layout order.

use super::layout::{FeatureBlock, FeatureLayout};
use crate::error::{Result, SoundalikeError};

/// The four sub-blocks for one audio item, before fusion
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFeatures {
    /// Spectral/timbral block from the spectral extractor
    pub spectral: Vec<f32>,
    /// Semantic embedding after the reducer
    pub embedding_reduced: Vec<f32>,
    /// Top semantic-class confidence
    pub instrument_score: f32,
    /// Duration in seconds
    pub duration: f32,
}

/// Builds fused vectors for a fixed layout
#[derive(Debug, Clone, Copy)]
pub struct FeatureAssembler {
    layout: FeatureLayout,
}

impl FeatureAssembler {
    pub fn new(layout: FeatureLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    /// Fuse the sub-blocks into one vector of length `layout.total_len()`
    pub fn assemble(&self, features: &QueryFeatures) -> Result<Vec<f32>> {
        self.check_block(FeatureBlock::Spectral, &features.spectral)?;
        self.check_block(FeatureBlock::Embedding, &features.embedding_reduced)?;

        let mut fused = Vec::with_capacity(self.layout.total_len());
        fused.extend_from_slice(&features.spectral);
        fused.extend_from_slice(&features.embedding_reduced);
        fused.push(features.instrument_score);
        fused.push(features.duration);

        self.layout.check_vector(&fused, "assembled query vector")?;
        Ok(fused)
    }

    /// Borrow one block back out of a fused vector
    pub fn block<'a>(&self, fused: &'a [f32], block: FeatureBlock) -> Result<&'a [f32]> {
        if fused.len() != self.layout.total_len() {
            return Err(SoundalikeError::length_mismatch(
                "fused vector",
                self.layout.total_len(),
                fused.len(),
            ));
        }
        Ok(&fused[self.layout.range(block)])
    }

    fn check_block(&self, block: FeatureBlock, values: &[f32]) -> Result<()> {
        let expected = self.layout.block_len(block);
        if values.len() != expected {
            return Err(SoundalikeError::length_mismatch(block, expected, values.len()));
        }
        Ok(())
    }
}
