//! Analysis trait abstractions
//!
//! These traits define the interface for swappable feature extractors.
//! The recommender only depends on these, so tests and alternative models
//! plug in without touching the pipeline.

use crate::error::Result;
use crate::types::AudioBuffer;

/// Output of a spectral/timbral extractor
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralFeatures {
    /// Fixed-length spectral block
    pub block: Vec<f32>,
    /// Signal duration in seconds
    pub duration: f32,
}

/// Output of a semantic embedding extractor
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingFeatures {
    /// Raw (unreduced) embedding
    pub embedding: Vec<f32>,
    /// Confidence of the top detected semantic class, 0.0 when below threshold
    pub top_class_score: f32,
}

/// Spectral/timbral feature backend
pub trait SpectralExtractor: Send + Sync {
    /// Extract the spectral block from decoded mono audio
    fn extract(&self, buffer: &AudioBuffer) -> Result<SpectralFeatures>;

    /// Length of the block this extractor produces
    fn block_len(&self) -> usize;

    /// Get the name of this extractor (for logging)
    fn name(&self) -> &'static str;
}

/// Semantic embedding backend
pub trait EmbeddingExtractor: Send + Sync {
    /// Extract the raw embedding and top-class confidence
    fn extract(&self, buffer: &AudioBuffer) -> Result<EmbeddingFeatures>;

    /// Dimensionality of the raw embedding
    fn embedding_dim(&self) -> usize;

    /// Get the name of this extractor (for logging)
    fn name(&self) -> &'static str;
}
