//! Audio feature extraction
//!
//! This module provides traits for extractor backends and concrete implementations.
//! The trait abstraction allows swapping backends without changing pipeline code.

pub mod embedding;
pub mod spectral;
pub mod stft;
pub mod traits;

pub use traits::{EmbeddingExtractor, EmbeddingFeatures, SpectralExtractor, SpectralFeatures};

pub use spectral::{SpectralFeatureExtractor, SPECTRAL_BLOCK_LEN};

// ORT embedding extractor (requires 'onnx' feature)
#[cfg(feature = "onnx")]
pub use embedding::OrtEmbeddingExtractor;
