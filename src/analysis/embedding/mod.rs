//! Semantic embedding extraction
//!
//! The production extractor runs a YAMNet-style ONNX model and needs the
//! `onnx` feature. Without it, loading the default extractor fails with
//! `ModelNotLoaded` so the process refuses to serve.

pub mod chunking;
pub mod model;
#[cfg(feature = "onnx")]
pub mod onnx;

use crate::analysis::traits::EmbeddingExtractor;
use crate::error::Result;
#[cfg(not(feature = "onnx"))]
use crate::error::SoundalikeError;
use std::path::Path;

#[cfg(feature = "onnx")]
pub use onnx::OrtEmbeddingExtractor;

pub use model::{find_model_path, EMBEDDING_DIM, EMBEDDING_MODEL_ENV};

/// Locate and load the default embedding extractor
#[cfg(feature = "onnx")]
pub fn load_default(explicit: Option<&Path>) -> Result<Box<dyn EmbeddingExtractor>> {
    let path = find_model_path(explicit)?;
    Ok(Box::new(OrtEmbeddingExtractor::load(&path)?))
}

/// Locate and load the default embedding extractor
#[cfg(not(feature = "onnx"))]
pub fn load_default(explicit: Option<&Path>) -> Result<Box<dyn EmbeddingExtractor>> {
    let hint = explicit
        .map(|p| format!(" (requested model: {})", p.display()))
        .unwrap_or_default();
    Err(SoundalikeError::model_not_loaded(
        "embedding model",
        format!(
            "this build has no ONNX Runtime support{}. Rebuild with --features onnx",
            hint
        ),
    ))
}
