//! Embedding dimensionality reduction
//!
//! Applies a pre-fit linear projection (PCA with optional whitening) to raw
//! semantic embeddings. The projection is fit offline and shipped as a JSON
//! artifact; at runtime it is loaded once and shared read-only.

use crate::error::{ErrorContext, Result, SoundalikeError};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Serialized reducer parameters
///
/// `components` is row-major `[output_dim][input_dim]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducerArtifact {
    pub input_dim: usize,
    pub output_dim: usize,
    pub mean: Vec<f32>,
    pub components: Vec<Vec<f32>>,
    #[serde(default)]
    pub explained_variance: Vec<f32>,
    #[serde(default)]
    pub whiten: bool,
}

/// A fitted linear projection
#[derive(Debug, Clone)]
pub struct ReducerModel {
    mean: Array1<f32>,
    components: Array2<f32>,
    /// Per-component divisor when whitening
    scale: Option<Array1<f32>>,
}

impl ReducerModel {
    /// Validate an artifact and build the projection
    pub fn from_artifact(artifact: ReducerArtifact) -> Result<Self> {
        let ReducerArtifact {
            input_dim,
            output_dim,
            mean,
            components,
            explained_variance,
            whiten,
        } = artifact;

        if input_dim == 0 || output_dim == 0 {
            return Err(SoundalikeError::SchemaError(
                "reducer dimensions must be non-zero".to_string(),
            ));
        }
        if mean.len() != input_dim {
            return Err(SoundalikeError::length_mismatch(
                "reducer mean",
                input_dim,
                mean.len(),
            ));
        }
        if components.len() != output_dim {
            return Err(SoundalikeError::length_mismatch(
                "reducer components",
                output_dim,
                components.len(),
            ));
        }
        if let Some((row, c)) = components
            .iter()
            .enumerate()
            .find(|(_, c)| c.len() != input_dim)
        {
            return Err(SoundalikeError::length_mismatch(
                format!("reducer component {}", row),
                input_dim,
                c.len(),
            ));
        }

        let scale = if whiten {
            if explained_variance.len() != output_dim {
                return Err(SoundalikeError::length_mismatch(
                    "reducer explained_variance",
                    output_dim,
                    explained_variance.len(),
                ));
            }
            if let Some(v) = explained_variance
                .iter()
                .find(|v| !v.is_finite() || **v <= 0.0)
            {
                return Err(SoundalikeError::SchemaError(format!(
                    "whitening requires positive explained variance, found {}",
                    v
                )));
            }
            Some(explained_variance.iter().map(|v| v.sqrt()).collect())
        } else {
            None
        };

        let flat: Vec<f32> = components.into_iter().flatten().collect();
        let components = Array2::from_shape_vec((output_dim, input_dim), flat)
            .map_err(|e| SoundalikeError::SchemaError(format!("reducer components: {}", e)))?;

        Ok(Self {
            mean: Array1::from(mean),
            components,
            scale,
        })
    }

    /// Read and validate a reducer artifact from disk
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_artifact_context(path)?;
        let artifact: ReducerArtifact = serde_json::from_slice(&bytes).with_artifact_context(path)?;
        let model = Self::from_artifact(artifact)?;
        debug!(
            "Loaded reducer {} -> {} (whiten: {}) from {}",
            model.input_dim(),
            model.output_dim(),
            model.scale.is_some(),
            path.display()
        );
        Ok(model)
    }

    pub fn input_dim(&self) -> usize {
        self.components.ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.components.nrows()
    }

    /// Project one raw embedding
    pub fn transform(&self, embedding: &[f32]) -> Result<Vec<f32>> {
        if embedding.len() != self.input_dim() {
            return Err(SoundalikeError::length_mismatch(
                "raw embedding",
                self.input_dim(),
                embedding.len(),
            ));
        }
        let centered = &ArrayView1::from(embedding) - &self.mean;
        let mut projected = self.components.dot(&centered);
        if let Some(scale) = &self.scale {
            projected.zip_mut_with(scale, |v, s| *v /= s);
        }
        Ok(projected.to_vec())
    }
}

/// Process-wide reducer slot
///
/// Loaded at most once; afterwards shared by every request without locking.
#[derive(Debug, Default)]
pub struct EmbeddingReducer {
    model: OnceLock<ReducerModel>,
}

impl EmbeddingReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the artifact into this slot
    pub fn load(&self, path: &Path) -> Result<()> {
        let model = ReducerModel::load(path)?;
        self.install(model)?;
        info!("Embedding reducer loaded from {}", path.display());
        Ok(())
    }

    /// Install an already-built model
    pub fn install(&self, model: ReducerModel) -> Result<()> {
        self.model.set(model).map_err(|_| {
            SoundalikeError::ConfigError("embedding reducer is already loaded".to_string())
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    /// `(input_dim, output_dim)` once loaded
    pub fn dims(&self) -> Option<(usize, usize)> {
        self.model.get().map(|m| (m.input_dim(), m.output_dim()))
    }

    /// Reduce one raw embedding
    pub fn reduce(&self, embedding: &[f32]) -> Result<Vec<f32>> {
        let model = self.model.get().ok_or_else(|| {
            SoundalikeError::model_not_loaded(
                "embedding reducer",
                "no reducer artifact has been loaded",
            )
        })?;
        model.transform(embedding)
    }
}
