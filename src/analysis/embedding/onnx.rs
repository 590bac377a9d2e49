//! ONNX Runtime based embedding extractor
//!
//! Runs a YAMNet-style model that maps a 16 kHz waveform to per-frame
//! `embeddings` and class `scores`.

use super::chunking::{chunk_signal, top_class_score, FrameAverager, CHUNK_SECONDS};
use super::model::{EMBEDDING_DIM, NUM_CLASSES};
use crate::analysis::traits::{EmbeddingExtractor, EmbeddingFeatures};
use crate::error::{Result, SoundalikeError};
use crate::types::AudioBuffer;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::Session;
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, trace};

/// Output tensor holding per-frame embeddings
const EMBEDDINGS_OUTPUT: &str = "embeddings";

/// Output tensor holding per-frame class scores
const SCORES_OUTPUT: &str = "scores";

/// Embedding extractor backed by an ORT session
pub struct OrtEmbeddingExtractor {
    model_path: PathBuf,
    /// ORT session (wrapped in Mutex for interior mutability)
    session: Mutex<Session>,
    input_name: String,
}

impl OrtEmbeddingExtractor {
    /// Load the model and build a CPU session
    pub fn load(model_path: &Path) -> Result<Self> {
        let session = Session::builder()
            .map_err(|e| not_loaded("failed to create ORT session builder", e))?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(|e| not_loaded("failed to configure CPU provider", e))?
            .commit_from_file(model_path)
            .map_err(|e| not_loaded("failed to load model", e))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| {
                SoundalikeError::model_not_loaded("embedding model", "model has no input tensors")
            })?;

        for required in [EMBEDDINGS_OUTPUT, SCORES_OUTPUT] {
            if !session.outputs.iter().any(|o| o.name == required) {
                return Err(SoundalikeError::model_not_loaded(
                    "embedding model",
                    format!("model has no '{}' output", required),
                ));
            }
        }

        info!("Embedding model loaded from {}", model_path.display());
        Ok(Self {
            model_path: model_path.to_path_buf(),
            session: Mutex::new(session),
            input_name,
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Run one chunk and fold its frames into the averagers
    fn run_chunk(
        &self,
        session: &mut Session,
        chunk: &[f32],
        embeddings: &mut FrameAverager,
        scores: &mut FrameAverager,
    ) -> Result<()> {
        let input = Tensor::from_array(ndarray::Array1::from(chunk.to_vec()))
            .map_err(|e| SoundalikeError::extraction(self.name(), format!("input tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| SoundalikeError::extraction(self.name(), format!("inference failed: {}", e)))?;

        for (name, value) in outputs.iter() {
            let target = match name {
                EMBEDDINGS_OUTPUT => &mut *embeddings,
                SCORES_OUTPUT => &mut *scores,
                _ => continue,
            };
            let (shape, data) = value.try_extract_tensor::<f32>().map_err(|e| {
                SoundalikeError::extraction(self.name(), format!("output '{}': {}", name, e))
            })?;
            trace!("{} output shape {:?}", name, shape);
            target.push_frames(data, name)?;
        }
        Ok(())
    }
}

fn not_loaded(what: &str, e: impl std::fmt::Display) -> SoundalikeError {
    SoundalikeError::model_not_loaded("embedding model", format!("{}: {}", what, e))
}

impl EmbeddingExtractor for OrtEmbeddingExtractor {
    fn extract(&self, buffer: &AudioBuffer) -> Result<EmbeddingFeatures> {
        let mut embeddings = FrameAverager::new(EMBEDDING_DIM);
        let mut scores = FrameAverager::new(NUM_CLASSES);

        if buffer.is_empty() {
            debug!("Empty signal, returning zero embedding");
            return Ok(EmbeddingFeatures {
                embedding: embeddings.mean(),
                top_class_score: 0.0,
            });
        }

        let mut session = self.session.lock().map_err(|_| {
            SoundalikeError::extraction(self.name(), "failed to acquire session lock")
        })?;

        for chunk in chunk_signal(&buffer.samples, buffer.sample_rate, CHUNK_SECONDS) {
            self.run_chunk(&mut session, chunk, &mut embeddings, &mut scores)?;
        }

        debug!(
            "Embedding averaged over {} frames ({} score frames)",
            embeddings.frames(),
            scores.frames()
        );
        Ok(EmbeddingFeatures {
            embedding: embeddings.mean(),
            top_class_score: top_class_score(&scores.mean()),
        })
    }

    fn embedding_dim(&self) -> usize {
        EMBEDDING_DIM
    }

    fn name(&self) -> &'static str {
        "yamnet-ort"
    }
}
