//! Recommendation engine
//!
//! Drives one audio item through decode, extraction, fusion, cluster
//! assignment and ranking. The catalogue and cluster index live in one
//! immutable snapshot that can be replaced wholesale while requests are in
//! flight.

use super::ranker::{Ranker, DEFAULT_LIMIT};
use crate::analysis::{self, EmbeddingExtractor, SpectralExtractor, SpectralFeatureExtractor};
use crate::audio;
use crate::config::{ArtifactPaths, Settings};
use crate::error::{Result, SoundalikeError};
use crate::fusion::{EmbeddingReducer, FeatureAssembler, FeatureLayout, QueryFeatures};
use crate::index::{BruteForceSearch, Catalogue, ClusterIndex, NeighborSearch, DEFAULT_FALLBACK_K};
use crate::types::{AudioBuffer, RecommendationMethod, RecommendationResponse, Recommendations};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, trace, warn};

// =============================================================================
// Request lifecycle
// =============================================================================

/// Where a request currently is
///
/// Stages only move forward. A failure at any stage ends the request with the
/// error; nothing is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    RawAudio,
    Decoded,
    FeaturesExtracted,
    VectorAssembled,
    ClusterAssigned,
    CandidatesFromCluster,
    CandidatesFromFallback,
    Ranked,
    Done,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::RawAudio => "raw_audio",
            PipelineStage::Decoded => "decoded",
            PipelineStage::FeaturesExtracted => "features_extracted",
            PipelineStage::VectorAssembled => "vector_assembled",
            PipelineStage::ClusterAssigned => "cluster_assigned",
            PipelineStage::CandidatesFromCluster => "candidates_from_cluster",
            PipelineStage::CandidatesFromFallback => "candidates_from_fallback",
            PipelineStage::Ranked => "ranked",
            PipelineStage::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn advance(stage: &mut PipelineStage, next: PipelineStage) {
    trace!("{} -> {}", stage, next);
    *stage = next;
}

// =============================================================================
// Index snapshot
// =============================================================================

/// Catalogue plus the cluster index built over it
#[derive(Debug)]
pub struct RecommendationIndex {
    pub catalogue: Catalogue,
    pub clusters: ClusterIndex,
}

impl RecommendationIndex {
    pub fn new(catalogue: Catalogue, clusters: ClusterIndex) -> Self {
        Self { catalogue, clusters }
    }

    /// Load catalogue, metadata and clusters from disk
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let catalogue = Catalogue::load(&paths.features, &paths.metadata)?;
        let clusters = ClusterIndex::load(&paths.clusters, &catalogue)?;
        if catalogue.is_empty() {
            warn!("Catalogue {} is empty, every request will return no recommendations", paths.features.display());
        }
        Ok(Self::new(catalogue, clusters))
    }

    pub fn layout(&self) -> &FeatureLayout {
        self.catalogue.layout()
    }
}

// =============================================================================
// Recommender
// =============================================================================

/// Tunables for one recommender
#[derive(Debug, Clone, Copy)]
pub struct RecommenderOptions {
    /// Maximum recommendations per response
    pub limit: usize,
    /// Neighbours requested from the similarity fallback
    pub fallback_k: usize,
}

impl Default for RecommenderOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            fallback_k: DEFAULT_FALLBACK_K,
        }
    }
}

/// Online recommendation pipeline
///
/// Safe to share across threads; requests only read the extractors, the
/// reducer and an `Arc` snapshot of the index.
pub struct Recommender {
    spectral: Box<dyn SpectralExtractor>,
    embedding: Box<dyn EmbeddingExtractor>,
    reducer: Arc<EmbeddingReducer>,
    assembler: FeatureAssembler,
    search: Box<dyn NeighborSearch>,
    ranker: Ranker,
    fallback_k: usize,
    index: RwLock<Arc<RecommendationIndex>>,
}

impl Recommender {
    /// Wire the pipeline together, refusing inconsistent components
    ///
    /// Fails with `ModelNotLoaded` if the reducer is empty, and with
    /// `ConfigError` if the extractors or the reducer disagree with the
    /// catalogue's feature layout.
    pub fn new(
        spectral: Box<dyn SpectralExtractor>,
        embedding: Box<dyn EmbeddingExtractor>,
        reducer: Arc<EmbeddingReducer>,
        index: RecommendationIndex,
        options: RecommenderOptions,
    ) -> Result<Self> {
        let layout = *index.layout();

        let (reducer_in, reducer_out) = reducer.dims().ok_or_else(|| {
            SoundalikeError::model_not_loaded(
                "embedding reducer",
                "load the reducer artifact before building the recommender",
            )
        })?;

        if reducer_in != embedding.embedding_dim() {
            return Err(SoundalikeError::ConfigError(format!(
                "embedding reducer expects {}-dim input but {} produces {}",
                reducer_in,
                embedding.name(),
                embedding.embedding_dim()
            )));
        }
        if reducer_out != layout.embedding_len {
            return Err(SoundalikeError::ConfigError(format!(
                "embedding reducer outputs {} values but the catalogue layout expects {}",
                reducer_out, layout.embedding_len
            )));
        }
        if spectral.block_len() != layout.spectral_len {
            return Err(SoundalikeError::ConfigError(format!(
                "{} produces {} spectral values but the catalogue layout expects {}",
                spectral.name(),
                spectral.block_len(),
                layout.spectral_len
            )));
        }

        info!(
            "Recommender ready: {} songs, {} clusters, extractors {}/{}",
            index.catalogue.len(),
            index.clusters.len(),
            spectral.name(),
            embedding.name()
        );

        Ok(Self {
            spectral,
            embedding,
            reducer,
            assembler: FeatureAssembler::new(layout),
            search: Box::new(BruteForceSearch),
            ranker: Ranker::new(options.limit),
            fallback_k: options.fallback_k,
            index: RwLock::new(Arc::new(index)),
        })
    }

    /// Build the production pipeline from runtime settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let reducer = Arc::new(EmbeddingReducer::new());
        reducer.load(&settings.artifacts.reducer)?;

        let embedding = analysis::embedding::load_default(settings.embedding_model.as_deref())?;
        let index = RecommendationIndex::load(&settings.artifacts)?;

        Self::new(
            Box::new(SpectralFeatureExtractor::new()),
            embedding,
            reducer,
            index,
            RecommenderOptions {
                limit: settings.limit,
                fallback_k: settings.fallback_k,
            },
        )
    }

    /// Replace the similarity backend
    pub fn with_search(mut self, search: Box<dyn NeighborSearch>) -> Self {
        debug!("Using {} similarity search", search.name());
        self.search = search;
        self
    }

    pub fn layout(&self) -> &FeatureLayout {
        self.assembler.layout()
    }

    /// Current index snapshot
    pub fn snapshot(&self) -> Arc<RecommendationIndex> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Atomically replace the index, returning the previous snapshot
    ///
    /// Requests already running keep the snapshot they started with.
    pub fn swap_index(&self, next: Arc<RecommendationIndex>) -> Result<Arc<RecommendationIndex>> {
        self.layout()
            .ensure_compatible(next.layout(), "replacement catalogue")?;
        let mut guard = self.index.write().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *guard, next);
        info!(
            "Swapped recommendation index: {} -> {} songs",
            previous.catalogue.len(),
            guard.catalogue.len()
        );
        Ok(previous)
    }

    /// Recommend from an audio file, converting failure into an error payload
    pub fn respond(&self, path: &Path) -> RecommendationResponse {
        let result = self.recommend_file(path);
        if let Err(e) = &result {
            warn!("Recommendation failed for {}: {}", path.display(), e);
        }
        RecommendationResponse::from(result)
    }

    /// Full pipeline for one audio file
    pub fn recommend_file(&self, path: &Path) -> Result<Recommendations> {
        let mut stage = PipelineStage::RawAudio;
        let result = audio::decode(path).and_then(|buffer| {
            advance(&mut stage, PipelineStage::Decoded);
            self.run(&buffer, &mut stage)
        });
        if let Err(e) = &result {
            debug!("{} failed after stage {}: {}", path.display(), stage, e);
        }
        result
    }

    /// Pipeline for already-decoded audio
    pub fn recommend_buffer(&self, buffer: &AudioBuffer) -> Result<Recommendations> {
        let mut stage = PipelineStage::Decoded;
        let result = self.run(buffer, &mut stage);
        if let Err(e) = &result {
            debug!("Request failed after stage {}: {}", stage, e);
        }
        result
    }

    /// Run both extractors and the reducer
    pub fn extract_query(&self, buffer: &AudioBuffer) -> Result<QueryFeatures> {
        let spectral = self.spectral.extract(buffer)?;
        let embedding = self.embedding.extract(buffer)?;
        let embedding_reduced = self.reducer.reduce(&embedding.embedding)?;

        Ok(QueryFeatures {
            spectral: spectral.block,
            embedding_reduced,
            instrument_score: embedding.top_class_score,
            duration: spectral.duration,
        })
    }

    /// Cluster assignment, candidate selection and ranking for a fused vector
    pub fn recommend_vector(&self, vector: &[f32]) -> Result<Recommendations> {
        let mut stage = PipelineStage::VectorAssembled;
        self.rank_vector(vector, &mut stage)
    }

    fn run(&self, buffer: &AudioBuffer, stage: &mut PipelineStage) -> Result<Recommendations> {
        let query = self.extract_query(buffer)?;
        advance(stage, PipelineStage::FeaturesExtracted);

        let vector = self.assembler.assemble(&query)?;
        advance(stage, PipelineStage::VectorAssembled);

        self.rank_vector(&vector, stage)
    }

    fn rank_vector(&self, vector: &[f32], stage: &mut PipelineStage) -> Result<Recommendations> {
        let index = self.snapshot();
        index.layout().check_vector(vector, "query vector")?;

        let label = index.clusters.assign(vector)?;
        advance(stage, PipelineStage::ClusterAssigned);
        debug!("Query assigned to cluster {}", label);

        let members = index.clusters.lookup_members(label);
        let recommendations = if !members.is_empty() {
            advance(stage, PipelineStage::CandidatesFromCluster);
            self.ranker.rank(
                label,
                RecommendationMethod::Cluster,
                members.iter().map(String::as_str),
                &index.catalogue,
            )
        } else {
            advance(stage, PipelineStage::CandidatesFromFallback);
            warn!(
                "Cluster {} has no members, falling back to {} similarity search",
                label,
                self.search.name()
            );
            let hits = match self.search.search(&index.catalogue, vector, self.fallback_k) {
                Ok(hits) => hits,
                Err(SoundalikeError::EmptyCatalogue) => {
                    warn!("Catalogue is empty, returning no recommendations");
                    Vec::new()
                }
                Err(e) => return Err(e),
            };
            self.ranker.rank(
                label,
                RecommendationMethod::Similarity,
                hits.iter().map(|h| h.song_id.as_str()),
                &index.catalogue,
            )
        };
        advance(stage, PipelineStage::Ranked);

        debug!(
            "{} recommendations via {} from {} candidates",
            recommendations.recommendations.len(),
            recommendations.method,
            recommendations.total_candidates
        );
        advance(stage, PipelineStage::Done);
        Ok(recommendations)
    }
}

impl fmt::Debug for Recommender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recommender")
            .field("spectral", &self.spectral.name())
            .field("embedding", &self.embedding.name())
            .field("search", &self.search.name())
            .field("limit", &self.ranker.limit())
            .field("fallback_k", &self.fallback_k)
            .finish()
    }
}
