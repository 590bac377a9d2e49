//! Offline catalogue builder
//!
//! Turns `features_combined.json` into the fused `features_reduced.json` and
//! the `clusters.json` centroids, going through the same reducer and
//! assembler as online queries.

use crate::config::BuildSettings;
use crate::error::{ErrorContext, Result, SoundalikeError};
use crate::export::write_json_atomic;
use crate::fusion::{
    fit_pca, EmbeddingReducer, FeatureAssembler, FeatureLayout, QueryFeatures, ReducerArtifact,
    ReducerModel,
};
use crate::index::{compute_centroids, CatalogueFile, CatalogueRecord, ClustersFile};
use crate::types::{ClusterLabel, SongId, NOISE_LABEL};
use rayon::prelude::*;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// One song in `features_combined.json`
#[derive(Debug, Deserialize)]
struct CombinedRecord {
    #[serde(default)]
    features: Option<Vec<f32>>,
    #[serde(default)]
    duration: Option<f32>,
    #[serde(default)]
    yamnet_embedding: Option<Vec<f32>>,
    /// Detected classes above threshold, class name -> score
    #[serde(default)]
    instruments: BTreeMap<String, f32>,
    #[serde(default)]
    cluster: Option<ClusterLabel>,
}

impl CombinedRecord {
    /// Confidence of the strongest detected class
    fn instrument_score(&self) -> f32 {
        self.instruments
            .values()
            .copied()
            .fold(None, |best: Option<f32>, v| Some(best.map_or(v, |b| b.max(v))))
            .unwrap_or(0.0)
    }
}

/// Build summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub written: usize,
    pub skipped: usize,
    pub clusters: usize,
    /// Whether the reducer was fitted (and written) by this build
    pub reducer_fitted: bool,
}

/// Run the builder, loading the reducer or fitting it from the embeddings
///
/// The reducer is fitted when `--fit-reducer` is set or the artifact does
/// not exist yet; the fitted artifact is written to the reducer path.
pub fn build_catalogue(settings: &BuildSettings) -> Result<BuildReport> {
    let raw = read_combined(&settings.combined)?;
    let reducer = EmbeddingReducer::new();

    let fit = settings.fit_reducer || !settings.reducer.exists();
    if fit {
        let artifact = fit_reducer(&raw, FeatureLayout::v1().embedding_len)?;
        write_json_atomic(&artifact, &settings.reducer)?;
        info!(
            "Fitted embedding reducer {} -> {} and wrote {}",
            artifact.input_dim,
            artifact.output_dim,
            settings.reducer.display()
        );
        reducer.install(ReducerModel::from_artifact(artifact)?)?;
    } else {
        reducer.load(&settings.reducer)?;
    }

    let mut report = fuse_all(settings, raw, &reducer)?;
    report.reducer_fitted = fit;
    Ok(report)
}

/// Run the builder with an already-loaded reducer
pub fn build_with_reducer(settings: &BuildSettings, reducer: &EmbeddingReducer) -> Result<BuildReport> {
    let raw = read_combined(&settings.combined)?;
    fuse_all(settings, raw, reducer)
}

fn fuse_all(
    settings: &BuildSettings,
    raw: BTreeMap<SongId, Value>,
    reducer: &EmbeddingReducer,
) -> Result<BuildReport> {
    let layout = FeatureLayout::v1();
    let (_, reducer_out) = reducer.dims().ok_or_else(|| {
        SoundalikeError::model_not_loaded("embedding reducer", "no reducer artifact has been loaded")
    })?;
    if reducer_out != layout.embedding_len {
        return Err(SoundalikeError::ConfigError(format!(
            "embedding reducer outputs {} values, layout v{} needs {}",
            reducer_out, layout.version, layout.embedding_len
        )));
    }

    info!("Fusing {} songs from {}", raw.len(), settings.combined.display());

    let assembler = FeatureAssembler::new(layout);
    let fused: Vec<(SongId, Result<CatalogueRecord>)> = raw
        .into_par_iter()
        .map(|(song_id, value)| {
            let record = fuse_record(&song_id, value, reducer, &assembler);
            (song_id, record)
        })
        .collect();

    let mut songs = BTreeMap::new();
    let mut skipped = 0usize;
    for (song_id, record) in fused {
        match record {
            Ok(record) => {
                songs.insert(song_id, record);
            }
            Err(e) => {
                warn!("Skipping song {}: {}", song_id, e);
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        warn!("Skipped {} incomplete records", skipped);
    }

    let centroids = compute_centroids(
        songs
            .values()
            .map(|r| (r.cluster.unwrap_or(NOISE_LABEL), r.features.as_slice())),
    );

    let written = songs.len();
    write_json_atomic(&CatalogueFile { layout, songs }, &settings.features_path())?;
    info!("Wrote {} fused vectors to {}", written, settings.features_path().display());

    let clusters = if settings.write_clusters {
        write_json_atomic(&ClustersFile::new(layout, &centroids), &settings.clusters_path())?;
        info!("Wrote {} centroids to {}", centroids.len(), settings.clusters_path().display());
        centroids.len()
    } else {
        debug!("Cluster output disabled");
        0
    };

    Ok(BuildReport {
        written,
        skipped,
        clusters,
        reducer_fitted: false,
    })
}

/// Fit on every record that carries an embedding
fn fit_reducer(raw: &BTreeMap<SongId, Value>, output_dim: usize) -> Result<ReducerArtifact> {
    let embeddings: Vec<Vec<f32>> = raw
        .values()
        .filter_map(|v| v.get("yamnet_embedding"))
        .filter_map(|e| serde_json::from_value::<Vec<f32>>(e.clone()).ok())
        .collect();
    debug!("Fitting reducer on {} of {} songs", embeddings.len(), raw.len());
    fit_pca(&embeddings, output_dim)
}

fn read_combined(path: &Path) -> Result<BTreeMap<SongId, Value>> {
    let bytes = std::fs::read(path).with_artifact_context(path)?;
    serde_json::from_slice(&bytes).with_artifact_context(path)
}

fn fuse_record(
    song_id: &str,
    value: Value,
    reducer: &EmbeddingReducer,
    assembler: &FeatureAssembler,
) -> Result<CatalogueRecord> {
    let record: CombinedRecord = serde_json::from_value(value)
        .map_err(|e| SoundalikeError::SchemaError(format!("song {}: {}", song_id, e)))?;

    let missing = |field: &str| SoundalikeError::SchemaError(format!("missing '{}'", field));
    let spectral = record.features.clone().ok_or_else(|| missing("features"))?;
    let embedding = record
        .yamnet_embedding
        .as_deref()
        .ok_or_else(|| missing("yamnet_embedding"))?;
    let duration = record.duration.ok_or_else(|| missing("duration"))?;

    let features = assembler.assemble(&QueryFeatures {
        spectral,
        embedding_reduced: reducer.reduce(embedding)?,
        instrument_score: record.instrument_score(),
        duration,
    })?;

    Ok(CatalogueRecord {
        features,
        cluster: Some(record.cluster.unwrap_or(NOISE_LABEL)),
    })
}
