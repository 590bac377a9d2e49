//! In-memory song catalogue
//!
//! Holds every reduced feature vector and its metadata. Built once from the
//! offline artifacts and never mutated afterwards.

use crate::error::{ErrorContext, Result, SoundalikeError};
use crate::fusion::FeatureLayout;
use crate::types::{ClusterLabel, SongId, SongMetadata, NOISE_LABEL};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

// =============================================================================
// Wire format
// =============================================================================

/// One entry of `features_reduced.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueRecord {
    pub features: Vec<f32>,
    /// Offline cluster label; absent or null means noise
    #[serde(default)]
    pub cluster: Option<ClusterLabel>,
}

/// Versioned `features_reduced.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueFile {
    pub layout: FeatureLayout,
    pub songs: BTreeMap<SongId, CatalogueRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnyCatalogueFile {
    Versioned(CatalogueFile),
    /// Pre-versioning flat map, always layout v1
    Legacy(BTreeMap<SongId, CatalogueRecord>),
}

impl From<AnyCatalogueFile> for CatalogueFile {
    fn from(file: AnyCatalogueFile) -> Self {
        match file {
            AnyCatalogueFile::Versioned(f) => f,
            AnyCatalogueFile::Legacy(songs) => CatalogueFile {
                layout: FeatureLayout::v1(),
                songs,
            },
        }
    }
}

// =============================================================================
// Catalogue
// =============================================================================

/// A catalogue song: identity, offline cluster label and fused vector
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub song_id: SongId,
    pub cluster: ClusterLabel,
    pub features: Vec<f32>,
}

/// Resolves song ids to metadata for the ranker
pub trait MetadataLookup {
    fn metadata(&self, song_id: &str) -> Option<&SongMetadata>;
}

impl MetadataLookup for HashMap<SongId, SongMetadata> {
    fn metadata(&self, song_id: &str) -> Option<&SongMetadata> {
        self.get(song_id)
    }
}

impl MetadataLookup for BTreeMap<SongId, SongMetadata> {
    fn metadata(&self, song_id: &str) -> Option<&SongMetadata> {
        self.get(song_id)
    }
}

/// Immutable set of catalogue songs, iterated in ascending `song_id` order
#[derive(Debug, Clone)]
pub struct Catalogue {
    layout: FeatureLayout,
    songs: Vec<Song>,
    positions: HashMap<SongId, usize>,
    metadata: HashMap<SongId, SongMetadata>,
}

impl Catalogue {
    /// Build a catalogue, validating every vector against `layout`
    pub fn new(
        layout: FeatureLayout,
        mut songs: Vec<Song>,
        metadata: impl IntoIterator<Item = SongMetadata>,
    ) -> Result<Self> {
        songs.sort_by(|a, b| a.song_id.cmp(&b.song_id));

        let mut positions = HashMap::with_capacity(songs.len());
        for (idx, song) in songs.iter().enumerate() {
            layout.check_vector(&song.features, &format!("catalogue song '{}'", song.song_id))?;
            if positions.insert(song.song_id.clone(), idx).is_some() {
                return Err(SoundalikeError::SchemaError(format!(
                    "duplicate song_id '{}' in catalogue",
                    song.song_id
                )));
            }
        }

        let mut by_id = HashMap::new();
        for meta in metadata {
            if meta.song_id.is_empty() {
                return Err(SoundalikeError::SchemaError(
                    "metadata record with empty song_id".to_string(),
                ));
            }
            if by_id.contains_key(&meta.song_id) {
                warn!("Duplicate metadata for song {}, keeping first", meta.song_id);
                continue;
            }
            by_id.insert(meta.song_id.clone(), meta);
        }

        let without_meta = songs
            .iter()
            .filter(|s| !by_id.contains_key(&s.song_id))
            .count();
        if without_meta > 0 {
            debug!("{} catalogue songs have no metadata", without_meta);
        }

        Ok(Self {
            layout,
            songs,
            positions,
            metadata: by_id,
        })
    }

    /// Load from `features_reduced.json` and `metadata.json`
    pub fn load(features_path: &Path, metadata_path: &Path) -> Result<Self> {
        let file = read_feature_file(features_path)?;
        let songs = file
            .songs
            .into_iter()
            .map(|(song_id, record)| Song {
                song_id,
                cluster: record.cluster.unwrap_or(NOISE_LABEL),
                features: record.features,
            })
            .collect();
        let metadata = read_metadata_file(metadata_path)?;

        let catalogue = Self::new(file.layout, songs, metadata)?;
        info!(
            "Loaded catalogue: {} songs, {} with metadata (layout v{})",
            catalogue.len(),
            catalogue.metadata.len(),
            catalogue.layout.version
        );
        Ok(catalogue)
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Songs in ascending `song_id` order
    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn get(&self, song_id: &str) -> Option<&Song> {
        self.positions.get(song_id).map(|&i| &self.songs[i])
    }
}

impl MetadataLookup for Catalogue {
    fn metadata(&self, song_id: &str) -> Option<&SongMetadata> {
        self.metadata.get(song_id)
    }
}

/// Parse `features_reduced.json` in either the versioned or the legacy shape
pub fn read_feature_file(path: &Path) -> Result<CatalogueFile> {
    let bytes = std::fs::read(path).with_artifact_context(path)?;
    let file: AnyCatalogueFile = serde_json::from_slice(&bytes).with_artifact_context(path)?;
    if matches!(file, AnyCatalogueFile::Legacy(_)) {
        debug!("{} has no layout header, assuming v1", path.display());
    }
    Ok(file.into())
}

/// Parse `metadata.json` (keyed by source filename) into records
///
/// Records are visited in filename order so duplicate handling is stable.
pub fn read_metadata_file(path: &Path) -> Result<Vec<SongMetadata>> {
    let bytes = std::fs::read(path).with_artifact_context(path)?;
    let raw: BTreeMap<String, Value> = serde_json::from_slice(&bytes).with_artifact_context(path)?;

    raw.into_iter()
        .map(|(filename, value)| {
            serde_json::from_value::<SongMetadata>(value).map_err(|e| {
                SoundalikeError::SchemaError(format!(
                    "metadata record '{}' in {}: {}",
                    filename,
                    path.display(),
                    e
                ))
            })
        })
        .collect()
}
