//! Cluster index
//!
//! Nearest-centroid assignment over the precomputed clusters, plus the
//! label → member mapping used to pull cluster candidates.

use super::catalogue::Catalogue;
use super::distance::euclidean;
use crate::error::{ErrorContext, Result, SoundalikeError};
use crate::fusion::FeatureLayout;
use crate::types::{ClusterLabel, SongId, NOISE_LABEL};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Distances closer than this are treated as ties; the lower label wins
pub const TIE_TOLERANCE: f64 = 1e-6;

static NO_MEMBERS: BTreeSet<SongId> = BTreeSet::new();

/// `clusters.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClustersFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<FeatureLayout>,
    /// Centroids keyed by the label rendered as a string
    pub centroids: BTreeMap<String, Vec<f32>>,
}

impl ClustersFile {
    pub fn new(layout: FeatureLayout, centroids: &BTreeMap<ClusterLabel, Vec<f32>>) -> Self {
        Self {
            layout: Some(layout),
            centroids: centroids
                .iter()
                .map(|(label, c)| (label.to_string(), c.clone()))
                .collect(),
        }
    }

    /// Parse the string keys back into labels
    pub fn labelled_centroids(&self) -> Result<BTreeMap<ClusterLabel, Vec<f32>>> {
        self.centroids
            .iter()
            .map(|(key, centroid)| {
                let label = key.trim().parse::<ClusterLabel>().map_err(|_| {
                    SoundalikeError::SchemaError(format!("cluster label '{}' is not an integer", key))
                })?;
                Ok((label, centroid.clone()))
            })
            .collect()
    }
}

/// One cluster: centroid plus member song ids
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub label: ClusterLabel,
    pub centroid: Vec<f32>,
    pub members: BTreeSet<SongId>,
}

/// Immutable nearest-centroid index
#[derive(Debug, Clone, Default)]
pub struct ClusterIndex {
    clusters: BTreeMap<ClusterLabel, Cluster>,
}

impl ClusterIndex {
    /// Build from centroids and the catalogue's offline labels
    ///
    /// A centroid under the noise label is ignored. Songs whose label has no
    /// centroid are left out of every cluster and only reachable through the
    /// similarity fallback.
    pub fn new(centroids: BTreeMap<ClusterLabel, Vec<f32>>, catalogue: &Catalogue) -> Result<Self> {
        let dim = catalogue.layout().total_len();
        let mut clusters = BTreeMap::new();

        for (label, centroid) in centroids {
            if label == NOISE_LABEL {
                warn!("Ignoring centroid for noise label {}", NOISE_LABEL);
                continue;
            }
            catalogue
                .layout()
                .check_vector(&centroid, &format!("centroid for cluster {}", label))?;
            clusters.insert(
                label,
                Cluster {
                    label,
                    centroid,
                    members: BTreeSet::new(),
                },
            );
        }

        let mut orphans = 0usize;
        for song in catalogue.songs() {
            match clusters.get_mut(&song.cluster) {
                Some(cluster) => {
                    cluster.members.insert(song.song_id.clone());
                }
                None if song.cluster == NOISE_LABEL => {}
                None => orphans += 1,
            }
        }
        if orphans > 0 {
            warn!(
                "{} catalogue songs carry a cluster label with no centroid",
                orphans
            );
        }

        debug!("Cluster index: {} clusters over {} dims", clusters.len(), dim);
        Ok(Self { clusters })
    }

    /// Load `clusters.json` and attach catalogue members
    pub fn load(path: &Path, catalogue: &Catalogue) -> Result<Self> {
        let bytes = std::fs::read(path).with_artifact_context(path)?;
        let file: ClustersFile = serde_json::from_slice(&bytes).with_artifact_context(path)?;
        if let Some(layout) = &file.layout {
            catalogue
                .layout()
                .ensure_compatible(layout, &path.display().to_string())?;
        }
        let index = Self::new(file.labelled_centroids()?, catalogue)?;
        info!(
            "Loaded {} clusters from {}",
            index.len(),
            path.display()
        );
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.values()
    }

    /// Label of the nearest centroid, or the noise label when there are none
    ///
    /// Labels are visited in ascending order and a later label only wins when
    /// it is closer by more than [`TIE_TOLERANCE`].
    pub fn assign(&self, vector: &[f32]) -> Result<ClusterLabel> {
        let mut best: Option<(ClusterLabel, f64)> = None;

        for cluster in self.clusters.values() {
            if cluster.centroid.len() != vector.len() {
                return Err(SoundalikeError::length_mismatch(
                    "query vector",
                    cluster.centroid.len(),
                    vector.len(),
                ));
            }
            let dist = euclidean(vector, &cluster.centroid);
            match best {
                Some((_, best_dist)) if dist + TIE_TOLERANCE >= best_dist => {}
                _ => best = Some((cluster.label, dist)),
            }
        }

        Ok(best.map(|(label, _)| label).unwrap_or(NOISE_LABEL))
    }

    /// Members of `label`; empty for unknown and noise labels
    pub fn lookup_members(&self, label: ClusterLabel) -> &BTreeSet<SongId> {
        self.clusters
            .get(&label)
            .map(|c| &c.members)
            .unwrap_or(&NO_MEMBERS)
    }
}

/// Mean vector of every non-noise label's members
pub fn compute_centroids<'a>(
    labelled: impl IntoIterator<Item = (ClusterLabel, &'a [f32])>,
) -> BTreeMap<ClusterLabel, Vec<f32>> {
    let mut sums: BTreeMap<ClusterLabel, (Vec<f64>, usize)> = BTreeMap::new();
    for (label, vector) in labelled {
        if label == NOISE_LABEL {
            continue;
        }
        let (sum, count) = sums
            .entry(label)
            .or_insert_with(|| (vec![0.0; vector.len()], 0));
        for (s, v) in sum.iter_mut().zip(vector) {
            *s += *v as f64;
        }
        *count += 1;
    }

    sums.into_iter()
        .map(|(label, (sum, count))| {
            let n = count as f64;
            (label, sum.into_iter().map(|s| (s / n) as f32).collect())
        })
        .collect()
}
