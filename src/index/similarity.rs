//! Similarity fallback search
//!
//! Used only when the assigned cluster has no members. Scans the whole
//! catalogue; fine while the catalogue fits in memory.

use super::catalogue::Catalogue;
use super::distance::euclidean;
use crate::error::{Result, SoundalikeError};
use crate::types::SongId;
use tracing::trace;

/// Default number of fallback candidates
pub const DEFAULT_FALLBACK_K: usize = 10;

/// One fallback match
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityHit {
    pub song_id: SongId,
    /// `1 / (1 + distance)`, in `(0, 1]`
    pub similarity: f32,
}

/// Map a Euclidean distance into `(0, 1]`
#[inline]
pub fn similarity(distance: f64) -> f32 {
    let score = (1.0 / (1.0 + distance)) as f32;
    // narrowing can underflow to zero
    score.max(f32::MIN_POSITIVE)
}

/// Nearest-neighbour search backend
///
/// Implementations must rank by descending [`similarity`] and break ties by
/// catalogue iteration order.
pub trait NeighborSearch: Send + Sync {
    /// Top `k` catalogue songs for `vector`
    fn search(&self, catalogue: &Catalogue, vector: &[f32], k: usize) -> Result<Vec<SimilarityHit>>;

    /// Get the name of this backend (for logging)
    fn name(&self) -> &'static str;
}

/// Exhaustive O(N) scan
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceSearch;

impl NeighborSearch for BruteForceSearch {
    fn search(&self, catalogue: &Catalogue, vector: &[f32], k: usize) -> Result<Vec<SimilarityHit>> {
        if catalogue.is_empty() {
            return Err(SoundalikeError::EmptyCatalogue);
        }
        let dim = catalogue.layout().total_len();
        if vector.len() != dim {
            return Err(SoundalikeError::length_mismatch("query vector", dim, vector.len()));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SimilarityHit> = catalogue
            .songs()
            .iter()
            .map(|song| SimilarityHit {
                song_id: song.song_id.clone(),
                similarity: similarity(euclidean(vector, &song.features)),
            })
            .collect();

        // stable: equal scores keep catalogue order
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        trace!(
            "Brute-force search over {} songs, best similarity {:?}",
            catalogue.len(),
            hits.first().map(|h| h.similarity)
        );
        Ok(hits)
    }

    fn name(&self) -> &'static str {
        "brute-force"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::FeatureLayout;
    use crate::index::catalogue::Song;
    use crate::types::NOISE_LABEL;

    fn catalogue(points: &[(&str, f32)]) -> Catalogue {
        let layout = FeatureLayout {
            version: 1,
            spectral_len: 1,
            embedding_len: 1,
        };
        let songs = points
            .iter()
            .map(|(id, x)| Song {
                song_id: id.to_string(),
                cluster: NOISE_LABEL,
                features: vec![*x, 0.0, 0.0, 0.0],
            })
            .collect();
        Catalogue::new(layout, songs, Vec::new()).unwrap()
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity(0.0), 1.0);
        assert!(similarity(1e6) > 0.0);
        assert!(similarity(3.0) < similarity(2.0));
        assert!(similarity(f64::MAX) > 0.0);
    }

    #[test]
    fn test_far_apart_vectors_keep_positive_similarity() {
        let layout = FeatureLayout {
            version: 1,
            spectral_len: 1,
            embedding_len: 1,
        };
        let songs = vec![Song {
            song_id: "far".to_string(),
            cluster: NOISE_LABEL,
            features: vec![1e20; 4],
        }];
        let cat = Catalogue::new(layout, songs, Vec::new()).unwrap();
        let hits = BruteForceSearch.search(&cat, &[-1e20; 4], 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].similarity > 0.0 && hits[0].similarity <= 1.0);
    }

    #[test]
    fn test_ranked_descending_and_capped() {
        let cat = catalogue(&[("a", 5.0), ("b", 1.0), ("c", 3.0), ("d", 0.0)]);
        let hits = BruteForceSearch.search(&cat, &[0.0; 4], 3).unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.song_id.as_str()).collect();
        assert_eq!(ids, vec!["d", "b", "c"]);
        assert_eq!(hits[0].similarity, 1.0);
        assert!(hits.iter().all(|h| h.similarity <= 1.0));
    }

    #[test]
    fn test_ties_keep_catalogue_order() {
        let cat = catalogue(&[("z", -2.0), ("m", 2.0), ("a", 2.0)]);
        let hits = BruteForceSearch.search(&cat, &[0.0; 4], 10).unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.song_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "m", "z"]);
    }

    #[test]
    fn test_empty_catalogue() {
        let cat = catalogue(&[]);
        let err = BruteForceSearch.search(&cat, &[0.0; 4], 10).unwrap_err();
        assert!(matches!(err, SoundalikeError::EmptyCatalogue));
    }

    #[test]
    fn test_wrong_dimension() {
        let cat = catalogue(&[("a", 0.0)]);
        assert!(BruteForceSearch.search(&cat, &[0.0; 5], 10).is_err());
    }
}
