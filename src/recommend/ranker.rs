//! Recommendation ranking
//!
//! Joins candidate ids with catalogue metadata, drops repeats of the same
//! canonical URL and caps the list.

use crate::index::MetadataLookup;
use crate::types::{ClusterLabel, RecommendationEntry, RecommendationMethod, Recommendations};
use std::collections::HashSet;
use tracing::debug;

/// Default number of recommendations returned
pub const DEFAULT_LIMIT: usize = 10;

/// Stateless ranker with a fixed output limit
#[derive(Debug, Clone, Copy)]
pub struct Ranker {
    limit: usize,
}

impl Default for Ranker {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

impl Ranker {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Rank `candidates` in their given order
    ///
    /// Candidates without metadata are skipped. A candidate whose canonical
    /// URL was already emitted is skipped; candidates without a URL never are.
    /// `total_candidates` is the pool size before any skipping or truncation.
    pub fn rank<'a, I, M>(
        &self,
        cluster_id: ClusterLabel,
        method: RecommendationMethod,
        candidates: I,
        lookup: &M,
    ) -> Recommendations
    where
        I: IntoIterator<Item = &'a str>,
        M: MetadataLookup + ?Sized,
    {
        let mut total_candidates = 0usize;
        let mut seen_urls: HashSet<&str> = HashSet::new();
        let mut recommendations = Vec::with_capacity(self.limit);
        let mut missing = 0usize;
        let mut duplicates = 0usize;

        for song_id in candidates {
            total_candidates += 1;
            if recommendations.len() >= self.limit {
                continue;
            }

            let Some(meta) = lookup.metadata(song_id) else {
                missing += 1;
                continue;
            };

            if let Some(url) = meta.canonical_url.as_deref() {
                if !seen_urls.insert(url) {
                    duplicates += 1;
                    continue;
                }
            }

            recommendations.push(RecommendationEntry::from(meta));
        }

        if missing > 0 || duplicates > 0 {
            debug!(
                "Ranker skipped {} candidates without metadata and {} duplicate URLs",
                missing, duplicates
            );
        }

        Recommendations {
            cluster_id,
            total_candidates,
            method,
            recommendations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SongId, SongMetadata};
    use std::collections::HashMap;

    fn lookup(entries: &[(&str, Option<&str>)]) -> HashMap<SongId, SongMetadata> {
        entries
            .iter()
            .map(|(id, url)| {
                (
                    id.to_string(),
                    SongMetadata {
                        song_id: id.to_string(),
                        title: format!("Song {}", id),
                        canonical_url: url.map(str::to_string),
                        ..Default::default()
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_dedup_by_url_keeps_first_seen() {
        let meta = lookup(&[
            ("a", Some("https://x/y")),
            ("b", Some("https://x/y")),
            ("c", None),
            ("d", None),
        ]);
        let recs = Ranker::default().rank(
            -1,
            RecommendationMethod::Similarity,
            ["b", "a", "c", "d"],
            &meta,
        );
        let ids: Vec<_> = recs.recommendations.iter().map(|r| r.song_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "d"]);
        assert_eq!(recs.total_candidates, 4);
    }

    #[test]
    fn test_limit_does_not_change_total() {
        let ids: Vec<String> = (0..25).map(|i| format!("s{:02}", i)).collect();
        let entries: Vec<(&str, Option<&str>)> = ids.iter().map(|s| (s.as_str(), None)).collect();
        let meta = lookup(&entries);

        let recs = Ranker::new(10).rank(3, RecommendationMethod::Cluster, ids.iter().map(|s| s.as_str()), &meta);
        assert_eq!(recs.recommendations.len(), 10);
        assert_eq!(recs.total_candidates, 25);
        assert_eq!(recs.recommendations[0].song_id, "s00");
        assert_eq!(recs.cluster_id, 3);
        assert_eq!(recs.method, RecommendationMethod::Cluster);
    }

    #[test]
    fn test_missing_metadata_is_skipped() {
        let meta = lookup(&[("a", None)]);
        let recs = Ranker::default().rank(1, RecommendationMethod::Cluster, ["ghost", "a"], &meta);
        assert_eq!(recs.recommendations.len(), 1);
        assert_eq!(recs.recommendations[0].song_id, "a");
        assert_eq!(recs.total_candidates, 2);
    }

    #[test]
    fn test_zero_limit() {
        let meta = lookup(&[("a", None)]);
        let recs = Ranker::new(0).rank(1, RecommendationMethod::Cluster, ["a"], &meta);
        assert!(recs.recommendations.is_empty());
        assert_eq!(recs.total_candidates, 1);
    }
}
