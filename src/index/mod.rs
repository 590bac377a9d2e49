//! Catalogue, cluster index and similarity fallback

pub mod catalogue;
pub mod cluster;
pub mod distance;
pub mod similarity;

pub use catalogue::{Catalogue, CatalogueFile, CatalogueRecord, MetadataLookup, Song};
pub use cluster::{compute_centroids, Cluster, ClusterIndex, ClustersFile};
pub use similarity::{BruteForceSearch, NeighborSearch, SimilarityHit, DEFAULT_FALLBACK_K};
