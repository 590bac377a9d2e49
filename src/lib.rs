//! soundalike - Content-based music recommendation
//!
//! Turns a query track into a fused feature vector (spectral statistics,
//! a reduced semantic embedding, a top-class confidence and the duration),
//! assigns it to the nearest precomputed catalogue cluster and returns
//! similar catalogue songs. Empty clusters fall back to brute-force
//! similarity search.
//!
//! # Architecture
//!
//! - `config`: CLI argument parsing and runtime settings
//! - `discovery`: Query file scanning
//! - `audio`: Audio decoding and resampling using symphonia and rubato
//! - `analysis`: Spectral and embedding extractors (with swappable backends)
//! - `fusion`: Versioned feature layout, embedding reducer (and its PCA fit) and vector assembly
//! - `index`: Catalogue, cluster index and similarity fallback
//! - `recommend`: Online pipeline and ranking
//! - `pipeline`: Batch orchestration and the offline catalogue builder
//! - `export`: JSON output
//!
//! # Example
//!
//! ```no_run
//! use soundalike::{config::Settings, pipeline};
//!
//! let settings = Settings::default();
//! let result = pipeline::run(&settings).expect("Recommendation failed");
//! println!("Processed {} files", result.successful);
//! ```

pub mod analysis;
pub mod audio;
pub mod config;
pub mod discovery;
pub mod error;
pub mod export;
pub mod fusion;
pub mod index;
pub mod pipeline;
pub mod recommend;
pub mod types;

// Re-export key types at crate root
pub use error::{Result, SoundalikeError};
pub use recommend::{RecommendationIndex, Recommender, RecommenderOptions};
pub use types::{
    AudioBuffer, RecommendationEntry, RecommendationMethod, RecommendationResponse,
    Recommendations, SongMetadata,
};
