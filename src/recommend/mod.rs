//! Online recommendation: cluster lookup, similarity fallback and ranking

pub mod engine;
pub mod ranker;

pub use engine::{PipelineStage, RecommendationIndex, Recommender, RecommenderOptions};
pub use ranker::{Ranker, DEFAULT_LIMIT};
