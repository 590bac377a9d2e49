//! Feature fusion
//!
//! Turns extractor outputs into the fixed-length vectors that the cluster
//! index and similarity search operate on.

pub mod assembler;
pub mod fit;
pub mod layout;
pub mod reducer;

pub use assembler::{FeatureAssembler, QueryFeatures};
pub use fit::fit_pca;
pub use layout::{FeatureBlock, FeatureLayout, LAYOUT_VERSION};
pub use reducer::{EmbeddingReducer, ReducerArtifact, ReducerModel};
