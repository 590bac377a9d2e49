//! Batch recommendation and offline catalogue building

pub mod builder;
pub mod orchestrator;

pub use builder::{build_catalogue, build_with_reducer, BuildReport};
pub use orchestrator::{run, run_with, PipelineResult};
