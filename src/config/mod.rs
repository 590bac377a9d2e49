//! Configuration and CLI handling

pub mod cli;
pub mod settings;

pub use cli::{BuildArgs, Cli, Command, RecommendArgs};
pub use settings::{ArtifactPaths, BuildSettings, Settings, DEFAULT_PREDICTIONS_FILE};
