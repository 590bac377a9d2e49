//! Runtime configuration settings

use super::cli::{BuildArgs, RecommendArgs};
use std::path::{Path, PathBuf};

/// Default batch output file
pub const DEFAULT_PREDICTIONS_FILE: &str = "predictions.json";

/// Locations of the artifacts the recommender loads at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub clusters: PathBuf,
    pub features: PathBuf,
    pub metadata: PathBuf,
    pub reducer: PathBuf,
}

impl ArtifactPaths {
    /// Standard file names under `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            clusters: dir.join("clusters.json"),
            features: dir.join("features_reduced.json"),
            metadata: dir.join("metadata.json"),
            reducer: dir.join("models").join("embedding_reducer.json"),
        }
    }
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::in_dir(Path::new("."))
    }
}

/// Runtime settings for the recommend command
#[derive(Debug, Clone)]
pub struct Settings {
    /// Query file or directory
    pub input: PathBuf,
    /// Explicit output file
    pub output: Option<PathBuf>,
    pub artifacts: ArtifactPaths,
    /// Explicit embedding model path
    pub embedding_model: Option<PathBuf>,
    /// Recommendations per query
    pub limit: usize,
    /// Neighbours for the similarity fallback
    pub fallback_k: usize,
    /// Number of worker threads for batch mode
    pub threads: usize,
    /// Scan recursively
    pub recursive: bool,
    /// Show progress bars
    pub show_progress: bool,
}

impl Settings {
    /// Create settings from CLI arguments
    pub fn from_cli(args: &RecommendArgs, quiet: bool) -> Self {
        let defaults = ArtifactPaths::in_dir(&args.data_dir);
        let artifacts = ArtifactPaths {
            clusters: args.clusters.clone().unwrap_or(defaults.clusters),
            features: args.features.clone().unwrap_or(defaults.features),
            metadata: args.metadata.clone().unwrap_or(defaults.metadata),
            reducer: args.reducer.clone().unwrap_or(defaults.reducer),
        };

        Self {
            input: args.input.clone(),
            output: args.output.clone(),
            artifacts,
            embedding_model: args.embedding_model.clone(),
            limit: args.limit,
            fallback_k: args.fallback_k,
            threads: args.threads.unwrap_or_else(default_threads),
            recursive: args.recursive,
            show_progress: !quiet,
        }
    }

    /// Where batch results go
    pub fn batch_output(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PREDICTIONS_FILE))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input: PathBuf::from("."),
            output: None,
            artifacts: ArtifactPaths::default(),
            embedding_model: None,
            limit: crate::recommend::DEFAULT_LIMIT,
            fallback_k: crate::index::DEFAULT_FALLBACK_K,
            threads: default_threads(),
            recursive: false,
            show_progress: true,
        }
    }
}

/// Runtime settings for the build-catalogue command
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// features_combined.json
    pub combined: PathBuf,
    /// Reducer artifact, read or written when fitting
    pub reducer: PathBuf,
    pub output_dir: PathBuf,
    pub write_clusters: bool,
    /// Fit the reducer even when the artifact exists
    pub fit_reducer: bool,
}

impl BuildSettings {
    pub fn from_cli(args: &BuildArgs) -> Self {
        Self {
            combined: args.combined.clone(),
            reducer: args.reducer.clone(),
            output_dir: args.output.clone(),
            write_clusters: !args.no_clusters,
            fit_reducer: args.fit_reducer,
        }
    }

    pub fn features_path(&self) -> PathBuf {
        self.output_dir.join("features_reduced.json")
    }

    pub fn clusters_path(&self) -> PathBuf {
        self.output_dir.join("clusters.json")
    }
}

/// CPU count minus one for the main thread, at least one
fn default_threads() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}
