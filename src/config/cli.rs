//! CLI argument parsing and configuration

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// soundalike - Content-based song recommendations from audio
///
/// Extracts spectral and semantic features from a query track, assigns it to
/// the nearest catalogue cluster and returns similar catalogue songs.
#[derive(Parser, Debug)]
#[command(name = "soundalike")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress progress bars and informational logs)
    #[arg(short, long, default_value = "false", global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recommend catalogue songs for an audio file or a directory of files
    Recommend(RecommendArgs),

    /// Build the fused catalogue and cluster centroids from combined features
    BuildCatalogue(BuildArgs),
}

#[derive(Args, Debug)]
pub struct RecommendArgs {
    /// Query audio file, or a directory for batch mode
    #[arg(short, long, value_name = "PATH")]
    pub input: PathBuf,

    /// Write results to this JSON file (batch default: predictions.json)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Directory holding the catalogue artifacts
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Cluster centroids (defaults to <data-dir>/clusters.json)
    #[arg(long, value_name = "FILE")]
    pub clusters: Option<PathBuf>,

    /// Fused catalogue vectors (defaults to <data-dir>/features_reduced.json)
    #[arg(long, value_name = "FILE")]
    pub features: Option<PathBuf>,

    /// Catalogue metadata (defaults to <data-dir>/metadata.json)
    #[arg(long, value_name = "FILE")]
    pub metadata: Option<PathBuf>,

    /// Embedding reducer artifact (defaults to <data-dir>/models/embedding_reducer.json)
    #[arg(long, value_name = "FILE")]
    pub reducer: Option<PathBuf>,

    /// Embedding ONNX model (falls back to SOUNDALIKE_EMBEDDING_MODEL and standard locations)
    #[arg(long, value_name = "FILE")]
    pub embedding_model: Option<PathBuf>,

    /// Maximum recommendations per query
    #[arg(long, value_name = "N", default_value_t = crate::recommend::DEFAULT_LIMIT)]
    pub limit: usize,

    /// Neighbours considered when the assigned cluster is empty
    #[arg(long, value_name = "N", default_value_t = crate::index::DEFAULT_FALLBACK_K)]
    pub fallback_k: usize,

    /// Number of worker threads (defaults to CPU count - 1)
    #[arg(short = 'j', long, value_name = "N")]
    pub threads: Option<usize>,

    /// Scan subdirectories recursively
    #[arg(short, long, default_value = "false")]
    pub recursive: bool,
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Combined per-song features (features_combined.json)
    #[arg(long, value_name = "FILE")]
    pub combined: PathBuf,

    /// Embedding reducer artifact; fitted and written here when missing
    #[arg(long, value_name = "FILE")]
    pub reducer: PathBuf,

    /// Refit the reducer from the combined embeddings even if the artifact exists
    #[arg(long, default_value = "false")]
    pub fit_reducer: bool,

    /// Output directory for features_reduced.json and clusters.json
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Skip writing clusters.json
    #[arg(long, default_value = "false")]
    pub no_clusters: bool,
}

impl Cli {
    /// Get the log level based on verbosity flags
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}
