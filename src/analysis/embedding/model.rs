//! Embedding model discovery
//!
//! Model resolution checks multiple common locations automatically.

use crate::error::{Result, SoundalikeError};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the embedding model location
pub const EMBEDDING_MODEL_ENV: &str = "SOUNDALIKE_EMBEDDING_MODEL";

/// Default model filename
pub const EMBEDDING_MODEL_FILENAME: &str = "yamnet.onnx";

/// Raw embedding width of the default model
pub const EMBEDDING_DIM: usize = 1024;

/// Semantic class count of the default model
pub const NUM_CLASSES: usize = 521;

/// Check for a user-provided model path via environment variable
pub fn get_user_model_path() -> Option<PathBuf> {
    std::env::var_os(EMBEDDING_MODEL_ENV).map(PathBuf::from)
}

/// Every location searched for the model, in priority order
///
/// 1. `explicit` (the `--embedding-model` flag)
/// 2. `SOUNDALIKE_EMBEDDING_MODEL`
/// 3. ProjectDirs cache: `~/.cache/soundalike/models/` (Linux)
/// 4. ProjectDirs data: `~/.local/share/soundalike/models/` (Linux)
/// 5. `./models/yamnet.onnx`
/// 6. `~/soundalike/models/yamnet.onnx`
pub fn candidate_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = explicit {
        paths.push(p.to_path_buf());
    }
    if let Some(p) = get_user_model_path() {
        paths.push(p);
    }
    if let Some(dirs) = ProjectDirs::from("com", "soundalike", "soundalike") {
        paths.push(dirs.cache_dir().join("models").join(EMBEDDING_MODEL_FILENAME));
        paths.push(dirs.data_dir().join("models").join(EMBEDDING_MODEL_FILENAME));
    }
    paths.push(PathBuf::from("./models").join(EMBEDDING_MODEL_FILENAME));
    if let Some(base) = directories::BaseDirs::new() {
        paths.push(
            base.home_dir()
                .join("soundalike")
                .join("models")
                .join(EMBEDDING_MODEL_FILENAME),
        );
    }
    paths
}

/// Find the model file, or report every location checked
pub fn find_model_path(explicit: Option<&Path>) -> Result<PathBuf> {
    let candidates = candidate_paths(explicit);
    if let Some(found) = candidates.iter().find(|p| p.is_file()) {
        return Ok(found.canonicalize().unwrap_or_else(|_| found.clone()));
    }

    let checked = candidates
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");
    Err(SoundalikeError::model_not_loaded(
        "embedding model",
        format!(
            "{} not found.\n\n\
             Locations checked:\n{}\n\n\
             To fix this, either:\n\
             1. Pass --embedding-model /path/to/{}\n\
             2. Or set the environment variable:\n\
                export {}=/path/to/{}",
            EMBEDDING_MODEL_FILENAME,
            checked,
            EMBEDDING_MODEL_FILENAME,
            EMBEDDING_MODEL_ENV,
            EMBEDDING_MODEL_FILENAME
        ),
    ))
}
