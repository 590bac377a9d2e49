//! Unified error types for soundalike
//!
//! Error strategy:
//! - Request errors (decode, extraction, schema): fatal for one recommendation
//!   request, reported as an `{error}` payload, the process keeps serving
//! - Startup errors (model not loaded, unreadable artifacts, bad config): the
//!   process must refuse to serve at all
//!
//! All errors include actionable suggestions where possible.

use std::path::PathBuf;
use thiserror::Error;

/// Supported audio formats for helpful error messages
pub const SUPPORTED_FORMATS: &str = "MP3, WAV, FLAC, OGG, M4A";

/// Top-level error type for soundalike operations
#[derive(Debug, Error)]
pub enum SoundalikeError {
    // =========================================================================
    // Request errors - fail this request, keep serving
    // =========================================================================
    #[error("Failed to decode audio file '{path}': {reason}\n  Supported formats: {SUPPORTED_FORMATS}\n  Tip: If the file plays in other apps, it may be corrupted or use an unsupported codec")]
    DecodeError { path: PathBuf, reason: String },

    #[error("Unsupported audio format for '{path}': {format}\n  Supported formats: {SUPPORTED_FORMATS}")]
    UnsupportedFormat { path: PathBuf, format: String },

    #[error("File not found: '{0}'\n  Tip: Check the path exists and is accessible")]
    FileNotFound(PathBuf),

    #[error("Feature extraction failed in {extractor}: {reason}")]
    ExtractionError { extractor: String, reason: String },

    #[error("Feature schema mismatch: {0}\n  Tip: The catalogue and the running extractors disagree on the feature layout; rebuild the catalogue with this version")]
    SchemaError(String),

    #[error("Catalogue is empty, no songs available for similarity search")]
    EmptyCatalogue,

    // =========================================================================
    // Startup errors - refuse to serve
    // =========================================================================
    #[error("{model} is not loaded: {reason}")]
    ModelNotLoaded { model: String, reason: String },

    #[error("Cannot load artifact '{path}': {reason}\n  Tip: Run `soundalike build-catalogue` or point --data-dir at a directory containing the catalogue files")]
    ArtifactError { path: PathBuf, reason: String },

    #[error("Cannot write output to '{path}': {reason}\n  Tip: Check write permissions for the output directory")]
    OutputError { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for soundalike operations
pub type Result<T> = std::result::Result<T, SoundalikeError>;

impl SoundalikeError {
    /// Returns true if this error only affects the current request
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            SoundalikeError::DecodeError { .. }
                | SoundalikeError::UnsupportedFormat { .. }
                | SoundalikeError::FileNotFound(_)
                | SoundalikeError::ExtractionError { .. }
                | SoundalikeError::SchemaError(_)
                | SoundalikeError::EmptyCatalogue
        )
    }

    /// Returns true if this error means the process should not serve traffic
    pub fn is_startup_error(&self) -> bool {
        matches!(
            self,
            SoundalikeError::ModelNotLoaded { .. }
                | SoundalikeError::ArtifactError { .. }
                | SoundalikeError::ConfigError(_)
        )
    }

    /// Create a decode error with context about the issue
    pub fn decode_error(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SoundalikeError::DecodeError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an extraction error for the named extractor
    pub fn extraction(extractor: impl Into<String>, reason: impl Into<String>) -> Self {
        SoundalikeError::ExtractionError {
            extractor: extractor.into(),
            reason: reason.into(),
        }
    }

    /// Create a schema error describing a length mismatch
    pub fn length_mismatch(what: impl std::fmt::Display, expected: usize, got: usize) -> Self {
        SoundalikeError::SchemaError(format!(
            "{}: expected {} values, got {}",
            what, expected, got
        ))
    }

    /// Create a model-not-loaded error
    pub fn model_not_loaded(model: impl Into<String>, reason: impl Into<String>) -> Self {
        SoundalikeError::ModelNotLoaded {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// Create an output error, checking for common issues
    pub fn output_error(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        let reason = match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!("Permission denied. Check that you have write access to {}", path.display())
            }
            std::io::ErrorKind::NotFound => {
                format!("Directory does not exist: {}", path.parent().map(|p| p.display().to_string()).unwrap_or_default())
            }
            _ => err.to_string(),
        };
        SoundalikeError::OutputError { path, reason }
    }
}

/// Extension trait for attaching artifact paths to foreign errors
pub trait ErrorContext<T> {
    /// Map the error into an `ArtifactError` for the given file
    fn with_artifact_context(self, path: &std::path::Path) -> Result<T>;
}

impl<T, E: std::fmt::Display> ErrorContext<T> for std::result::Result<T, E> {
    fn with_artifact_context(self, path: &std::path::Path) -> Result<T> {
        self.map_err(|e| SoundalikeError::ArtifactError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
