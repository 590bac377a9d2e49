//! JSON export for recommendation results and catalogue artifacts

use crate::error::{Result, SoundalikeError};
use crate::types::RecommendationResponse;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Predictions output schema version
const SCHEMA_VERSION: &str = "1.0";

/// Top-level batch output structure
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionsJson {
    /// Schema version for forward compatibility
    pub version: String,
    pub metadata: ExportMetadata,
    /// Result or `{error}` per query file name
    pub predictions: BTreeMap<String, RecommendationResponse>,
}

/// Export metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// soundalike version that generated this file
    pub generator_version: String,
    /// Timestamp of export
    pub exported_at: String,
    pub file_count: usize,
    pub failed_count: usize,
}

/// Write batch predictions
pub fn write_predictions(
    predictions: &BTreeMap<String, RecommendationResponse>,
    output_path: &Path,
) -> Result<()> {
    let failed_count = predictions.values().filter(|r| !r.is_ok()).count();
    let output = PredictionsJson {
        version: SCHEMA_VERSION.to_string(),
        metadata: ExportMetadata {
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            file_count: predictions.len(),
            failed_count,
        },
        predictions: predictions.clone(),
    };

    write_json_atomic(&output, output_path)?;
    info!(
        "Wrote {} predictions ({} failed) to {}",
        predictions.len(),
        failed_count,
        output_path.display()
    );
    Ok(())
}

/// Serialize `value` as pretty JSON to `output_path`
///
/// Uses atomic write pattern: writes to a temp file first, then renames.
/// The target is never left half-written.
pub fn write_json_atomic<T: Serialize + ?Sized>(value: &T, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SoundalikeError::output_error(parent, e))?;
    }

    // same directory, so the rename stays on one filesystem
    let temp_path = output_path.with_extension("json.tmp");

    let file = File::create(&temp_path).map_err(|e| SoundalikeError::OutputError {
        path: output_path.to_path_buf(),
        reason: format!("Failed to create temp file: {}", e),
    })?;
    let mut writer = BufWriter::new(file);

    let written = serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| e.to_string())
        .and_then(|_| writer.flush().map_err(|e| e.to_string()));
    if let Err(reason) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(SoundalikeError::OutputError {
            path: output_path.to_path_buf(),
            reason,
        });
    }
    drop(writer);

    std::fs::rename(&temp_path, output_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        SoundalikeError::OutputError {
            path: output_path.to_path_buf(),
            reason: format!("Failed to finalize file: {}", e),
        }
    })?;

    debug!("Wrote {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorPayload, RecommendationMethod, Recommendations};

    #[test]
    fn test_predictions_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("predictions.json");

        let mut predictions = BTreeMap::new();
        predictions.insert(
            "ok.wav".to_string(),
            RecommendationResponse::Ok(Recommendations {
                cluster_id: 2,
                total_candidates: 0,
                method: RecommendationMethod::Cluster,
                recommendations: vec![],
            }),
        );
        predictions.insert(
            "bad.mp3".to_string(),
            RecommendationResponse::Err(ErrorPayload {
                error: "Failed to decode".to_string(),
            }),
        );

        write_predictions(&predictions, &path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["metadata"]["file_count"], 2);
        assert_eq!(json["metadata"]["failed_count"], 1);
        assert_eq!(json["predictions"]["ok.wav"]["method"], "cluster");
        assert_eq!(json["predictions"]["bad.mp3"]["error"], "Failed to decode");
    }

    #[test]
    fn test_unwritable_target_is_output_error() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be replaced by the rename
        let target = dir.path().join("taken.json");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), b"x").unwrap();

        let err = write_json_atomic(&serde_json::json!({"a": 1}), &target).unwrap_err();
        assert!(matches!(err, SoundalikeError::OutputError { .. }));
        assert!(!target.with_extension("json.tmp").exists());
    }
}
