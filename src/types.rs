//! Core data types for soundalike
//!
//! These types represent the domain model and flow through the pipeline.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque, stable catalogue identifier
pub type SongId = String;

/// Cluster label assigned by the offline clustering job
pub type ClusterLabel = i32;

/// Label reserved for noise / unassigned songs. Never has members.
pub const NOISE_LABEL: ClusterLabel = -1;

// =============================================================================
// Catalogue metadata
// =============================================================================

/// Descriptive metadata for one catalogue song
///
/// Field names follow `metadata.json`. `year` and `duration` arrive as
/// numbers, numeric strings or null depending on the upstream source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SongMetadata {
    pub song_id: SongId,
    #[serde(default, deserialize_with = "de_string_or_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub album: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub artists: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub language: Option<String>,
    /// Duration in seconds
    #[serde(default, deserialize_with = "de_opt_seconds")]
    pub duration: Option<f64>,
    /// De-duplication key; empty strings are treated as absent
    #[serde(default, alias = "perma_url", deserialize_with = "de_opt_text")]
    pub canonical_url: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub image_url: Option<String>,
}

fn de_string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_opt_text(deserializer)?.unwrap_or_default())
}

/// Accepts a string, a number or null. Empty strings become `None`.
fn de_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// Accepts a number, a numeric string or null.
fn de_opt_seconds<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid duration '{}'", s))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected duration in seconds, got {}",
            other
        ))),
    }
}

// =============================================================================
// Recommendation output
// =============================================================================

/// Which path produced the candidate pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationMethod {
    /// Members of the assigned, non-empty cluster
    Cluster,
    /// Brute-force similarity fallback
    Similarity,
}

impl RecommendationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationMethod::Cluster => "cluster",
            RecommendationMethod::Similarity => "similarity",
        }
    }
}

impl std::fmt::Display for RecommendationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recommended song, joined with its catalogue metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationEntry {
    pub song_id: SongId,
    pub title: String,
    pub album: Option<String>,
    pub year: Option<String>,
    pub language: Option<String>,
    pub duration: Option<f64>,
    pub canonical_url: Option<String>,
    pub image_url: Option<String>,
}

impl From<&SongMetadata> for RecommendationEntry {
    fn from(meta: &SongMetadata) -> Self {
        Self {
            song_id: meta.song_id.clone(),
            title: meta.title.clone(),
            album: meta.album.clone(),
            year: meta.year.clone(),
            language: meta.language.clone(),
            duration: meta.duration,
            canonical_url: meta.canonical_url.clone(),
            image_url: meta.image_url.clone(),
        }
    }
}

/// Successful result of one recommendation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub cluster_id: ClusterLabel,
    /// Size of the candidate pool before de-duplication and truncation
    pub total_candidates: usize,
    pub method: RecommendationMethod,
    pub recommendations: Vec<RecommendationEntry>,
}

/// Structured failure payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

/// What a collaborator (CLI, HTTP layer) receives for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecommendationResponse {
    Ok(Recommendations),
    Err(ErrorPayload),
}

impl RecommendationResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, RecommendationResponse::Ok(_))
    }
}

impl From<crate::error::Result<Recommendations>> for RecommendationResponse {
    fn from(result: crate::error::Result<Recommendations>) -> Self {
        match result {
            Ok(recs) => RecommendationResponse::Ok(recs),
            Err(e) => RecommendationResponse::Err(ErrorPayload {
                error: e.to_string(),
            }),
        }
    }
}

// =============================================================================
// Audio buffer types
// =============================================================================

/// Decoded audio samples ready for feature extraction
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Mono samples normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Duration in seconds
    pub duration: f64,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        // zero rate means unknown duration
        let duration = if sample_rate > 0 {
            samples.len() as f64 / sample_rate as f64
        } else {
            0.0
        };
        Self {
            samples,
            sample_rate,
            duration,
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// =============================================================================
// Supported formats
// =============================================================================

/// Audio formats accepted as query input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
    Flac,
    Ogg,
    M4a,
}

impl AudioFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "ogg" | "oga" => Some(AudioFormat::Ogg),
            "m4a" | "mp4" | "aac" => Some(AudioFormat::M4a),
            _ => None,
        }
    }

    /// Check if a path has a supported extension
    pub fn is_supported_path(path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .is_some()
    }
}
