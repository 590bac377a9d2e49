//! Integration tests for the soundalike pipeline
//!
//! These tests write real artifact files and WAV queries to a scratch
//! directory and drive the recommender end to end. The embedding model is
//! replaced by a small deterministic extractor so no ONNX runtime is needed.

use serde_json::{json, Value};
use soundalike::analysis::{EmbeddingExtractor, EmbeddingFeatures, SpectralFeatureExtractor};
use soundalike::config::{ArtifactPaths, BuildSettings, Settings};
use soundalike::fusion::{EmbeddingReducer, FeatureLayout, ReducerArtifact};
use soundalike::pipeline;
use soundalike::types::NOISE_LABEL;
use soundalike::{
    AudioBuffer, RecommendationIndex, RecommendationMethod, RecommendationResponse, Recommender,
    RecommenderOptions, SoundalikeError,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const RAW_EMBEDDING_DIM: usize = 4;

// =============================================================================
// Fixtures
// =============================================================================

/// Generate a sine wave WAV file for testing
///
/// Creates a mono 16-bit WAV file at the specified path.
fn generate_sine_wav(path: &Path, frequency_hz: f32, duration_secs: f32, sample_rate: u32) {
    use std::f32::consts::PI;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV file");

    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let amplitude = 0.5f32;

    for i in 0..num_samples {
        let t = i as f32 / sample_rate as f32;
        let sample = (2.0 * PI * frequency_hz * t).sin() * amplitude;
        writer
            .write_sample((sample * 32767.0) as i16)
            .expect("Failed to write sample");
    }

    writer.finalize().expect("Failed to finalize WAV");
}

/// Embedding stand-in: RMS in the first slot, zeros elsewhere
struct RmsEmbedding;

impl EmbeddingExtractor for RmsEmbedding {
    fn extract(&self, buffer: &AudioBuffer) -> soundalike::Result<EmbeddingFeatures> {
        let energy: f32 = buffer.samples.iter().map(|s| s * s).sum();
        let rms = (energy / buffer.samples.len().max(1) as f32).sqrt();
        let mut embedding = vec![0.0; RAW_EMBEDDING_DIM];
        embedding[0] = rms;
        Ok(EmbeddingFeatures {
            embedding,
            top_class_score: 0.4,
        })
    }

    fn embedding_dim(&self) -> usize {
        RAW_EMBEDDING_DIM
    }

    fn name(&self) -> &'static str {
        "rms-embedding"
    }
}

/// 4 -> 64 projection repeating the first raw component
fn reducer_artifact() -> ReducerArtifact {
    let layout = FeatureLayout::v1();
    let mut row = vec![0.0; RAW_EMBEDDING_DIM];
    row[0] = 1.0;
    ReducerArtifact {
        input_dim: RAW_EMBEDDING_DIM,
        output_dim: layout.embedding_len,
        mean: vec![0.0; RAW_EMBEDDING_DIM],
        components: vec![row; layout.embedding_len],
        explained_variance: vec![],
        whiten: false,
    }
}

fn loaded_reducer() -> Arc<EmbeddingReducer> {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("embedding_reducer.json");
    fs::write(&path, serde_json::to_string(&reducer_artifact()).unwrap()).unwrap();
    let reducer = EmbeddingReducer::new();
    reducer.load(&path).unwrap();
    Arc::new(reducer)
}

fn total_len() -> usize {
    FeatureLayout::v1().total_len()
}

fn filled(value: f32) -> Vec<f32> {
    vec![value; total_len()]
}

/// Catalogue entry for the artifact writer
struct Entry<'a> {
    id: &'a str,
    cluster: i32,
    fill: f32,
    url: Option<&'a str>,
}

fn entry(id: &str, cluster: i32, fill: f32) -> Entry<'_> {
    Entry {
        id,
        cluster,
        fill,
        url: None,
    }
}

/// Write clusters.json, features_reduced.json and metadata.json into `dir`
fn write_artifacts(dir: &Path, entries: &[Entry], centroids: &[(i32, f32)]) -> ArtifactPaths {
    let paths = ArtifactPaths::in_dir(dir);
    let layout = FeatureLayout::v1();

    let songs: serde_json::Map<String, Value> = entries
        .iter()
        .map(|e| {
            (
                e.id.to_string(),
                json!({"features": filled(e.fill), "cluster": e.cluster}),
            )
        })
        .collect();
    fs::write(
        &paths.features,
        json!({"layout": layout, "songs": songs}).to_string(),
    )
    .unwrap();

    let metadata: serde_json::Map<String, Value> = entries
        .iter()
        .map(|e| {
            (
                format!("{}.mp3", e.id),
                json!({
                    "song_id": e.id,
                    "title": format!("Title {}", e.id),
                    "album": "Album",
                    "year": 2001,
                    "language": "english",
                    "duration": "215",
                    "perma_url": e.url.unwrap_or(""),
                    "image_url": null
                }),
            )
        })
        .collect();
    fs::write(&paths.metadata, Value::Object(metadata).to_string()).unwrap();

    let centroid_map: serde_json::Map<String, Value> = centroids
        .iter()
        .map(|&(label, fill)| (label.to_string(), json!(filled(fill))))
        .collect();
    fs::write(
        &paths.clusters,
        json!({"layout": layout, "centroids": centroid_map}).to_string(),
    )
    .unwrap();

    paths
}

fn recommender_for(paths: &ArtifactPaths, options: RecommenderOptions) -> Recommender {
    Recommender::new(
        Box::new(SpectralFeatureExtractor::new()),
        Box::new(RmsEmbedding),
        loaded_reducer(),
        RecommendationIndex::load(paths).unwrap(),
        options,
    )
    .unwrap()
}

fn ids(response: &soundalike::Recommendations) -> Vec<&str> {
    response
        .recommendations
        .iter()
        .map(|r| r.song_id.as_str())
        .collect()
}

fn two_cluster_catalogue(dir: &Path) -> ArtifactPaths {
    write_artifacts(
        dir,
        &[
            entry("c2-b", 2, 0.2),
            entry("c2-a", 2, 0.1),
            entry("c2-c", 2, 0.3),
            entry("c5-a", 5, 10.0),
            entry("c5-b", 5, 10.1),
        ],
        &[(2, 0.0), (5, 10.0)],
    )
}

// =============================================================================
// Recommendation scenarios
// =============================================================================

#[test]
fn test_query_near_cluster_two_returns_its_members() {
    let temp = TempDir::new().unwrap();
    let rec = recommender_for(&two_cluster_catalogue(temp.path()), RecommenderOptions::default());

    let first = rec.recommend_vector(&filled(0.1)).unwrap();
    assert_eq!(first.cluster_id, 2);
    assert_eq!(first.method, RecommendationMethod::Cluster);
    assert_eq!(first.total_candidates, 3);
    assert_eq!(ids(&first), vec!["c2-a", "c2-b", "c2-c"]);

    let second = rec.recommend_vector(&filled(0.1)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_metadata_is_joined_into_entries() {
    let temp = TempDir::new().unwrap();
    let rec = recommender_for(&two_cluster_catalogue(temp.path()), RecommenderOptions::default());

    let out = rec.recommend_vector(&filled(10.0)).unwrap();
    let first = &out.recommendations[0];
    assert_eq!(first.song_id, "c5-a");
    assert_eq!(first.title, "Title c5-a");
    assert_eq!(first.year.as_deref(), Some("2001"));
    assert_eq!(first.duration, Some(215.0));
    assert_eq!(first.canonical_url, None);
}

#[test]
fn test_noise_only_catalogue_falls_back_to_similarity() {
    let temp = TempDir::new().unwrap();
    let names: Vec<String> = (0..12).map(|i| format!("n{:02}", i)).collect();
    let entries: Vec<Entry> = names
        .iter()
        .enumerate()
        .map(|(i, id)| entry(id, NOISE_LABEL, i as f32))
        .collect();
    let paths = write_artifacts(temp.path(), &entries, &[(NOISE_LABEL, 0.0)]);
    let rec = recommender_for(&paths, RecommenderOptions::default());

    let out = rec.recommend_vector(&filled(11.2)).unwrap();
    assert_eq!(out.cluster_id, NOISE_LABEL);
    assert_eq!(out.method, RecommendationMethod::Similarity);
    assert_eq!(out.recommendations.len(), 10);
    assert_eq!(out.total_candidates, 10);
    // closest first: 11, 10, 9, ...
    assert_eq!(&ids(&out)[..3], &["n11", "n10", "n09"]);
}

#[test]
fn test_empty_cluster_falls_back_but_keeps_label() {
    let temp = TempDir::new().unwrap();
    let paths = write_artifacts(
        temp.path(),
        &[entry("a", 1, 0.0), entry("b", 1, 0.5)],
        &[(1, 0.0), (7, 50.0)],
    );
    let rec = recommender_for(&paths, RecommenderOptions::default());

    let out = rec.recommend_vector(&filled(49.0)).unwrap();
    assert_eq!(out.cluster_id, 7);
    assert_eq!(out.method, RecommendationMethod::Similarity);
    assert_eq!(ids(&out), vec!["b", "a"]);
}

#[test]
fn test_shared_canonical_url_is_emitted_once() {
    let temp = TempDir::new().unwrap();
    let paths = write_artifacts(
        temp.path(),
        &[
            Entry {
                url: Some("https://x/y"),
                ..entry("a", 3, 0.0)
            },
            Entry {
                url: Some("https://x/y"),
                ..entry("b", 3, 0.0)
            },
            entry("c", 3, 0.0),
        ],
        &[(3, 0.0)],
    );
    let rec = recommender_for(&paths, RecommenderOptions::default());

    let out = rec.recommend_vector(&filled(0.0)).unwrap();
    assert_eq!(ids(&out), vec!["a", "c"]);
    assert_eq!(out.total_candidates, 3);
    assert_eq!(out.recommendations[0].canonical_url.as_deref(), Some("https://x/y"));
}

#[test]
fn test_fallback_emits_shared_canonical_url_once() {
    let temp = TempDir::new().unwrap();
    let paths = write_artifacts(
        temp.path(),
        &[
            Entry {
                url: Some("https://x/y"),
                ..entry("a", NOISE_LABEL, 0.0)
            },
            Entry {
                url: Some("https://x/y"),
                ..entry("b", NOISE_LABEL, 0.5)
            },
            entry("c", NOISE_LABEL, 1.0),
        ],
        &[(NOISE_LABEL, 0.0)],
    );
    let rec = recommender_for(&paths, RecommenderOptions::default());

    let out = rec.recommend_vector(&filled(0.0)).unwrap();
    assert_eq!(out.method, RecommendationMethod::Similarity);
    assert_eq!(ids(&out), vec!["a", "c"]);
    assert_eq!(out.total_candidates, 3);
}

#[test]
fn test_total_candidates_independent_of_limit() {
    let temp = TempDir::new().unwrap();
    let paths = two_cluster_catalogue(temp.path());

    let narrow = recommender_for(
        &paths,
        RecommenderOptions {
            limit: 1,
            ..Default::default()
        },
    );
    let wide = recommender_for(&paths, RecommenderOptions::default());

    let a = narrow.recommend_vector(&filled(0.0)).unwrap();
    let b = wide.recommend_vector(&filled(0.0)).unwrap();
    assert_eq!(a.recommendations.len(), 1);
    assert_eq!(b.recommendations.len(), 3);
    assert_eq!(a.total_candidates, b.total_candidates);
}

#[test]
fn test_audio_query_runs_full_pipeline() {
    let temp = TempDir::new().unwrap();
    let paths = write_artifacts(temp.path(), &[entry("only", 0, 0.0)], &[(0, 0.0)]);
    let rec = recommender_for(&paths, RecommenderOptions::default());

    let wav = temp.path().join("query.wav");
    generate_sine_wav(&wav, 440.0, 2.0, 22_050);

    let out = rec.recommend_file(&wav).unwrap();
    assert_eq!(out.cluster_id, 0);
    assert_eq!(out.method, RecommendationMethod::Cluster);
    assert_eq!(ids(&out), vec!["only"]);
}

#[test]
fn test_undecodable_query_becomes_error_payload() {
    let temp = TempDir::new().unwrap();
    let rec = recommender_for(&two_cluster_catalogue(temp.path()), RecommenderOptions::default());

    let bad = temp.path().join("broken.mp3");
    fs::write(&bad, b"definitely not audio").unwrap();

    let response = rec.respond(&bad);
    assert!(!response.is_ok());
    let json = serde_json::to_value(&response).unwrap();
    let message = json["error"].as_str().unwrap();
    assert!(message.contains("broken.mp3"), "unexpected error: {}", message);
    assert!(json.get("recommendations").is_none());
}

// =============================================================================
// Startup validation
// =============================================================================

#[test]
fn test_unloaded_reducer_refuses_to_serve() {
    let temp = TempDir::new().unwrap();
    let paths = two_cluster_catalogue(temp.path());

    let err = Recommender::new(
        Box::new(SpectralFeatureExtractor::new()),
        Box::new(RmsEmbedding),
        Arc::new(EmbeddingReducer::new()),
        RecommendationIndex::load(&paths).unwrap(),
        RecommenderOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, SoundalikeError::ModelNotLoaded { .. }));
    assert!(err.is_startup_error());
}

#[test]
fn test_missing_reducer_artifact_stops_startup() {
    let temp = TempDir::new().unwrap();
    let paths = two_cluster_catalogue(temp.path());
    let settings = Settings {
        input: temp.path().join("query.wav"),
        artifacts: paths,
        ..Default::default()
    };

    let err = Recommender::from_settings(&settings).unwrap_err();
    assert!(err.is_startup_error(), "unexpected error: {}", err);
}

#[test]
fn test_catalogue_with_wrong_vector_length_is_rejected() {
    let temp = TempDir::new().unwrap();
    let paths = two_cluster_catalogue(temp.path());
    fs::write(
        &paths.features,
        json!({"layout": FeatureLayout::v1(), "songs": {"x": {"features": [1.0, 2.0], "cluster": 2}}})
            .to_string(),
    )
    .unwrap();

    let err = RecommendationIndex::load(&paths).unwrap_err();
    assert!(matches!(err, SoundalikeError::SchemaError(_)));
}

#[test]
fn test_swap_index_serves_new_catalogue() {
    let temp = TempDir::new().unwrap();
    let rec = recommender_for(&two_cluster_catalogue(temp.path()), RecommenderOptions::default());
    let held = rec.snapshot();

    let next_dir = TempDir::new().unwrap();
    let next = write_artifacts(next_dir.path(), &[entry("fresh", 9, 0.0)], &[(9, 0.0)]);
    rec.swap_index(Arc::new(RecommendationIndex::load(&next).unwrap()))
        .unwrap();

    let out = rec.recommend_vector(&filled(0.0)).unwrap();
    assert_eq!(out.cluster_id, 9);
    assert_eq!(ids(&out), vec!["fresh"]);
    assert_eq!(held.catalogue.len(), 5);
}

// =============================================================================
// Batch and builder
// =============================================================================

#[test]
fn test_batch_writes_every_file() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    fs::create_dir(&data).unwrap();
    let paths = write_artifacts(&data, &[entry("only", 0, 0.0)], &[(0, 0.0)]);
    let rec = recommender_for(&paths, RecommenderOptions::default());

    let queries = temp.path().join("queries");
    fs::create_dir(&queries).unwrap();
    generate_sine_wav(&queries.join("a.wav"), 220.0, 1.5, 16_000);
    generate_sine_wav(&queries.join("b.wav"), 880.0, 1.5, 44_100);
    fs::write(queries.join("broken.mp3"), b"not audio").unwrap();
    fs::write(queries.join("notes.txt"), b"ignored").unwrap();

    let output = temp.path().join("predictions.json");
    let settings = Settings {
        input: queries.clone(),
        output: Some(output.clone()),
        artifacts: paths,
        show_progress: false,
        ..Default::default()
    };

    let result = pipeline::run_with(&rec, &settings).unwrap();
    assert_eq!(result.total_files, 3);
    assert_eq!(result.successful, 2);
    assert_eq!(result.failed, 1);

    let json: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let predictions = json["predictions"].as_object().unwrap();
    assert_eq!(predictions.len(), 3);
    assert_eq!(predictions["a.wav"]["method"], "cluster");
    assert_eq!(predictions["b.wav"]["recommendations"][0]["song_id"], "only");
    assert!(predictions["broken.mp3"]["error"].is_string());
    assert_eq!(json["metadata"]["failed_count"], 1);
}

#[test]
fn test_single_query_written_to_output_file() {
    let temp = TempDir::new().unwrap();
    let paths = write_artifacts(temp.path(), &[entry("only", 0, 0.0)], &[(0, 0.0)]);
    let rec = recommender_for(&paths, RecommenderOptions::default());

    let wav = temp.path().join("query.wav");
    generate_sine_wav(&wav, 330.0, 1.0, 16_000);
    let output = temp.path().join("result.json");

    let settings = Settings {
        input: wav,
        output: Some(output.clone()),
        artifacts: paths,
        show_progress: false,
        ..Default::default()
    };
    let result = pipeline::run_with(&rec, &settings).unwrap();
    assert_eq!(result.successful, 1);

    let response: RecommendationResponse =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    match response {
        RecommendationResponse::Ok(recs) => assert_eq!(recs.recommendations.len(), 1),
        RecommendationResponse::Err(e) => panic!("unexpected error payload: {}", e.error),
    }
}

#[test]
fn test_built_catalogue_serves_queries() {
    let temp = TempDir::new().unwrap();
    let models = temp.path().join("models");
    fs::create_dir(&models).unwrap();
    let reducer_path = models.join("embedding_reducer.json");
    fs::write(&reducer_path, serde_json::to_string(&reducer_artifact()).unwrap()).unwrap();

    let combined = json!({
        "s1": {"features": vec![0.5; 50], "duration": 180.0, "yamnet_embedding": [0.2, 0.0, 0.0, 0.0],
               "instruments": {"Music": 0.7}, "cluster": 0},
        "s2": {"features": vec![0.7; 50], "duration": 200.0, "yamnet_embedding": [0.4, 0.0, 0.0, 0.0],
               "instruments": {}, "cluster": 0},
        "s3": {"features": vec![0.1; 50], "yamnet_embedding": [0.1, 0.0, 0.0, 0.0]}
    });
    let combined_path = temp.path().join("features_combined.json");
    fs::write(&combined_path, combined.to_string()).unwrap();

    let report = pipeline::build_catalogue(&BuildSettings {
        combined: combined_path,
        reducer: reducer_path,
        output_dir: temp.path().to_path_buf(),
        write_clusters: true,
        fit_reducer: false,
    })
    .unwrap();
    assert_eq!(report.written, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.clusters, 1);
    assert!(!report.reducer_fitted);

    let paths = ArtifactPaths::in_dir(temp.path());
    fs::write(
        &paths.metadata,
        json!({
            "s1.mp3": {"song_id": "s1", "title": "One", "perma_url": "https://x/one"},
            "s2.mp3": {"song_id": "s2", "title": "Two", "perma_url": "https://x/two"}
        })
        .to_string(),
    )
    .unwrap();

    let rec = recommender_for(&paths, RecommenderOptions::default());
    let query = temp.path().join("query.wav");
    generate_sine_wav(&query, 440.0, 1.0, 16_000);

    let out = rec.recommend_file(&query).unwrap();
    assert_eq!(out.cluster_id, 0);
    assert_eq!(out.method, RecommendationMethod::Cluster);
    assert_eq!(ids(&out), vec!["s1", "s2"]);
}
