//! Pipeline orchestration
//!
//! Runs recommendation requests for one query file or a whole directory.
//! Batch mode fans out over rayon and writes every result, success or
//! error payload, to a single predictions file.

use crate::config::Settings;
use crate::discovery::{self, DiscoveredFile};
use crate::error::{Result, SoundalikeError};
use crate::export;
use crate::recommend::Recommender;
use crate::types::RecommendationResponse;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Pipeline result summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Load every artifact and run the recommend command
pub fn run(settings: &Settings) -> Result<PipelineResult> {
    let load_start = Instant::now();
    let recommender = Recommender::from_settings(settings)?;
    info!(
        "Models and catalogue loaded in {:.2}s",
        load_start.elapsed().as_secs_f64()
    );
    run_with(&recommender, settings)
}

/// Run the recommend command against an already-built recommender
pub fn run_with(recommender: &Recommender, settings: &Settings) -> Result<PipelineResult> {
    if settings.input.is_dir() {
        run_batch(recommender, settings)
    } else {
        run_single(recommender, settings)
    }
}

/// One query: print to stdout, or write to `-o` when given
fn run_single(recommender: &Recommender, settings: &Settings) -> Result<PipelineResult> {
    let response = recommender.respond(&settings.input);
    let ok = response.is_ok();

    match &settings.output {
        Some(path) => {
            export::write_json_atomic(&response, path)?;
            info!("Wrote recommendations to {}", path.display());
        }
        None => {
            let rendered = serde_json::to_string_pretty(&response).map_err(|e| {
                SoundalikeError::OutputError {
                    path: "<stdout>".into(),
                    reason: e.to_string(),
                }
            })?;
            println!("{}", rendered);
        }
    }

    Ok(PipelineResult {
        total_files: 1,
        successful: usize::from(ok),
        failed: usize::from(!ok),
    })
}

fn run_batch(recommender: &Recommender, settings: &Settings) -> Result<PipelineResult> {
    let batch_start = Instant::now();

    configure_thread_pool(settings.threads)?;

    info!("Scanning for audio files...");
    let files = discovery::scan(&settings.input, settings.recursive)?;
    let output_path = settings.batch_output();

    if files.is_empty() {
        export::write_predictions(&BTreeMap::new(), &output_path)?;
        return Ok(PipelineResult {
            total_files: 0,
            successful: 0,
            failed: 0,
        });
    }

    let progress_bar = if settings.show_progress {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    let failed = AtomicUsize::new(0);

    let predictions: BTreeMap<String, RecommendationResponse> = files
        .par_iter()
        .map(|file| {
            let response = recommender.respond(&file.path);
            if !response.is_ok() {
                failed.fetch_add(1, Ordering::Relaxed);
            }
            if let Some(ref pb) = progress_bar {
                pb.inc(1);
                pb.set_message(file.display_name());
            }
            (prediction_key(&settings.input, file), response)
        })
        .collect();

    if let Some(pb) = progress_bar {
        pb.finish_with_message("Recommendations complete");
    }

    export::write_predictions(&predictions, &output_path)?;

    let failed = failed.load(Ordering::Relaxed);
    if failed > 0 {
        warn!("{} of {} files failed", failed, files.len());
    }
    info!(
        "Batch completed in {:.2}s",
        batch_start.elapsed().as_secs_f64()
    );

    Ok(PipelineResult {
        total_files: files.len(),
        successful: files.len() - failed,
        failed,
    })
}

/// Path relative to the scanned directory, so nested files never collide
fn prediction_key(root: &Path, file: &DiscoveredFile) -> String {
    file.path
        .strip_prefix(root)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| file.display_name())
}

/// Configure the Rayon thread pool
fn configure_thread_pool(num_threads: usize) -> Result<()> {
    match rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
    {
        Ok(()) => {
            debug!("Configured thread pool with {} threads", num_threads);
        }
        Err(e) => {
            // already initialised, e.g. by an earlier batch in the same process
            if e.to_string().contains("already been initialized") {
                debug!("Thread pool already initialized, using existing pool");
            } else {
                return Err(SoundalikeError::ConfigError(format!(
                    "Failed to configure thread pool: {}",
                    e
                )));
            }
        }
    }
    Ok(())
}
