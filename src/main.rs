//! soundalike CLI entry point

use clap::Parser;
use soundalike::config::{BuildSettings, Cli, Command, RecommendArgs, Settings};
use soundalike::pipeline;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&cli);

    match &cli.command {
        Command::Recommend(args) => recommend(args, cli.quiet),
        Command::BuildCatalogue(args) => build_catalogue(&BuildSettings::from_cli(args), cli.quiet),
    }
}

fn recommend(args: &RecommendArgs, quiet: bool) -> ExitCode {
    if let Err(e) = validate_inputs(args) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let settings = Settings::from_cli(args, quiet);
    let batch = settings.input.is_dir();

    match pipeline::run(&settings) {
        Ok(result) => {
            if batch && !quiet {
                eprintln!();
                eprintln!(
                    "Summary: {} successful, {} failed (of {} total) -> {}",
                    result.successful,
                    result.failed,
                    result.total_files,
                    settings.batch_output().display()
                );
            }

            if result.failed > 0 {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_catalogue(settings: &BuildSettings, quiet: bool) -> ExitCode {
    match pipeline::build_catalogue(settings) {
        Ok(report) => {
            if !quiet {
                if report.reducer_fitted {
                    eprintln!("Fitted embedding reducer -> {}", settings.reducer.display());
                }
                eprintln!(
                    "Built catalogue: {} songs, {} skipped, {} clusters -> {}",
                    report.written,
                    report.skipped,
                    report.clusters,
                    settings.output_dir.display()
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let filter = cli.log_level().to_string().to_lowercase();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn validate_inputs(args: &RecommendArgs) -> Result<(), String> {
    if !args.input.exists() {
        return Err(format!(
            "Input path does not exist: {}\n\n  Tip: Check the path is correct and accessible.\n  Examples:\n    soundalike recommend -i ./query.mp3\n    soundalike recommend -i ./queries -o predictions.json",
            args.input.display()
        ));
    }

    if !args.data_dir.is_dir() {
        return Err(format!(
            "Data directory does not exist: {}\n\n  Tip: Point --data-dir at the directory holding clusters.json,\n  features_reduced.json and metadata.json.",
            args.data_dir.display()
        ));
    }

    if let Some(parent) = args.output.as_deref().and_then(|o| o.parent()) {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(format!(
                "Output parent directory does not exist: {}\n\n  Example: mkdir -p {}",
                parent.display(),
                parent.display()
            ));
        }
    }

    Ok(())
}
