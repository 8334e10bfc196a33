// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! AniDex: on-device photo identification
//!
//! Command-line driver for the classifier service.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use anidex::config::AppConfig;
use anidex::engine::OnnxEngine;
use anidex::{AniDexError, Intelligence, Photo, PhotoAnalysis, PhotoClassifier, Result};

/// AniDex CLI - identify animals and plants in photos
#[derive(Parser, Debug)]
#[command(name = "anidex")]
#[command(version)]
#[command(about = "On-device photo identification", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Identify one or more photos
    Identify {
        /// Photo files to classify
        #[arg(required = true)]
        photos: Vec<PathBuf>,

        /// Maximum number of labels per photo (overrides config)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Only report the best label
        #[arg(long)]
        best: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Load the model and report its shape
    Status,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate configuration file
    Validate,
}

/// Per-photo outcome of `identify`
#[derive(Debug, Serialize)]
struct IdentifyReport {
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<PhotoAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = if needs_existing_config(&cli.command) {
        AppConfig::load(&cli.config)?
    } else {
        AppConfig::default()
    };

    match cli.command {
        Commands::Identify { photos, top_k, best } => {
            run_identify(config, photos, top_k, best, &cli.format).await
        }
        Commands::Config { action } => run_config_command(config, action, &cli.config),
        Commands::Status => run_status(config, &cli.format).await,
    }
}

/// `config generate` writes a fresh file, so a broken one must not block it
fn needs_existing_config(command: &Commands) -> bool {
    !matches!(
        command,
        Commands::Config { action: ConfigCommands::Generate { .. } }
    )
}

/// Load the bundled model off the async executor
async fn load_engine(config: &AppConfig) -> Result<OnnxEngine> {
    let model = config.model.clone();
    tokio::task::spawn_blocking(move || OnnxEngine::new(&model))
        .await
        .map_err(|e| AniDexError::Model(format!("model loader failed: {}", e)))?
}

/// Build the classifier described by `config`
async fn load_classifier(config: &AppConfig) -> Result<Intelligence> {
    let engine = load_engine(config).await?;
    Ok(Intelligence::new(Arc::new(engine)).with_orientation_policy(config.classifier.orientation))
}

/// Classify every photo concurrently, report in input order
async fn run_identify(
    config: AppConfig,
    photos: Vec<PathBuf>,
    top_k: Option<usize>,
    best: bool,
    format: &str,
) -> Result<()> {
    let top_k = if best { 1 } else { top_k.unwrap_or(config.classifier.top_k) };
    if top_k == 0 {
        return Err(AniDexError::Config("--top-k must be at least 1".to_string()));
    }

    let classifier = load_classifier(&config).await?;
    info!("Identifying {} photo(s) with {} engine", photos.len(), classifier.engine_name());

    let handles: Vec<_> = photos
        .into_iter()
        .map(|path| {
            let classifier = classifier.clone();
            tokio::spawn(async move {
                let outcome = identify_one(&classifier, &path, top_k).await;
                (path, outcome)
            })
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        let (path, outcome) = handle
            .await
            .map_err(|e| AniDexError::AnalysisFailed(format!("identify task failed: {}", e)))?;
        let report = match outcome {
            Ok(analysis) => IdentifyReport { path, analysis: Some(analysis), error: None },
            Err(e) => {
                if e.is_classification_failure() {
                    warn!("Could not identify {:?}: {}", path, e);
                } else {
                    error!("Failed to identify {:?}: {}", path, e);
                }
                IdentifyReport { path, analysis: None, error: Some(e.to_string()) }
            }
        };
        reports.push(report);
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&reports)?),
        _ => print_reports(&reports),
    }

    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        warn!("{} of {} photo(s) could not be identified", failed, reports.len());
    }

    Ok(())
}

async fn identify_one(classifier: &Intelligence, path: &Path, top_k: usize) -> Result<PhotoAnalysis> {
    let owned = path.to_path_buf();
    let photo = tokio::task::spawn_blocking(move || Photo::open(&owned))
        .await
        .map_err(|e| AniDexError::InvalidImage(format!("decoder task failed: {}", e)))??;

    classifier.analyze(&photo, top_k).await
}

fn print_reports(reports: &[IdentifyReport]) {
    for report in reports {
        println!("{}", report.path.display());
        match (&report.analysis, &report.error) {
            (Some(analysis), _) => {
                for (rank, label) in analysis.labels.iter().enumerate() {
                    println!("  {}. {} ({:.1}%)", rank + 1, label.label, label.confidence * 100.0);
                }
                println!("  [{} ms]", analysis.elapsed_ms);
            }
            (None, Some(err)) => println!("  error: {}", err),
            (None, None) => {}
        }
    }
}

/// Handle config subcommands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Generate { output, force } => {
            if output.exists() && !force {
                return Err(AniDexError::Config(format!(
                    "{} already exists. Use --force to overwrite",
                    output.display()
                )));
            }
            AppConfig::default().save(&output)?;
            println!("Configuration written to {}", output.display());
        }
        ConfigCommands::Validate => {
            if !config_path.exists() {
                warn!("{} not found, validated defaults", config_path.display());
            }
            config.validate()?;
            for (name, path) in [("model", &config.model.path), ("labels", &config.model.labels)] {
                if !Path::new(path).exists() {
                    warn!("{} file not found: {}", name, path);
                }
            }
            println!("Configuration is valid");
        }
    }
    Ok(())
}

/// Load the engine and report what it expects
async fn run_status(config: AppConfig, format: &str) -> Result<()> {
    let engine = load_engine(&config).await?;

    let (width, height) = engine.input_size();
    match format {
        "json" => {
            let status = serde_json::json!({
                "model": config.model.path,
                "labels": engine.labels().len(),
                "input_width": width,
                "input_height": height,
                "top_k": config.classifier.top_k,
                "orientation": config.classifier.orientation,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        _ => {
            println!("Model: {}", config.model.path);
            println!("  Labels: {}", engine.labels().len());
            println!("  Input: {}x{}", width, height);
            println!("  Default top-k: {}", config.classifier.top_k);
        }
    }
    Ok(())
}
