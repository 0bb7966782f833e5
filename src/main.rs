//! ScribeLens - Handwriting OCR with spell correction and translation
//!
//! Reads the text in a photo or scan, draws what was found onto a thumbnail,
//! corrects the text and translates it.

mod app;
mod config;
mod error;
mod language;
mod pipeline;
mod storage;
mod text;
mod validation;
mod vision;

#[cfg(test)]
mod fakes;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::app::{OcrRequest, ScribeLensApp};
use crate::config::AppConfig;
use crate::language::Language;

/// ScribeLens - Handwriting OCR and translation
#[derive(Parser, Debug)]
#[command(name = "scribe-lens")]
#[command(about = "Recognize handwritten text in an image, correct it and translate it")]
struct Args {
    /// Image to read (JPG or PNG, up to 5 MB)
    #[arg(required_unless_present = "list_languages")]
    image: Option<PathBuf>,

    /// Language of the text in the image
    #[arg(short, long)]
    source: Option<Language>,

    /// Language to translate into
    #[arg(short, long)]
    target: Option<Language>,

    /// Use GPU acceleration for detection
    #[arg(long)]
    gpu: bool,

    /// Write the annotated thumbnail (PNG) to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip grammar correction
    #[arg(long)]
    no_grammar: bool,

    /// List supported languages and exit
    #[arg(long)]
    list_languages: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging, RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // List languages mode
    if args.list_languages {
        println!("Supported languages:");
        for language in Language::ALL {
            println!("  {:<6} {}", language.code(), language.display_name());
        }
        return Ok(());
    }

    let Some(image) = args.image.clone() else {
        anyhow::bail!("No image given");
    };

    let mut config = load_or_create_config(args.config.as_deref())?;
    if args.no_grammar {
        config.grammar.enabled = false;
    }

    let mut request = OcrRequest::from_config(image, &config);
    if let Some(source) = args.source {
        request.source = source;
    }
    if let Some(target) = args.target {
        request.target = target;
    }
    request.use_gpu |= args.gpu;

    info!(
        "Reading {:?} ({} -> {})",
        request.image_path, request.source, request.target
    );

    let mut app = ScribeLensApp::new(&config)?;
    let outcome = app.run(&request)?;

    println!("Recognized text:\n{}\n", outcome.recognized);
    println!("Corrected text:\n{}\n", outcome.corrected);
    println!("Translation ({}):\n{}", request.target.display_name(), outcome.translated);

    if let Some(output) = &args.output {
        std::fs::write(output, &outcome.thumbnail)
            .with_context(|| format!("Failed to write thumbnail to {:?}", output))?;
        info!("Thumbnail written to {:?}", output);
    }

    Ok(())
}

/// Load configuration from file or create default
///
/// A path given with `--config` must exist and parse. The default location
/// falls back to defaults and is created when missing.
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        if !path.is_file() {
            anyhow::bail!("Configuration file {:?} does not exist", path);
        }
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    match storage::default_config_path() {
        Ok(path) => Ok(load_or_create_default(&path)),
        Err(e) => {
            warn!("No configuration directory ({:#}), using default configuration", e);
            Ok(AppConfig::default())
        }
    }
}

fn load_or_create_default(path: &Path) -> AppConfig {
    if path.exists() {
        match config::load_config(path) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", path);
                return config;
            }
            Err(e) => warn!("Ignoring configuration {:?}: {:#}", path, e),
        }
    } else {
        let config = AppConfig::default();
        match config::save_config(&config, path) {
            Ok(()) => info!("Created default configuration at {:?}", path),
            Err(e) => warn!("Could not save default configuration: {:#}", e),
        }
        return config;
    }

    info!("Using default configuration");
    AppConfig::default()
}
