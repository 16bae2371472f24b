use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use rollcall::server::{self, AppState, RecognizeResponse};
use rollcall::{config, OnnxExtractor, Recognizer};

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(
    version,
    about = "Recognise enrolled students in a photo by face embedding distance"
)]
struct Cli {
    /// Config file (defaults to the compiled-in location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the recognition HTTP API
    Serve,
    /// Recognise faces in a local image and print the result as JSON
    Recognize {
        /// Image file to check
        image: PathBuf,
    },
    /// Build the gallery from the reference folder and list its identities
    Gallery {
        /// Ignore cached galleries and rebuild from the reference images
        #[arg(long)]
        refresh: bool,
    },
    /// Open config file in editor
    Config,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    if let Commands::Config = cli.command {
        return open_config(config_path);
    }

    let cfg = config::load_config(config_path)?;
    let recognizer = recognizer(&cfg)?;

    match cli.command {
        Commands::Serve => serve(&cfg, recognizer),
        Commands::Recognize { image } => recognize(&recognizer, &image),
        Commands::Gallery { refresh } => gallery(&recognizer, refresh),
        Commands::Config => open_config(config_path),
    }
}

fn recognizer(cfg: &config::Config) -> Result<Recognizer> {
    let extractor = OnnxExtractor::new(cfg.detector.extractor_options())
        .context("Failed to initialize face recognition pipeline")?;
    info!("Reference images: {}", cfg.gallery.references_dir.display());
    Ok(Recognizer::new(Arc::new(extractor), cfg))
}

fn serve(cfg: &config::Config, recognizer: Recognizer) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(server::serve(AppState::new(recognizer), &cfg.server))
}

fn recognize(recognizer: &Recognizer, image: &Path) -> Result<()> {
    let bytes =
        std::fs::read(image).with_context(|| format!("reading {}", image.display()))?;
    let result = recognizer
        .recognize(&bytes)
        .with_context(|| format!("Error processing image {}", image.display()))?;

    for r in result.recognized() {
        info!("{}: distance {:.3}", r.identity, r.distance);
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&RecognizeResponse::from(&result))?
    );
    Ok(())
}

fn gallery(recognizer: &Recognizer, refresh: bool) -> Result<()> {
    let gallery = if refresh {
        recognizer.rebuild_gallery()
    } else {
        recognizer.gallery()
    }
    .context("Failed to build gallery")?;

    if gallery.is_empty() {
        anyhow::bail!(
            "No usable reference faces in {}",
            recognizer.references_dir().display()
        );
    }

    for entry in gallery.iter() {
        println!("{}\t{}", entry.identity, entry.embedding.dim());
    }
    info!("✓ {} identities enrolled", gallery.len());
    Ok(())
}

fn open_config(path: Option<&Path>) -> Result<()> {
    let config_path = path.unwrap_or(&config::CONFIG_PATH);
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    if !config_path.exists() {
        config::save_config(&config::Config::default(), Some(config_path))
            .context("Failed to write default config")?;
    }

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
