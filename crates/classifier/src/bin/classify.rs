use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use genre_classifier::{ClassificationService, GenreCnn, DEFAULT_MODEL_PATH};
use genre_domain::{ClassificationResponse, MediaKind};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Classify the musical genre of an audio or video file",
    long_about = None
)]
struct Cli {
    /// Path to the media file to classify
    input: PathBuf,
    /// Model weights in safetensors format
    #[arg(short, long, env = "GENRE_MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    model: PathBuf,
    /// Treat the input as a video container and extract its audio track first
    #[arg(long)]
    video: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let model = GenreCnn::load(&cli.model)
        .with_context(|| format!("failed to load model from {}", cli.model.display()))?;
    let service = ClassificationService::new(Arc::new(model));

    let bytes = std::fs::read(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let kind = if cli.video {
        MediaKind::Video
    } else {
        MediaKind::Audio
    };
    let result = service.classify(kind, &bytes);

    let filename = cli
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let response = ClassificationResponse::new(filename, result);
    let json = response.to_json()?;
    println!("{}", String::from_utf8_lossy(&json));
    Ok(())
}
