mod manifest;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use genre_audio::MelSpectrogramExtractor;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Scan a genre-labelled dataset and report which clips are usable for training"
)]
struct Args {
    /// Dataset root with one subdirectory of .wav files per genre
    #[arg(short, long, env = "DATASET_PATH", default_value = "./data/genres_original")]
    dataset: PathBuf,
    /// Where to write the JSON manifest; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let extractor = MelSpectrogramExtractor::new();
    let manifest = manifest::build(&args.dataset, &extractor)
        .with_context(|| format!("failed to scan dataset {}", args.dataset.display()))?;
    info!(
        examples = manifest.examples.len(),
        usable = manifest.usable_count(),
        skipped = manifest.skipped.len(),
        "dataset scanned"
    );

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, &manifest)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
