use std::path::{Path, PathBuf};

use anyhow::Result;
use genre_audio::{AudioDecoder, MelSpectrogramExtractor, SPECTROGRAM_FRAMES};
use genre_domain::Genre;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
pub struct Manifest {
    pub dataset: PathBuf,
    pub frames_required: usize,
    pub examples: Vec<Example>,
    pub skipped: Vec<Skipped>,
}

impl Manifest {
    pub fn usable_count(&self) -> usize {
        self.examples.iter().filter(|e| e.usable).count()
    }
}

#[derive(Debug, Serialize)]
pub struct Example {
    pub path: PathBuf,
    pub genre: String,
    /// Output index of the genre, absent for directories that are not a known genre.
    pub label: Option<usize>,
    pub frames: usize,
    pub usable: bool,
}

#[derive(Debug, Serialize)]
pub struct Skipped {
    pub path: PathBuf,
    pub error: String,
}

/// Walks `root/<genre>/*.wav` in sorted order. Files that fail to decode are
/// recorded in `skipped` rather than aborting the scan.
pub fn build(root: &Path, extractor: &MelSpectrogramExtractor) -> Result<Manifest> {
    let mut manifest = Manifest {
        dataset: root.to_path_buf(),
        frames_required: SPECTROGRAM_FRAMES,
        examples: Vec::new(),
        skipped: Vec::new(),
    };

    for genre_dir in sorted_entries(root)?.into_iter().filter(|p| p.is_dir()) {
        let genre = genre_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let label = match genre.parse::<Genre>() {
            Ok(genre) => Some(genre.index()),
            Err(_) => {
                warn!(%genre, "directory is not a known genre; examples are unlabelled");
                None
            }
        };

        for path in sorted_entries(&genre_dir)? {
            if !is_wav(&path) {
                continue;
            }
            let frames = AudioDecoder::open(&path)
                .and_then(|waveform| extractor.log_mel(&waveform))
                .map(|log_mel| log_mel.ncols());
            match frames {
                Ok(frames) => {
                    debug!(path = ?path, frames, "extracted");
                    manifest.examples.push(Example {
                        path,
                        genre: genre.clone(),
                        label,
                        frames,
                        usable: frames >= SPECTROGRAM_FRAMES,
                    });
                }
                Err(err) => {
                    warn!(path = ?path, error = %err, "skipping file");
                    manifest.skipped.push(Skipped {
                        path,
                        error: err.to_string(),
                    });
                }
            }
        }
    }
    Ok(manifest)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    Ok(entries)
}

fn is_wav(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}
