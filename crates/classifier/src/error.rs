use std::io;

use thiserror::Error;

use genre_audio::AudioError;
use genre_domain::DomainError;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid model artifact: {0}")]
    Format(#[from] safetensors::SafeTensorError),
    #[error("missing parameter {0}")]
    MissingTensor(String),
    #[error("unexpected parameter {0}")]
    UnexpectedTensor(String),
    #[error("parameter {name} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("parameter {name} has dtype {found}, expected F32")]
    DType { name: String, found: String },
    #[error("tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("model produced non-finite logits")]
    NonFinite,
}

/// A failed pipeline stage. The variant names the stage.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("staging failed: {0}")]
    Staging(#[from] io::Error),
    #[error("demuxing failed: {0}")]
    Demux(AudioError),
    #[error("writing extracted audio failed: {0}")]
    Transcode(AudioError),
    #[error("decoding failed: {0}")]
    Decode(AudioError),
    #[error("feature extraction failed: {0}")]
    Features(AudioError),
    #[error("inference failed: {0}")]
    Inference(#[from] ModelError),
    #[error("ranking failed: {0}")]
    Ranking(#[from] DomainError),
}

impl ClassifyError {
    pub fn stage(&self) -> &'static str {
        match self {
            ClassifyError::Staging(_) => "staged",
            ClassifyError::Demux(_) | ClassifyError::Transcode(_) => "demuxed",
            ClassifyError::Decode(_) | ClassifyError::Features(_) => "extracted",
            ClassifyError::Inference(_) => "inferred",
            ClassifyError::Ranking(_) => "ranked",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("classification queue is full")]
    Saturated,
    #[error("classification pool is shut down")]
    Closed,
}
