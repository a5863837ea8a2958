use std::io;

use symphonia::core::codecs::CodecType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("decode error: {0}")]
    Decode(#[from] symphonia::core::errors::Error),
    #[error("no decodable audio track")]
    NoAudioTrack,
    #[error("no decoder for audio codec {0}")]
    UnsupportedCodec(CodecType),
    #[error("resampling failed: {0}")]
    Resample(String),
    #[error("fft failed: {0}")]
    Fft(String),
    #[error("wav encoding failed: {0}")]
    Wav(#[from] hound::Error),
    #[error("invalid spectrogram shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
}
