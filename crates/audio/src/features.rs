use ndarray::{s, Array2, ArrayView2, ErrorKind, ShapeError};
use tracing::debug;

use crate::dsp::{mel_filterbank, power_spectrogram, power_to_db, N_FFT, N_MELS};
use crate::error::AudioError;
use crate::io::Waveform;
use crate::resample::{resample, ANALYSIS_SAMPLE_RATE};

pub const SPECTROGRAM_FRAMES: usize = 128;

/// Log-mel spectrogram with exactly `N_MELS` bins and `SPECTROGRAM_FRAMES` frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram(Array2<f32>);

impl Spectrogram {
    /// Fixes the time axis of a `(N_MELS, frames)` log-mel matrix: later frames
    /// are dropped, missing trailing frames are zero-filled.
    pub fn from_log_mel(log_mel: Array2<f32>) -> Result<Self, AudioError> {
        if log_mel.nrows() != N_MELS {
            return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
        }
        let frames = log_mel.ncols();
        let fixed = if frames >= SPECTROGRAM_FRAMES {
            log_mel.slice(s![.., ..SPECTROGRAM_FRAMES]).to_owned()
        } else {
            let mut padded = Array2::zeros((N_MELS, SPECTROGRAM_FRAMES));
            padded.slice_mut(s![.., ..frames]).assign(&log_mel);
            padded
        };
        Ok(Self(fixed))
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.0.view()
    }
}

/// Turns waveforms into model input. Holds the precomputed mel filterbank, so
/// build it once and share it.
#[derive(Debug, Clone)]
pub struct MelSpectrogramExtractor {
    filterbank: Array2<f32>,
}

impl MelSpectrogramExtractor {
    pub fn new() -> Self {
        Self {
            filterbank: mel_filterbank(
                ANALYSIS_SAMPLE_RATE,
                N_FFT,
                N_MELS,
                0.0,
                ANALYSIS_SAMPLE_RATE as f64 / 2.0,
            ),
        }
    }

    /// Full-length log-mel matrix, `(N_MELS, frames)`.
    pub fn log_mel(&self, waveform: &Waveform) -> Result<Array2<f32>, AudioError> {
        let waveform = resample(waveform, ANALYSIS_SAMPLE_RATE)?;
        let power = power_spectrogram(&waveform.samples)?;
        let mel = self.filterbank.dot(&power);
        Ok(power_to_db(&mel))
    }

    pub fn extract(&self, waveform: &Waveform) -> Result<Spectrogram, AudioError> {
        let log_mel = self.log_mel(waveform)?;
        debug!(frames = log_mel.ncols(), "computed log-mel spectrogram");
        Spectrogram::from_log_mel(log_mel)
    }
}

impl Default for MelSpectrogramExtractor {
    fn default() -> Self {
        Self::new()
    }
}
