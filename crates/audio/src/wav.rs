use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::error::AudioError;
use crate::io::Waveform;

/// Writes a waveform as 32-bit float mono WAV, replacing any existing file.
pub fn write_wav(path: &Path, waveform: &Waveform) -> Result<(), AudioError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in &waveform.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
