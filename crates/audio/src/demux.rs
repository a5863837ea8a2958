use std::path::Path;

use tracing::{debug, instrument};

use crate::error::AudioError;
use crate::io::{decode_audio, probe, Waveform};

/// What a container yielded. A container without an audio stream is a normal
/// outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum DemuxedAudio {
    Track(Waveform),
    NoAudio,
}

pub trait MediaDemuxer: Send + Sync {
    /// Extracts the first audio stream of a staged container file.
    fn extract_audio(&self, path: &Path) -> Result<DemuxedAudio, AudioError>;
}

/// Demuxes any container symphonia can probe (MP4/MOV, Matroska/WebM, ...).
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDemuxer;

impl MediaDemuxer for SymphoniaDemuxer {
    #[instrument(skip(self))]
    fn extract_audio(&self, path: &Path) -> Result<DemuxedAudio, AudioError> {
        let format = probe(path)?;
        debug!(tracks = format.tracks().len(), "probed container");
        Ok(match decode_audio(format)? {
            Some(waveform) => DemuxedAudio::Track(waveform),
            None => DemuxedAudio::NoAudio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::write_wav;
    use approx::assert_abs_diff_eq;
    use std::path::PathBuf;
    use symphonia::core::codecs::CODEC_TYPE_OPUS;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata").join(name)
    }

    fn track(demuxed: DemuxedAudio) -> Waveform {
        match demuxed {
            DemuxedAudio::Track(waveform) => waveform,
            DemuxedAudio::NoAudio => panic!("expected an audio track"),
        }
    }

    #[test]
    fn audio_only_container_has_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        write_wav(&path, &Waveform::new(8_000, vec![0.25; 8_000 * 5])).unwrap();

        let waveform = track(SymphoniaDemuxer.extract_audio(&path).unwrap());
        assert_eq!(waveform.sample_rate, 8_000);
        assert_eq!(waveform.samples.len(), 40_000);
    }

    #[test]
    fn video_container_yields_its_audio_track() {
        // H.264 video track first, 5 s of 8 kHz PCM audio second
        let path = fixture("video_with_audio.mp4");
        let waveform = track(SymphoniaDemuxer.extract_audio(&path).unwrap());
        assert_eq!(waveform.sample_rate, 8_000);
        assert_eq!(waveform.samples.len(), 40_000);
        assert_abs_diff_eq!(waveform.duration_secs(), 5.0, epsilon = 1e-6);

        let rms = (waveform.samples.iter().map(|s| s * s).sum::<f32>()
            / waveform.samples.len() as f32)
            .sqrt();
        assert_abs_diff_eq!(rms, 0.5 * std::f32::consts::FRAC_1_SQRT_2, epsilon = 0.01);
    }

    #[test]
    fn video_without_audio_reports_absence() {
        let demuxed = SymphoniaDemuxer
            .extract_audio(&fixture("video_only.mp4"))
            .unwrap();
        assert_eq!(demuxed, DemuxedAudio::NoAudio);
    }

    #[test]
    fn audio_without_a_decoder_is_an_error() {
        let err = SymphoniaDemuxer
            .extract_audio(&fixture("opus_only.mp4"))
            .unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedCodec(codec) if codec == CODEC_TYPE_OPUS));
    }

    #[test]
    fn corrupted_container_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mp4");
        std::fs::write(&path, [0x13u8; 4096]).unwrap();
        assert!(SymphoniaDemuxer.extract_audio(&path).is_err());
    }
}
