use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphError;
use symphonia::core::formats::{FormatOptions, FormatReader, Track};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::error::AudioError;
use crate::resample::ANALYSIS_SAMPLE_RATE;

/// Only the leading part of a clip is ever analysed.
pub const MAX_DURATION_SECS: usize = 30;

/// Mono PCM samples at a known rate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Waveform {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl Waveform {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

pub struct AudioDecoder;

impl AudioDecoder {
    /// Decodes the first audio track of a file into a mono waveform, capped at
    /// [`MAX_DURATION_SECS`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Waveform, AudioError> {
        let format = probe(path.as_ref())?;
        decode_audio(format)?.ok_or(AudioError::NoAudioTrack)
    }
}

pub(crate) fn probe(path: &Path) -> Result<Box<dyn FormatReader>, AudioError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    Ok(probed.format)
}

/// Containers expose tracks symphonia knows nothing about (video, subtitles)
/// with a null codec type. The first track whose codec has a registered
/// decoder is the audio track.
pub fn select_audio_track(tracks: &[Track]) -> Option<&Track> {
    let codecs = symphonia::default::get_codecs();
    tracks.iter().find(|track| {
        let codec = track.codec_params.codec;
        codec != CODEC_TYPE_NULL && codecs.get_codec(codec).is_some()
    })
}

/// Returns `Ok(None)` when the container holds no audio track at all, and
/// [`AudioError::UnsupportedCodec`] when its only audio has no decoder.
pub(crate) fn decode_audio(
    mut format: Box<dyn FormatReader>,
) -> Result<Option<Waveform>, AudioError> {
    let Some(track) = select_audio_track(format.tracks()) else {
        return match format
            .tracks()
            .iter()
            .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        {
            Some(track) => Err(AudioError::UnsupportedCodec(track.codec_params.codec)),
            None => Ok(None),
        };
    };
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;
    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphError::ResetRequired) => break,
            Err(err) => return Err(err.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphError::DecodeError(reason)) => {
                debug!(reason, "skipping undecodable packet");
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        let spec = *decoded.spec();
        let rate = *sample_rate.get_or_insert(spec.rate);
        let channels = spec.channels.count().max(1);
        let mut interleaved = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        interleaved.copy_interleaved_ref(decoded);
        samples.extend(
            interleaved
                .samples()
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );

        let limit = rate as usize * MAX_DURATION_SECS;
        if samples.len() >= limit {
            samples.truncate(limit);
            break;
        }
    }

    let sample_rate = sample_rate.unwrap_or(ANALYSIS_SAMPLE_RATE);
    debug!(sample_rate, sample_count = samples.len(), "decoded audio track");
    Ok(Some(Waveform::new(sample_rate, samples)))
}
