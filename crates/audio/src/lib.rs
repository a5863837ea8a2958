pub mod demux;
pub mod dsp;
pub mod error;
pub mod features;
pub mod io;
pub mod resample;
pub mod wav;

pub use demux::{DemuxedAudio, MediaDemuxer, SymphoniaDemuxer};
pub use error::AudioError;
pub use features::{MelSpectrogramExtractor, Spectrogram, SPECTROGRAM_FRAMES};
pub use io::{AudioDecoder, Waveform, MAX_DURATION_SECS};
pub use resample::ANALYSIS_SAMPLE_RATE;
pub use wav::write_wav;
