use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use genre_audio::{
    write_wav, AudioDecoder, DemuxedAudio, MediaDemuxer, MelSpectrogramExtractor, SymphoniaDemuxer,
};
use genre_domain::{ClassificationResult, MediaKind};

use crate::error::ClassifyError;
use crate::model::GenreModel;
use crate::ranking::{rank_top_k, TOP_K};
use crate::staging::StagedFile;

const AUDIO_EXTENSION: &str = "audio";
const VIDEO_EXTENSION: &str = "mp4";
const EXTRACTED_EXTENSION: &str = "wav";

/// Runs media through staging, demuxing, feature extraction, inference and
/// ranking. It is the single place where stage failures become the uniform
/// failure result.
///
/// Holds only read-only state, so one instance is shared by all requests.
pub struct ClassificationService {
    model: Arc<dyn GenreModel>,
    demuxer: Arc<dyn MediaDemuxer>,
    extractor: MelSpectrogramExtractor,
    staging_dir: Option<PathBuf>,
}

impl ClassificationService {
    pub fn new(model: Arc<dyn GenreModel>) -> Self {
        Self {
            model,
            demuxer: Arc::new(SymphoniaDemuxer),
            extractor: MelSpectrogramExtractor::new(),
            staging_dir: None,
        }
    }

    pub fn with_demuxer(mut self, demuxer: Arc<dyn MediaDemuxer>) -> Self {
        self.demuxer = demuxer;
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn classify(&self, kind: MediaKind, bytes: &[u8]) -> ClassificationResult {
        match kind {
            MediaKind::Audio => self.classify_audio(bytes),
            MediaKind::Video => self.classify_video(bytes),
        }
    }

    #[instrument(skip_all, fields(bytes = bytes.len()))]
    pub fn classify_audio(&self, bytes: &[u8]) -> ClassificationResult {
        self.recover(MediaKind::Audio, || self.try_classify_audio(bytes))
    }

    #[instrument(skip_all, fields(bytes = bytes.len()))]
    pub fn classify_video(&self, bytes: &[u8]) -> ClassificationResult {
        self.recover(MediaKind::Video, || self.try_classify_video(bytes))
    }

    pub fn try_classify_audio(&self, bytes: &[u8]) -> Result<ClassificationResult, ClassifyError> {
        let staged = self.stage(AUDIO_EXTENSION, bytes)?;
        self.classify_staged_audio(staged.path())
    }

    /// A container without an audio track yields the failure result with
    /// `has_audio == false` and never reaches feature extraction.
    pub fn try_classify_video(&self, bytes: &[u8]) -> Result<ClassificationResult, ClassifyError> {
        let staged = self.stage(VIDEO_EXTENSION, bytes)?;
        let waveform = match self
            .demuxer
            .extract_audio(staged.path())
            .map_err(ClassifyError::Demux)?
        {
            DemuxedAudio::Track(waveform) => waveform,
            DemuxedAudio::NoAudio => {
                info!("video has no audio track");
                return Ok(ClassificationResult::failure());
            }
        };
        debug!(
            sample_rate = waveform.sample_rate,
            seconds = waveform.duration_secs(),
            "demuxed"
        );

        let extracted = StagedFile::create(self.staging_dir.as_deref(), EXTRACTED_EXTENSION)?;
        write_wav(extracted.path(), &waveform).map_err(ClassifyError::Transcode)?;
        drop(waveform);
        self.classify_staged_audio(extracted.path())
    }

    fn stage(&self, extension: &str, bytes: &[u8]) -> Result<StagedFile, ClassifyError> {
        let staged = StagedFile::with_contents(self.staging_dir.as_deref(), extension, bytes)?;
        debug!("staged");
        Ok(staged)
    }

    fn classify_staged_audio(&self, path: &Path) -> Result<ClassificationResult, ClassifyError> {
        let waveform = AudioDecoder::open(path).map_err(ClassifyError::Decode)?;
        let spectrogram = self
            .extractor
            .extract(&waveform)
            .map_err(ClassifyError::Features)?;
        debug!("extracted");
        let logits = self.model.infer(&spectrogram)?;
        debug!("inferred");
        let ranked = rank_top_k(&logits, TOP_K)?;
        let result = ClassificationResult::from_ranked(ranked)?;
        debug!(genre = ?result.genre, confidence = result.confidence, "ranked");
        Ok(result)
    }

    fn recover<F>(&self, kind: MediaKind, run: F) -> ClassificationResult
    where
        F: FnOnce() -> Result<ClassificationResult, ClassifyError>,
    {
        match panic::catch_unwind(AssertUnwindSafe(run)) {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!(?kind, stage = err.stage(), error = %err, "classification failed");
                ClassificationResult::failure()
            }
            Err(_) => {
                error!(?kind, "classification panicked");
                ClassificationResult::failure()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use genre_audio::{AudioError, Spectrogram, Waveform};
    use genre_domain::{Genre, NUM_GENRES};

    use crate::error::ModelError;
    use crate::model::{GenreCnn, Logits, ParamTensor};

    /// Returns fixed logits and records what it saw.
    struct FixedModel {
        logits: Logits,
        calls: AtomicUsize,
        staged_files: Mutex<Vec<usize>>,
        staging_dir: Option<PathBuf>,
    }

    impl FixedModel {
        fn new(logits: Logits) -> Self {
            Self {
                logits,
                calls: AtomicUsize::new(0),
                staged_files: Mutex::new(Vec::new()),
                staging_dir: None,
            }
        }

        fn watching(mut self, dir: &Path) -> Self {
            self.staging_dir = Some(dir.to_path_buf());
            self
        }
    }

    impl GenreModel for FixedModel {
        fn infer(&self, spectrogram: &Spectrogram) -> Result<Logits, ModelError> {
            assert_eq!(spectrogram.view().dim(), (128, 128));
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(dir) = &self.staging_dir {
                let count = std::fs::read_dir(dir)?.count();
                self.staged_files.lock().unwrap().push(count);
            }
            Ok(self.logits)
        }
    }

    struct PanickingModel;

    impl GenreModel for PanickingModel {
        fn infer(&self, _spectrogram: &Spectrogram) -> Result<Logits, ModelError> {
            panic!("weights corrupted");
        }
    }

    struct FailingModel;

    impl GenreModel for FailingModel {
        fn infer(&self, _spectrogram: &Spectrogram) -> Result<Logits, ModelError> {
            Err(ModelError::NonFinite)
        }
    }

    struct FakeDemuxer(DemuxedAudio);

    impl MediaDemuxer for FakeDemuxer {
        fn extract_audio(&self, path: &Path) -> Result<DemuxedAudio, AudioError> {
            assert!(path.exists());
            Ok(self.0.clone())
        }
    }

    const LOGITS: Logits = [0.0, 1.0, 0.5, 4.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0];

    fn wav_bytes(waveform: &Waveform) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.wav");
        write_wav(&path, waveform).unwrap();
        std::fs::read(path).unwrap()
    }

    fn tone(sample_rate: u32, seconds: usize) -> Waveform {
        let samples = (0..sample_rate as usize * seconds)
            .map(|i| 0.3 * (i as f32 * 0.05).sin())
            .collect();
        Waveform::new(sample_rate, samples)
    }

    fn assert_uniform_failure(result: &ClassificationResult) {
        assert_eq!(result, &ClassificationResult::failure());
        assert_eq!(result.genre, None);
        assert_eq!(result.confidence, 0.0);
        assert!(result.top_3_genres.is_empty());
        assert!(!result.has_audio);
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[test]
    fn audio_is_classified_end_to_end() {
        let staging = tempfile::tempdir().unwrap();
        let model = Arc::new(FixedModel::new(LOGITS).watching(staging.path()));
        let service =
            ClassificationService::new(model.clone()).with_staging_dir(staging.path());

        let result = service.classify_audio(&wav_bytes(&tone(22_050, 3)));
        assert_eq!(result.genre, Some(Genre::Metal));
        assert!(result.has_audio);
        let genres: Vec<Genre> = result.top_3_genres.iter().map(|s| s.genre).collect();
        assert_eq!(genres, [Genre::Metal, Genre::Disco, Genre::Reggae]);
        assert_eq!(result.confidence, result.top_3_genres[0].confidence);

        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*model.staged_files.lock().unwrap(), [1]);
        assert!(dir_is_empty(staging.path()));
    }

    #[test]
    fn silent_clip_is_well_formed() {
        let service = ClassificationService::new(Arc::new(GenreCnn::zeroed()));
        for sample_rate in [8_000, 22_050, 44_100] {
            let silence = Waveform::new(sample_rate, vec![0.0; sample_rate as usize * 10]);
            let result = service.classify_audio(&wav_bytes(&silence));
            assert!(result.has_audio);
            assert_eq!(result.top_3_genres.len(), 3);
            let total: f32 = result.top_3_genres.iter().map(|s| s.confidence).sum();
            assert!(total <= 1.0);
            // all-zero logits: uniform distribution, enumeration order wins
            assert_eq!(result.genre, Some(Genre::Rock));
        }
    }

    #[test]
    fn zeroed_network_with_bias_ranks_by_bias() {
        let mut dict = GenreCnn::zeroed().state_dict();
        let mut bias = vec![0.0; NUM_GENRES];
        bias[Genre::Classical.index()] = 3.0;
        bias[Genre::Jazz.index()] = 2.0;
        bias[Genre::Blues.index()] = 1.0;
        dict.insert(
            "fc2.bias".to_string(),
            ParamTensor {
                shape: vec![NUM_GENRES],
                data: bias,
            },
        );
        let model = GenreCnn::from_state_dict(dict).unwrap();
        let service = ClassificationService::new(Arc::new(model));

        let result = service.classify_audio(&wav_bytes(&tone(16_000, 2)));
        let genres: Vec<Genre> = result.top_3_genres.iter().map(|s| s.genre).collect();
        assert_eq!(genres, [Genre::Classical, Genre::Jazz, Genre::Blues]);
    }

    #[test]
    fn corrupted_audio_yields_failure_and_cleans_up() {
        let staging = tempfile::tempdir().unwrap();
        let model = Arc::new(FixedModel::new(LOGITS));
        let service =
            ClassificationService::new(model.clone()).with_staging_dir(staging.path());

        let result = service.classify_audio(b"\x00\x01garbage that is not audio");
        assert_uniform_failure(&result);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert!(dir_is_empty(staging.path()));
    }

    #[test]
    fn absurd_sample_rate_yields_failure() {
        let staging = tempfile::tempdir().unwrap();
        let model = Arc::new(FixedModel::new(LOGITS));
        let service =
            ClassificationService::new(model.clone()).with_staging_dir(staging.path());
        let bytes = wav_bytes(&Waveform::new(900_000_007, vec![0.1; 100]));

        let err = service.try_classify_audio(&bytes).unwrap_err();
        assert!(matches!(err, ClassifyError::Features(AudioError::Resample(_))));
        assert_uniform_failure(&service.classify_audio(&bytes));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert!(dir_is_empty(staging.path()));
    }

    #[test]
    fn corrupted_video_yields_failure() {
        let staging = tempfile::tempdir().unwrap();
        let service = ClassificationService::new(Arc::new(FixedModel::new(LOGITS)))
            .with_staging_dir(staging.path());

        let result = service.classify(MediaKind::Video, &[0xde, 0xad, 0xbe, 0xef, 0x00, 0x11]);
        assert_uniform_failure(&result);
        assert!(dir_is_empty(staging.path()));
    }

    #[test]
    fn silent_video_skips_extraction() {
        let staging = tempfile::tempdir().unwrap();
        let model = Arc::new(FixedModel::new(LOGITS));
        let service = ClassificationService::new(model.clone())
            .with_demuxer(Arc::new(FakeDemuxer(DemuxedAudio::NoAudio)))
            .with_staging_dir(staging.path());

        let result = service.classify_video(b"pretend mp4 with only a video stream");
        assert_uniform_failure(&result);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert!(dir_is_empty(staging.path()));
    }

    #[test]
    fn video_with_audio_track_is_classified() {
        let staging = tempfile::tempdir().unwrap();
        let model = Arc::new(FixedModel::new(LOGITS).watching(staging.path()));
        let service = ClassificationService::new(model.clone())
            .with_demuxer(Arc::new(FakeDemuxer(DemuxedAudio::Track(tone(44_100, 5)))))
            .with_staging_dir(staging.path());

        let result = service.classify_video(b"pretend mp4 with audio and video streams");
        assert!(result.has_audio);
        assert_eq!(result.top_3_genres.len(), 3);
        assert_eq!(result.genre, Some(Genre::Metal));
        // the video and the extracted audio are both staged during inference
        assert_eq!(*model.staged_files.lock().unwrap(), [2]);
        assert!(dir_is_empty(staging.path()));
    }

    #[test]
    fn mp4_with_video_and_audio_is_classified() {
        let staging = tempfile::tempdir().unwrap();
        let model = Arc::new(FixedModel::new(LOGITS).watching(staging.path()));
        let service =
            ClassificationService::new(model.clone()).with_staging_dir(staging.path());

        let result = service.classify_video(include_bytes!(
            "../../audio/testdata/video_with_audio.mp4"
        ));
        assert!(result.has_audio);
        assert_eq!(result.genre, Some(Genre::Metal));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*model.staged_files.lock().unwrap(), [2]);
        assert!(dir_is_empty(staging.path()));
    }

    #[test]
    fn mp4_without_audio_is_not_classified() {
        let model = Arc::new(FixedModel::new(LOGITS));
        let service = ClassificationService::new(model.clone());

        let result = service.classify_video(include_bytes!("../../audio/testdata/video_only.mp4"));
        assert_uniform_failure(&result);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn audio_only_container_passes_through_real_demuxer() {
        let staging = tempfile::tempdir().unwrap();
        let service = ClassificationService::new(Arc::new(FixedModel::new(LOGITS)))
            .with_staging_dir(staging.path());

        let result = service.classify_video(&wav_bytes(&tone(22_050, 5)));
        assert!(result.has_audio);
        assert_eq!(result.genre, Some(Genre::Metal));
        assert!(dir_is_empty(staging.path()));
    }

    #[test]
    fn inference_errors_are_reported_by_stage() {
        let service = ClassificationService::new(Arc::new(FailingModel));
        let err = service
            .try_classify_audio(&wav_bytes(&tone(22_050, 1)))
            .unwrap_err();
        assert!(matches!(err, ClassifyError::Inference(ModelError::NonFinite)));
        assert_eq!(err.stage(), "inferred");
        assert_uniform_failure(&service.classify_audio(&wav_bytes(&tone(22_050, 1))));
    }

    #[test]
    fn decode_errors_are_reported_by_stage() {
        let service = ClassificationService::new(Arc::new(FailingModel));
        let err = service.try_classify_audio(b"not audio").unwrap_err();
        assert!(matches!(err, ClassifyError::Decode(_)));
        assert_eq!(err.stage(), "extracted");
    }

    #[test]
    fn panics_are_contained_and_files_released() {
        let staging = tempfile::tempdir().unwrap();
        let service =
            ClassificationService::new(Arc::new(PanickingModel)).with_staging_dir(staging.path());

        let result = service.classify_audio(&wav_bytes(&tone(22_050, 1)));
        assert_uniform_failure(&result);
        assert!(dir_is_empty(staging.path()));
    }
}
