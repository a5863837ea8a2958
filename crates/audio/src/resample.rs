use rubato::{FftFixedIn, Resampler};
use tracing::debug;

use crate::error::AudioError;
use crate::io::Waveform;

/// Rate at which every waveform is analysed; the model was trained on it.
pub const ANALYSIS_SAMPLE_RATE: u32 = 22_050;

/// Highest rate accepted on either side of a conversion. The FFT resampler
/// allocates in proportion to the rates, so anything above is refused.
pub const MAX_SAMPLE_RATE: u32 = 768_000;

const CHUNK_SIZE: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Converts a waveform to `target_rate`, compensating the resampler delay so
/// the output is aligned with the input and `ceil(n * target / source)` long.
pub fn resample(waveform: &Waveform, target_rate: u32) -> Result<Waveform, AudioError> {
    if waveform.sample_rate == target_rate {
        return Ok(waveform.clone());
    }
    let supported = 1..=MAX_SAMPLE_RATE;
    if !supported.contains(&waveform.sample_rate) || !supported.contains(&target_rate) {
        return Err(AudioError::Resample(format!(
            "cannot resample {} Hz to {} Hz (supported rates are 1 to {} Hz)",
            waveform.sample_rate, target_rate, MAX_SAMPLE_RATE
        )));
    }
    if waveform.is_empty() {
        return Ok(Waveform::new(target_rate, Vec::new()));
    }

    let input = &waveform.samples;
    let expected = (input.len() as u64 * target_rate as u64)
        .div_ceil(waveform.sample_rate as u64) as usize;
    let mut resampler = FftFixedIn::<f32>::new(
        waveform.sample_rate as usize,
        target_rate as usize,
        CHUNK_SIZE,
        SUB_CHUNKS,
        1,
    )
    .map_err(|err| AudioError::Resample(err.to_string()))?;
    let delay = resampler.output_delay();

    let mut output = Vec::with_capacity(expected + delay + CHUNK_SIZE);
    let mut chunk = Vec::<f32>::with_capacity(CHUNK_SIZE);
    let mut pos = 0;
    while output.len() < expected + delay {
        let needed = resampler.input_frames_next();
        chunk.clear();
        chunk.resize(needed, 0.0);
        if pos < input.len() {
            let end = (pos + needed).min(input.len());
            chunk[..end - pos].copy_from_slice(&input[pos..end]);
        }
        pos += needed;
        let out = resampler
            .process(&[chunk.as_slice()], None)
            .map_err(|err| AudioError::Resample(err.to_string()))?;
        output.extend_from_slice(&out[0]);
    }
    output.drain(..delay);
    output.truncate(expected);

    debug!(
        from = waveform.sample_rate,
        to = target_rate,
        samples = output.len(),
        "resampled waveform"
    );
    Ok(Waveform::new(target_rate, output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::PI;

    fn sine(sample_rate: u32, freq: f32, seconds: f32) -> Waveform {
        let len = (sample_rate as f32 * seconds) as usize;
        let samples = (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        Waveform::new(sample_rate, samples)
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn same_rate_is_identity() {
        let input = sine(ANALYSIS_SAMPLE_RATE, 440.0, 0.1);
        let output = resample(&input, ANALYSIS_SAMPLE_RATE).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn downsampling_preserves_length_and_level() {
        let input = sine(44_100, 440.0, 1.0);
        let output = resample(&input, ANALYSIS_SAMPLE_RATE).unwrap();
        assert_eq!(output.sample_rate, ANALYSIS_SAMPLE_RATE);
        assert_eq!(output.samples.len(), 22_050);
        let middle = &output.samples[2_000..20_000];
        assert_abs_diff_eq!(rms(middle), std::f32::consts::FRAC_1_SQRT_2, epsilon = 0.05);
    }

    #[test]
    fn upsampling_rounds_length_up() {
        let input = Waveform::new(8_000, vec![0.0; 1_001]);
        let output = resample(&input, ANALYSIS_SAMPLE_RATE).unwrap();
        assert_eq!(output.samples.len(), 2_760);
        assert!(output.samples.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn empty_waveform_stays_empty() {
        let output = resample(&Waveform::new(48_000, Vec::new()), ANALYSIS_SAMPLE_RATE).unwrap();
        assert!(output.is_empty());
        assert_eq!(output.sample_rate, ANALYSIS_SAMPLE_RATE);
    }

    #[test]
    fn zero_rate_is_rejected() {
        let result = resample(&Waveform::new(0, vec![0.0; 10]), ANALYSIS_SAMPLE_RATE);
        assert!(matches!(result, Err(AudioError::Resample(_))));
    }

    #[test]
    fn absurd_rates_are_rejected() {
        let result = resample(&Waveform::new(900_000_007, vec![0.1; 100]), ANALYSIS_SAMPLE_RATE);
        assert!(matches!(result, Err(AudioError::Resample(_))));

        let result = resample(&Waveform::new(MAX_SAMPLE_RATE + 1, vec![0.1; 100]), 44_100);
        assert!(matches!(result, Err(AudioError::Resample(_))));

        let result = resample(&Waveform::new(ANALYSIS_SAMPLE_RATE, vec![0.1; 100]), u32::MAX);
        assert!(matches!(result, Err(AudioError::Resample(_))));
    }

    #[test]
    fn highest_supported_rate_is_accepted() {
        let input = Waveform::new(MAX_SAMPLE_RATE, vec![0.0; 7_680]);
        let output = resample(&input, ANALYSIS_SAMPLE_RATE).unwrap();
        assert_eq!(output.samples.len(), 221);
    }
}
