use ndarray::Array2;
use realfft::RealFftPlanner;

use crate::error::AudioError;

pub const N_FFT: usize = 2048;
pub const HOP_LENGTH: usize = 512;
pub const N_MELS: usize = 128;

const AMIN: f32 = 1e-10;
const TOP_DB: f32 = 80.0;

// Slaney mel scale: linear below 1 kHz, logarithmic above.
const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Periodic Hann window.
pub fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / len as f64;
            (0.5 - 0.5 * phase.cos()) as f32
        })
        .collect()
}

/// Triangular mel filters over `[fmin, fmax]` with Slaney area normalisation,
/// shaped `(n_mels, n_fft / 2 + 1)`.
pub fn mel_filterbank(
    sample_rate: u32,
    n_fft: usize,
    n_mels: usize,
    fmin: f64,
    fmax: f64,
) -> Array2<f32> {
    let n_bins = n_fft / 2 + 1;
    let fft_freqs: Vec<f64> = (0..n_bins)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect();

    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);
    let mel_f: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
        .collect();

    let mut weights = Array2::<f32>::zeros((n_mels, n_bins));
    for m in 0..n_mels {
        let lower_width = mel_f[m + 1] - mel_f[m];
        let upper_width = mel_f[m + 2] - mel_f[m + 1];
        let enorm = 2.0 / (mel_f[m + 2] - mel_f[m]);
        for (k, &freq) in fft_freqs.iter().enumerate() {
            let lower = (freq - mel_f[m]) / lower_width;
            let upper = (mel_f[m + 2] - freq) / upper_width;
            weights[[m, k]] = (lower.min(upper).max(0.0) * enorm) as f32;
        }
    }
    weights
}

/// Centred STFT power spectrum shaped `(N_FFT / 2 + 1, frames)`.
///
/// The signal is zero-padded by half a window on both sides, so there are
/// always `1 + len / HOP_LENGTH` frames, even for an empty signal.
pub fn power_spectrogram(samples: &[f32]) -> Result<Array2<f32>, AudioError> {
    let pad = N_FFT / 2;
    let mut padded = vec![0.0f32; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    let frames = 1 + samples.len() / HOP_LENGTH;
    let window = hann_window(N_FFT);
    let mut planner = RealFftPlanner::<f32>::new();
    let r2c = planner.plan_fft_forward(N_FFT);
    let mut input = r2c.make_input_vec();
    let mut spectrum = r2c.make_output_vec();

    let mut power = Array2::<f32>::zeros((N_FFT / 2 + 1, frames));
    for frame in 0..frames {
        let start = frame * HOP_LENGTH;
        for ((slot, &sample), &w) in input
            .iter_mut()
            .zip(&padded[start..start + N_FFT])
            .zip(&window)
        {
            *slot = sample * w;
        }
        r2c.process(&mut input, &mut spectrum)
            .map_err(|err| AudioError::Fft(err.to_string()))?;
        for (bin, value) in spectrum.iter().enumerate() {
            power[[bin, frame]] = value.norm_sqr();
        }
    }
    Ok(power)
}

/// Converts power to decibels relative to the matrix's own maximum, clamped
/// to `TOP_DB` below the peak. The loudest cell is therefore always 0 dB.
pub fn power_to_db(power: &Array2<f32>) -> Array2<f32> {
    let reference = power.fold(0.0f32, |acc, &value| acc.max(value));
    let reference_db = 10.0 * reference.max(AMIN).log10();
    let mut db = power.mapv(|value| 10.0 * value.max(AMIN).log10() - reference_db);
    let peak = db.fold(f32::NEG_INFINITY, |acc, &value| acc.max(value));
    let floor = peak - TOP_DB;
    db.mapv_inplace(|value| value.max(floor));
    db
}
