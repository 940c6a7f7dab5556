//! Synthetic waveform generators.
//!
//! All randomness comes from `StdRng` seeded by the caller so every signal is
//! reproducible across runs and platforms.

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f32::consts::PI;

use crate::analysis::assets::encode_f32_le;

/// Seed used when a caller does not care which noise it gets
pub const DEFAULT_SEED: u64 = 0x5A5A_C1A9;

/// Pure sinusoid
pub fn sine(frequency_hz: f32, amplitude: f32, sample_rate: u32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| amplitude * (2.0 * PI * frequency_hz * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Periodic Hann window (matches the frozen analysis window layout)
pub fn hann(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / len as f32).cos())
        .collect()
}

/// Alternating-sign exponentially decaying impulse starting at `onset`
///
/// Fully deterministic: the peak is exactly `amplitude` at `onset`.
pub fn decaying_impulse(len: usize, onset: usize, amplitude: f32, tau_samples: f32) -> Vec<f32> {
    let mut out = vec![0.0; len];
    add_decaying_impulse(&mut out, onset, amplitude, tau_samples);
    out
}

/// Mix a decaying impulse into an existing buffer
pub fn add_decaying_impulse(buffer: &mut [f32], onset: usize, amplitude: f32, tau_samples: f32) {
    let span = (tau_samples * 12.0) as usize;
    for (k, sample) in buffer.iter_mut().skip(onset).take(span).enumerate() {
        let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
        *sample += sign * amplitude * (-(k as f32) / tau_samples).exp();
    }
}

/// Clap-like burst: white noise under a sharp exponential envelope
pub fn noise_burst(len: usize, onset: usize, amplitude: f32, tau_samples: f32, seed: u64) -> Vec<f32> {
    let mut out = vec![0.0; len];
    add_noise_burst(&mut out, onset, amplitude, tau_samples, seed);
    out
}

/// Mix a clap-like burst into an existing buffer
pub fn add_noise_burst(buffer: &mut [f32], onset: usize, amplitude: f32, tau_samples: f32, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let span = (tau_samples * 10.0) as usize;
    for (k, sample) in buffer.iter_mut().skip(onset).take(span).enumerate() {
        let envelope = amplitude * (-(k as f32) / tau_samples).exp();
        *sample += envelope * rng.gen_range(-1.0_f32..1.0);
    }
}

/// Seeded white noise
pub fn white_noise(len: usize, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| rng.gen_range(-amplitude..amplitude))
        .collect()
}

/// Silence with clap bursts at the given times (milliseconds)
pub fn clap_track(sample_rate: u32, duration_ms: u32, clap_times_ms: &[u32], amplitude: f32) -> Vec<f32> {
    let len = (sample_rate as u64 * duration_ms as u64 / 1000) as usize;
    let mut track = vec![0.0; len];
    let tau = sample_rate as f32 * 0.004;
    for (n, &t) in clap_times_ms.iter().enumerate() {
        let onset = (sample_rate as u64 * t as u64 / 1000) as usize;
        add_noise_burst(&mut track, onset, amplitude, tau, DEFAULT_SEED + n as u64);
    }
    track
}

/// Convert normalized samples to 16-bit PCM (clamped)
pub fn to_pcm(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

/// Triangular filterbank evenly spaced over the bins, row-major (mel, freq)
///
/// Stand-in for the frozen mel basis; only its shape matters to the loaders.
pub fn triangular_filterbank(n_mels: usize, n_freq_bins: usize) -> Vec<f32> {
    let mut basis = vec![0.0; n_mels * n_freq_bins];
    let spacing = (n_freq_bins - 1) as f32 / (n_mels + 1) as f32;
    for m in 0..n_mels {
        let left = m as f32 * spacing;
        let center = left + spacing;
        let right = center + spacing;
        for f in 0..n_freq_bins {
            let x = f as f32;
            let weight = if x > left && x <= center {
                (x - left) / spacing
            } else if x > center && x < right {
                (right - x) / spacing
            } else {
                0.0
            };
            basis[m * n_freq_bins + f] = weight;
        }
    }
    basis
}

/// Hann window serialized as the window asset blob
pub fn window_asset_bytes(win_length: usize) -> Vec<u8> {
    encode_f32_le(&hann(win_length))
}

/// Triangular filterbank serialized as the mel basis asset blob
pub fn mel_asset_bytes(n_mels: usize, n_freq_bins: usize) -> Vec<u8> {
    encode_f32_le(&triangular_filterbank(n_mels, n_freq_bins))
}
