// ImpulseGate - physical plausibility filter for clap candidates
//
// Rejects sounds that do not look like a clap before the classifier sees
// them. Six ordered checks, first failure wins:
// 1. Peak amplitude above threshold
// 2. Attack time (10% point → peak) within limit
// 3. Decay time (peak → 20% point) within limit
// 4. Ringing: secondary peak outside the main event, relative to the peak
// 5. Spectral flatness (geometric / arithmetic mean of the power spectrum)
// 6. High/low frequency energy ratio (2-8kHz vs below 2kHz)
//
// With the shipped thresholds checks 4-6 are permissive, which reduces the
// gate to a peak + envelope test and leaves the rest to the classifier.

use serde::{Deserialize, Serialize};

use crate::config::ImpulseGateConfig;

/// Fraction of the peak that marks the attack start
const ATTACK_FRACTION: f32 = 0.1;
/// Fraction of the peak that marks the decay end
const DECAY_FRACTION: f32 = 0.2;
/// Floor used for spectral logs and empty low-band energy
const SPECTRAL_FLOOR: f64 = 1e-10;
const LOW_BAND_EDGE_HZ: f32 = 2000.0;
const HIGH_BAND_EDGE_HZ: f32 = 8000.0;

/// Which check rejected the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    LowPeak,
    SlowAttack,
    SlowDecay,
    Ringing,
    Tonal,
    Thud,
}

/// Measurements taken while evaluating a frame
///
/// Fields stay `None` for checks that were never reached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpulseDiagnostics {
    pub peak: f32,
    pub peak_index: usize,
    pub attack_ms: Option<f32>,
    pub decay_ms: Option<f32>,
    pub ringing_ratio: Option<f32>,
    pub flatness: Option<f32>,
    pub hf_ratio: Option<f32>,
}

/// Accept/reject verdict plus observability data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpulseDecision {
    pub accepted: bool,
    pub rejection: Option<RejectionReason>,
    pub diagnostics: ImpulseDiagnostics,
}

impl ImpulseDecision {
    fn reject(reason: RejectionReason, diagnostics: ImpulseDiagnostics) -> Self {
        tracing::debug!(
            "[ImpulseGate] Reject {:?} (peak {:.3}, attack {:?} ms, decay {:?} ms, ringing {:?}, flatness {:?}, hf {:?})",
            reason,
            diagnostics.peak,
            diagnostics.attack_ms,
            diagnostics.decay_ms,
            diagnostics.ringing_ratio,
            diagnostics.flatness,
            diagnostics.hf_ratio
        );
        Self {
            accepted: false,
            rejection: Some(reason),
            diagnostics,
        }
    }

    fn accept(diagnostics: ImpulseDiagnostics) -> Self {
        Self {
            accepted: true,
            rejection: None,
            diagnostics,
        }
    }
}

/// Multi-criterion impulse gate
#[derive(Debug, Clone)]
pub struct ImpulseGate {
    config: ImpulseGateConfig,
    sample_rate: u32,
}

impl ImpulseGate {
    pub fn new(config: ImpulseGateConfig, sample_rate: u32) -> Self {
        Self {
            config,
            sample_rate,
        }
    }

    pub fn config(&self) -> &ImpulseGateConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ImpulseGateConfig) {
        self.config = config;
    }

    /// Boolean form of [`Self::evaluate`]
    pub fn is_impulse(&self, buffer: &[f32], spectrum: &[f32]) -> bool {
        self.evaluate(buffer, spectrum).accepted
    }

    /// Run all checks on a raw time-domain frame and its power spectrum
    pub fn evaluate(&self, buffer: &[f32], spectrum: &[f32]) -> ImpulseDecision {
        let cfg = &self.config;
        let mut diag = ImpulseDiagnostics::default();

        // 1. Peak
        let (peak_index, peak) = find_peak(buffer);
        diag.peak = peak;
        diag.peak_index = peak_index;
        if buffer.is_empty() || peak <= cfg.peak_threshold {
            return ImpulseDecision::reject(RejectionReason::LowPeak, diag);
        }

        // 2. Attack: scan backward for the 10% point
        let lookback = self.ms_to_samples(cfg.attack_lookback_ms);
        let scan_start = peak_index.saturating_sub(lookback);
        let attack_threshold = peak * ATTACK_FRACTION;
        let attack_start = (scan_start..=peak_index)
            .rev()
            .find(|&i| buffer[i].abs() < attack_threshold)
            .unwrap_or(scan_start);
        let attack_ms = self.samples_to_ms(peak_index - attack_start);
        diag.attack_ms = Some(attack_ms);
        if attack_ms > cfg.attack_time_max_ms {
            return ImpulseDecision::reject(RejectionReason::SlowAttack, diag);
        }

        // 3. Decay: scan forward for the 20% point; a sound that never decays
        // inside the lookahead runs to the last sample of the buffer
        let lookahead = self.ms_to_samples(cfg.decay_lookahead_ms);
        let scan_end = (peak_index + lookahead).min(buffer.len());
        let decay_threshold = peak * DECAY_FRACTION;
        let decay_end = (peak_index..scan_end)
            .find(|&i| buffer[i].abs() < decay_threshold)
            .unwrap_or(buffer.len() - 1);
        let decay_ms = self.samples_to_ms(decay_end - peak_index);
        diag.decay_ms = Some(decay_ms);
        if decay_ms > cfg.decay_time_max_ms {
            return ImpulseDecision::reject(RejectionReason::SlowDecay, diag);
        }

        // 4. Ringing: loudest sample outside the guarded main event
        let guard = self.ms_to_samples(cfg.ringing_guard_ms);
        let exclusion_start = attack_start.saturating_sub(guard);
        let exclusion_end = (decay_end + guard).min(buffer.len());
        let secondary_peak = buffer
            .iter()
            .enumerate()
            .filter(|(i, _)| *i < exclusion_start || *i > exclusion_end)
            .map(|(_, s)| s.abs())
            .fold(0.0_f32, f32::max);
        let ringing_ratio = secondary_peak / peak;
        diag.ringing_ratio = Some(ringing_ratio);
        if ringing_ratio > cfg.ringing_threshold {
            return ImpulseDecision::reject(RejectionReason::Ringing, diag);
        }

        // 5. Spectral flatness
        let flatness = spectral_flatness(spectrum);
        diag.flatness = Some(flatness);
        if flatness < cfg.spectral_flatness_threshold {
            return ImpulseDecision::reject(RejectionReason::Tonal, diag);
        }

        // 6. High/low frequency energy ratio
        let hf_ratio = self.high_frequency_ratio(spectrum);
        diag.hf_ratio = Some(hf_ratio);
        if hf_ratio < cfg.hf_ratio_threshold {
            return ImpulseDecision::reject(RejectionReason::Thud, diag);
        }

        ImpulseDecision::accept(diag)
    }

    /// Squared power in 2-8kHz divided by squared power below 2kHz
    ///
    /// Bin width is derived from the spectrum length, so it always follows
    /// the analyzer's FFT size rather than the window length.
    fn high_frequency_ratio(&self, spectrum: &[f32]) -> f32 {
        if spectrum.len() < 2 {
            return 0.0;
        }
        let n_fft = (spectrum.len() - 1) * 2;
        let bin_width = self.sample_rate as f32 / n_fft as f32;
        let last_bin = spectrum.len() - 1;
        let idx_low = ((LOW_BAND_EDGE_HZ / bin_width) as usize).min(last_bin);
        let idx_high = ((HIGH_BAND_EDGE_HZ / bin_width) as usize).min(last_bin);

        let energy = |bins: &[f32]| -> f64 {
            bins.iter()
                .map(|&p| {
                    let p = p as f64;
                    p * p
                })
                .sum()
        };
        let mut low = energy(&spectrum[..idx_low]);
        let high = energy(&spectrum[idx_low..idx_high.max(idx_low)]);
        if low == 0.0 {
            low = SPECTRAL_FLOOR;
        }
        (high / low) as f32
    }

    fn ms_to_samples(&self, ms: f32) -> usize {
        (self.sample_rate as f32 * ms / 1000.0) as usize
    }

    fn samples_to_ms(&self, samples: usize) -> f32 {
        samples as f32 / self.sample_rate as f32 * 1000.0
    }
}

/// Index and value of the largest absolute sample (first occurrence)
fn find_peak(buffer: &[f32]) -> (usize, f32) {
    buffer
        .iter()
        .enumerate()
        .fold((0, 0.0_f32), |(best_i, best), (i, s)| {
            let abs = s.abs();
            if abs > best {
                (i, abs)
            } else {
                (best_i, best)
            }
        })
}

/// Geometric mean / arithmetic mean, bins floored at 1e-10
///
/// Returns 0 for an empty spectrum. The floor applies to both means so the
/// result stays within [0, 1].
pub fn spectral_flatness(spectrum: &[f32]) -> f32 {
    if spectrum.is_empty() {
        return 0.0;
    }
    let n = spectrum.len() as f64;
    let (sum_log, sum) = spectrum.iter().fold((0.0_f64, 0.0_f64), |(lg, s), &p| {
        let v = (p as f64).max(SPECTRAL_FLOOR);
        (lg + v.ln(), s + v)
    });
    let geometric_mean = (sum_log / n).exp();
    let arithmetic_mean = sum / n;
    (geometric_mean / arithmetic_mean) as f32
}

#[cfg(test)]
#[path = "impulse_tests.rs"]
mod tests;
