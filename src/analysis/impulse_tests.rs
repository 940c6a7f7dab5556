use super::*;
use crate::analysis::spectrum::SpectralAnalyzer;
use crate::testing::signals;

const SR: u32 = 16_000;

fn default_gate() -> ImpulseGate {
    ImpulseGate::new(ImpulseGateConfig::default(), SR)
}

fn gate_with(config: ImpulseGateConfig) -> ImpulseGate {
    ImpulseGate::new(config, SR)
}

/// Power spectrum of the first 512 samples
fn spectrum_of(buffer: &[f32]) -> Vec<f32> {
    let mut analyzer = SpectralAnalyzer::new(512);
    analyzer.power_spectrum(&buffer[..512]).unwrap()
}

#[test]
fn test_silence_is_low_peak() {
    let buffer = vec![0.0; 512];
    let decision = default_gate().evaluate(&buffer, &spectrum_of(&buffer));
    assert!(!decision.accepted);
    assert_eq!(decision.rejection, Some(RejectionReason::LowPeak));
    assert_eq!(decision.diagnostics.attack_ms, None);
}

#[test]
fn test_empty_buffer_is_rejected() {
    let decision = default_gate().evaluate(&[], &[]);
    assert_eq!(decision.rejection, Some(RejectionReason::LowPeak));
}

#[test]
fn test_peak_must_exceed_threshold() {
    let mut buffer = vec![0.0; 512];
    buffer[100] = 0.05;
    let spectrum = spectrum_of(&buffer);
    let decision = default_gate().evaluate(&buffer, &spectrum);
    assert_eq!(decision.rejection, Some(RejectionReason::LowPeak));

    buffer[100] = 0.051;
    assert!(default_gate().is_impulse(&buffer, &spectrum_of(&buffer)));
}

#[test]
fn test_sharp_clap_is_accepted() {
    let buffer = signals::decaying_impulse(512, 100, 0.8, 20.0);
    let decision = default_gate().evaluate(&buffer, &spectrum_of(&buffer));

    assert!(decision.accepted, "rejected: {:?}", decision);
    assert_eq!(decision.rejection, None);
    assert_eq!(decision.diagnostics.peak_index, 100);
    assert!((decision.diagnostics.peak - 0.8).abs() < 1e-6);
    // One sample of silence before the peak, 33 samples to fall under 20%
    assert!((decision.diagnostics.attack_ms.unwrap() - 0.0625).abs() < 1e-4);
    assert!((decision.diagnostics.decay_ms.unwrap() - 33.0 / 16.0).abs() < 1e-3);
    assert!(decision.diagnostics.hf_ratio.is_some());
}

#[test]
fn test_noise_burst_is_accepted() {
    let buffer = signals::noise_burst(512, 64, 0.7, 64.0, 3);
    assert!(default_gate().is_impulse(&buffer, &spectrum_of(&buffer)));
}

#[test]
fn test_raising_peak_threshold_flips_decision() {
    let buffer = signals::decaying_impulse(512, 50, 0.4, 20.0);
    let spectrum = spectrum_of(&buffer);
    assert!(default_gate().is_impulse(&buffer, &spectrum));

    for threshold in [0.4_f32, 0.41, 0.9] {
        let gate = gate_with(ImpulseGateConfig {
            peak_threshold: threshold,
            ..ImpulseGateConfig::default()
        });
        let decision = gate.evaluate(&buffer, &spectrum);
        assert_eq!(
            decision.rejection,
            Some(RejectionReason::LowPeak),
            "threshold {} should reject a 0.4 peak",
            threshold
        );
    }
}

/// Linear ramp from zero at `start` up to 1.0 at `peak`, silence afterwards
fn ramp(len: usize, start: usize, peak: usize) -> Vec<f32> {
    let mut buffer = vec![0.0; len];
    for i in start..=peak {
        buffer[i] = (i - start) as f32 / (peak - start) as f32;
    }
    buffer
}

#[test]
fn test_slow_attack_is_rejected() {
    // 10% point sits ~720 samples (~45ms) before the peak
    let buffer = ramp(2048, 200, 1000);
    let decision = default_gate().evaluate(&buffer, &spectrum_of(&buffer));
    assert_eq!(decision.rejection, Some(RejectionReason::SlowAttack));
    let attack = decision.diagnostics.attack_ms.unwrap();
    assert!((attack - 45.0).abs() < 0.1, "attack {}", attack);
    assert_eq!(decision.diagnostics.decay_ms, None);
}

#[test]
fn test_attack_not_found_uses_lookback_limit() {
    // Everything within the 50ms lookback stays above 10% of the peak
    let buffer = ramp(2048, 0, 1600);
    let decision = default_gate().evaluate(&buffer, &spectrum_of(&buffer));
    let attack = decision.diagnostics.attack_ms.unwrap();
    assert!((attack - 50.0).abs() < 1e-3, "attack {}", attack);
    assert_eq!(decision.rejection, Some(RejectionReason::SlowAttack));

    let lenient = gate_with(ImpulseGateConfig {
        attack_time_max_ms: 60.0,
        ..ImpulseGateConfig::default()
    });
    assert!(lenient.is_impulse(&buffer, &spectrum_of(&buffer)));
}

/// Instant onset at `peak`, then a linear decay to zero over `decay_len`
fn linear_decay(len: usize, peak: usize, decay_len: usize) -> Vec<f32> {
    let mut buffer = vec![0.0; len];
    for k in 0..decay_len.min(len - peak) {
        buffer[peak + k] = 1.0 - k as f32 / decay_len as f32;
    }
    buffer
}

#[test]
fn test_decay_time_limit() {
    // Falls under 20% after ~2400 samples (~150ms)
    let buffer = linear_decay(4096, 100, 3000);
    let spectrum = spectrum_of(&buffer);

    let decision = default_gate().evaluate(&buffer, &spectrum);
    assert!(decision.accepted, "rejected: {:?}", decision.rejection);
    let decay = decision.diagnostics.decay_ms.unwrap();
    assert!((decay - 150.0).abs() < 0.1, "decay {}", decay);

    let tight = gate_with(ImpulseGateConfig {
        decay_time_max_ms: 100.0,
        ..ImpulseGateConfig::default()
    });
    assert_eq!(
        tight.evaluate(&buffer, &spectrum).rejection,
        Some(RejectionReason::SlowDecay)
    );
}

#[test]
fn test_decay_not_found_uses_last_sample() {
    // Plateau that never drops: the decay end is the last sample
    let mut buffer = vec![0.0; 1000];
    buffer[100..].fill(1.0);
    let decision = default_gate().evaluate(&buffer, &spectrum_of(&buffer));
    let decay = decision.diagnostics.decay_ms.unwrap();
    assert!((decay - 899.0 / 16.0).abs() < 1e-3, "decay {}", decay);
    assert!(decision.accepted);
}

#[test]
fn test_sustained_tone_longer_than_lookahead_is_slow_decay() {
    // 0.8 plateau from index 100 to the end of a 500ms buffer
    let mut buffer = vec![0.0; 8000];
    buffer[100..].fill(0.8);
    let decision = default_gate().evaluate(&buffer, &spectrum_of(&buffer));

    assert!(!decision.accepted);
    assert_eq!(decision.rejection, Some(RejectionReason::SlowDecay));
    let decay = decision.diagnostics.decay_ms.unwrap();
    assert!((decay - 7899.0 / 16.0).abs() < 1e-3, "decay {}", decay);
}

fn double_burst(second_amplitude: f32) -> Vec<f32> {
    let mut buffer = signals::decaying_impulse(4096, 200, 0.8, 20.0);
    signals::add_decaying_impulse(&mut buffer, 2000, second_amplitude, 20.0);
    buffer
}

#[test]
fn test_ringing_is_rejected_when_enabled() {
    let buffer = double_burst(0.56);
    let spectrum = spectrum_of(&buffer);
    let ringing = ImpulseGateConfig {
        ringing_threshold: 0.6,
        ..ImpulseGateConfig::default()
    };

    let decision = gate_with(ringing.clone()).evaluate(&buffer, &spectrum);
    assert_eq!(decision.rejection, Some(RejectionReason::Ringing));
    assert!((decision.diagnostics.ringing_ratio.unwrap() - 0.7).abs() < 1e-4);

    // Shipped threshold never rejects on ringing
    assert!(default_gate().is_impulse(&buffer, &spectrum));

    let quiet_echo = double_burst(0.4);
    assert!(gate_with(ringing).is_impulse(&quiet_echo, &spectrum_of(&quiet_echo)));
}

#[test]
fn test_main_event_tail_is_not_ringing() {
    // Tail samples inside the guarded event must not count as a second peak
    let buffer = signals::decaying_impulse(4096, 200, 0.8, 20.0);
    let gate = gate_with(ImpulseGateConfig {
        ringing_threshold: 0.05,
        ..ImpulseGateConfig::default()
    });
    let decision = gate.evaluate(&buffer, &spectrum_of(&buffer));
    assert!(decision.accepted, "rejected: {:?}", decision);
    assert!(decision.diagnostics.ringing_ratio.unwrap() < 0.05);
}

#[test]
fn test_pure_tone_is_tonal() {
    let buffer = signals::sine(1000.0, 0.5, SR, 512);
    let spectrum = spectrum_of(&buffer);
    let gate = gate_with(ImpulseGateConfig {
        spectral_flatness_threshold: 0.05,
        ..ImpulseGateConfig::default()
    });
    let decision = gate.evaluate(&buffer, &spectrum);
    assert_eq!(decision.rejection, Some(RejectionReason::Tonal));
    assert!(decision.diagnostics.flatness.unwrap() < 0.05);

    // Disabled by default
    assert!(default_gate().is_impulse(&buffer, &spectrum));
}

#[test]
fn test_noise_passes_flatness_check() {
    let buffer = signals::white_noise(512, 0.5, 11);
    let gate = gate_with(ImpulseGateConfig {
        spectral_flatness_threshold: 0.05,
        ..ImpulseGateConfig::default()
    });
    let decision = gate.evaluate(&buffer, &spectrum_of(&buffer));
    assert!(decision.accepted, "rejected: {:?}", decision);
    assert!(decision.diagnostics.flatness.unwrap() > 0.2);
}

#[test]
fn test_low_frequency_thud_is_rejected() {
    let gate = gate_with(ImpulseGateConfig {
        hf_ratio_threshold: 0.5,
        ..ImpulseGateConfig::default()
    });

    let thud = signals::sine(200.0, 0.5, SR, 512);
    let decision = gate.evaluate(&thud, &spectrum_of(&thud));
    assert_eq!(decision.rejection, Some(RejectionReason::Thud));

    let hiss = signals::sine(5000.0, 0.5, SR, 512);
    let decision = gate.evaluate(&hiss, &spectrum_of(&hiss));
    assert!(decision.accepted, "rejected: {:?}", decision);
    assert!(decision.diagnostics.hf_ratio.unwrap() > 0.5);
}

#[test]
fn test_hf_ratio_bins_follow_spectrum_length() {
    let gate = default_gate();

    // 512-point FFT: bin 100 is 3125 Hz, inside the high band
    let mut short = vec![0.0; 257];
    short[100] = 1.0;
    short[10] = 1.0;
    assert!((gate.high_frequency_ratio(&short) - 1.0).abs() < 1e-6);

    // 1024-point FFT: bin 100 is 1562.5 Hz, inside the low band
    let mut long = vec![0.0; 513];
    long[100] = 1.0;
    long[200] = 2.0;
    assert!((gate.high_frequency_ratio(&long) - 4.0).abs() < 1e-6);
}

#[test]
fn test_hf_ratio_with_empty_low_band_uses_floor() {
    let mut spectrum = vec![0.0; 257];
    spectrum[100] = 1.0;
    let ratio = default_gate().high_frequency_ratio(&spectrum);
    assert!((ratio - 1e10).abs() / 1e10 < 1e-4);
}

#[test]
fn test_hf_band_excludes_energy_above_8khz() {
    let mut spectrum = vec![0.0; 257];
    spectrum[10] = 1.0;
    spectrum[256] = 5.0;
    assert_eq!(default_gate().high_frequency_ratio(&spectrum), 0.0);
}

#[test]
fn test_flatness_bounds() {
    assert_eq!(spectral_flatness(&[]), 0.0);
    assert!((spectral_flatness(&[2.0; 16]) - 1.0).abs() < 1e-6);
    // All-zero spectrum floors both means identically
    assert!((spectral_flatness(&[0.0; 16]) - 1.0).abs() < 1e-6);
    assert!(spectral_flatness(&[1.0, 0.0, 0.0, 0.0]) < 1e-3);
}

#[test]
fn test_set_config_takes_effect() {
    let buffer = signals::decaying_impulse(512, 100, 0.3, 20.0);
    let spectrum = spectrum_of(&buffer);
    let mut gate = default_gate();
    assert!(gate.is_impulse(&buffer, &spectrum));

    gate.set_config(ImpulseGateConfig {
        peak_threshold: 0.5,
        ..ImpulseGateConfig::default()
    });
    assert_eq!(gate.config().peak_threshold, 0.5);
    assert!(!gate.is_impulse(&buffer, &spectrum));
}
