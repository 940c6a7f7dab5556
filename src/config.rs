//! Configuration management for detector parameter tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling threshold tuning without recompilation. DSP sizes, impulse gate
//! thresholds, sequencer timing, and pipeline behaviour can all be adjusted
//! via the config file. Defaults reproduce the shipped detector.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::DspError;

/// Complete detector configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub dsp: DspConfig,
    pub gate: ImpulseGateConfig,
    pub sequencer: SequencerConfig,
    pub pipeline: PipelineConfig,
}

/// Frame geometry shared by the live pipeline and the parity runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DspConfig {
    /// Input sample rate in Hz (mono only)
    pub sample_rate: u32,
    /// FFT length; the short analysis buffer has exactly this many samples
    pub n_fft: usize,
    /// New samples appended per step
    pub hop_length: usize,
    /// Analysis window length; frames are zero-padded from here to `n_fft`
    pub win_length: usize,
    /// Number of mel bands in the basis matrix
    pub n_mels: usize,
    /// Capacity of the rolling log-mel feature ring
    pub time_frames: usize,
    /// Length of the raw waveform window handed to the classifier
    pub model_input_size: usize,
    /// Uniform scale applied to every power bin; `None` means `1 / n_fft^2`
    pub power_scale: Option<f32>,
}

impl DspConfig {
    /// Live microphone geometry (25ms window, 10ms hop, 512-point FFT)
    pub fn live() -> Self {
        Self {
            sample_rate: crate::SAMPLE_RATE,
            n_fft: crate::N_FFT,
            hop_length: crate::HOP_LENGTH,
            win_length: crate::WIN_LENGTH,
            n_mels: crate::N_MELS,
            time_frames: crate::TIME_FRAMES,
            model_input_size: crate::MODEL_INPUT_SIZE,
            power_scale: None,
        }
    }

    /// Geometry used when validating against the offline reference dump
    pub fn parity_reference() -> Self {
        Self {
            n_fft: 1024,
            hop_length: 256,
            win_length: 1024,
            time_frames: 40,
            ..Self::live()
        }
    }

    /// Number of bins in a one-sided power spectrum
    pub fn n_freq_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Power normalization constant actually applied by the analyzer
    pub fn effective_power_scale(&self) -> f32 {
        self.power_scale
            .unwrap_or_else(|| 1.0 / (self.n_fft as f32 * self.n_fft as f32))
    }

    /// Duration of one hop in milliseconds
    pub fn hop_duration_ms(&self) -> f64 {
        self.hop_length as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Check frame geometry for internal consistency
    pub fn validate(&self) -> Result<(), DspError> {
        let fail = |reason: &str| -> Result<(), DspError> {
            Err(DspError::InvalidConfig {
                reason: reason.to_string(),
            })
        };

        if self.sample_rate == 0 {
            return fail("sample_rate must be > 0");
        }
        if self.n_fft < 2 || self.n_fft % 2 != 0 {
            return fail("n_fft must be an even number >= 2");
        }
        if self.win_length == 0 || self.win_length > self.n_fft {
            return fail("win_length must be in 1..=n_fft");
        }
        if self.hop_length == 0 || self.hop_length > self.n_fft {
            return fail("hop_length must be in 1..=n_fft");
        }
        if self.hop_length > self.model_input_size {
            return fail("hop_length must not exceed model_input_size");
        }
        if self.n_mels == 0 {
            return fail("n_mels must be > 0");
        }
        if self.time_frames == 0 {
            return fail("time_frames must be > 0");
        }
        if let Some(scale) = self.power_scale {
            if !scale.is_finite() || scale <= 0.0 {
                return fail("power_scale must be finite and > 0");
            }
        }
        Ok(())
    }
}

impl Default for DspConfig {
    fn default() -> Self {
        Self::live()
    }
}

/// Physical plausibility thresholds for the impulse gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpulseGateConfig {
    /// Minimum absolute peak amplitude (normalized samples)
    pub peak_threshold: f32,
    /// Maximum time from the 10% point to the peak
    pub attack_time_max_ms: f32,
    /// Maximum time from the peak to the 20% point
    pub decay_time_max_ms: f32,
    /// Maximum secondary-peak / peak ratio outside the main event
    pub ringing_threshold: f32,
    /// Minimum geometric / arithmetic mean of the power spectrum
    pub spectral_flatness_threshold: f32,
    /// Minimum 2-8kHz / below-2kHz squared power ratio
    pub hf_ratio_threshold: f32,
    /// Backward scan limit when locating the attack start
    pub attack_lookback_ms: f32,
    /// Forward scan limit when locating the decay end
    pub decay_lookahead_ms: f32,
    /// Guard region around the main event excluded from the ringing search
    pub ringing_guard_ms: f32,
}

impl ImpulseGateConfig {
    /// Every quality check enabled with its tuned threshold
    pub fn strict() -> Self {
        Self {
            attack_time_max_ms: 20.0,
            decay_time_max_ms: 120.0,
            ringing_threshold: 0.6,
            spectral_flatness_threshold: 0.05,
            hf_ratio_threshold: 0.5,
            ..Self::default()
        }
    }
}

impl Default for ImpulseGateConfig {
    /// Shipped configuration: ringing, flatness and HF ratio effectively
    /// disabled so the classifier decides
    fn default() -> Self {
        Self {
            peak_threshold: 0.05,
            attack_time_max_ms: 30.0,
            decay_time_max_ms: 200.0,
            ringing_threshold: 999.0,
            spectral_flatness_threshold: 0.0,
            hf_ratio_threshold: 0.0,
            attack_lookback_ms: 50.0,
            decay_lookahead_ms: 200.0,
            ringing_guard_ms: 10.0,
        }
    }
}

/// Timing rules for counting claps into a confirmed sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Claps needed to fire the trigger
    pub required_claps: u32,
    /// Events closer than this to the previous clap are treated as echoes
    pub min_interval_ms: u64,
    /// Window measured from the first clap in which the sequence must finish
    pub max_sequence_duration_ms: u64,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            required_claps: 3,
            min_interval_ms: 150,
            max_sequence_duration_ms: 3000,
        }
    }
}

/// Orchestration settings for the streaming pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Hops to process before the classifier is consulted
    pub warmup_hops: u64,
    /// Classifier probability must be strictly greater than this
    pub confidence_threshold: f32,
    /// Maintain the rolling log-mel feature ring on every hop
    pub track_features: bool,
    /// Publish diagnostic events to the telemetry hub
    pub telemetry_enabled: bool,
    /// Number of pre-allocated hop chunks between capture and detector
    pub chunk_pool_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            warmup_hops: crate::WARMUP_HOPS,
            confidence_threshold: crate::CONFIDENCE_THRESHOLD,
            track_features: true,
            telemetry_enabled: true,
            chunk_pool_size: 32,
        }
    }
}

impl DetectorConfig {
    /// Validate every section that has cross-field constraints
    pub fn validate(&self) -> Result<(), DspError> {
        self.dsp.validate()?;

        if self.sequencer.required_claps == 0 {
            return Err(DspError::InvalidConfig {
                reason: "required_claps must be > 0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.pipeline.confidence_threshold) {
            return Err(DspError::InvalidConfig {
                reason: "confidence_threshold must be within [0, 1]".to_string(),
            });
        }
        if self.pipeline.chunk_pool_size == 0 {
            return Err(DspError::InvalidConfig {
                reason: "chunk_pool_size must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match Self::try_load_from_file(&path) {
            Ok(config) => {
                log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                config
            }
            Err(err) => {
                log::warn!(
                    "[Config] Failed to load {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load and validate configuration, surfacing every failure
    pub fn try_load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, DspError> {
        let contents = fs::read_to_string(&path).map_err(|err| DspError::AssetIo {
            asset: path.as_ref().display().to_string(),
            details: err.to_string(),
        })?;
        let config: Self =
            serde_json::from_str(&contents).map_err(|err| DspError::InvalidConfig {
                reason: format!("JSON parse error: {}", err),
            })?;
        config.validate()?;
        Ok(config)
    }
}
