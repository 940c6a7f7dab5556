// Clap Finder Core - Rust Audio Engine
// Streaming log-mel pipeline with a physical impulse gate and a clap sequencer

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod parity;
pub mod telemetry;
pub mod testing;

// Re-exports for convenience
pub use analysis::classifier::{ClapClassifier, FixedProbabilityClassifier, FnClassifier};
pub use analysis::{spawn_detector_thread, ClapPipeline, HopOutcome};
pub use config::DetectorConfig;
pub use error::{ClassifierError, DspError, ErrorCode};

// Parity-locked constants - must match the reference feature pipeline exactly
pub const SAMPLE_RATE: u32 = 16_000;
pub const N_FFT: usize = 512;
pub const HOP_LENGTH: usize = 160; // 10ms at 16kHz
pub const WIN_LENGTH: usize = 400; // 25ms at 16kHz
pub const N_MELS: usize = 64;
pub const TIME_FRAMES: usize = 96;
pub const MODEL_INPUT_SIZE: usize = 15_600; // 0.975s classifier window
pub const WARMUP_HOPS: u64 = 40; // ~400ms before the classifier is consulted
pub const CONFIDENCE_THRESHOLD: f32 = 0.50;

/// Integer PCM to [-1, 1] scale
pub const PCM_SCALE: f32 = 1.0 / 32768.0;
/// Silence sentinel used to pre-fill the feature ring (10 * log10(1e-10))
pub const SILENCE_DB: f32 = -100.0;
/// Power floor applied before log compression
pub const LOG_EPSILON: f32 = 1e-10;
/// Power-to-dB multiplier
pub const LOG_MULTIPLIER: f32 = 10.0;

/// Install the process-wide tracing subscriber
///
/// Safe to call more than once; later calls are ignored. Records from the
/// `log` facade are captured too. Output goes to stderr so stdout
/// stays free for machine-readable reports.
pub fn init_logging(level: tracing::Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_floor_constant_matches_silence() {
        let floor = LOG_MULTIPLIER * LOG_EPSILON.log10();
        assert!((floor - SILENCE_DB).abs() < 1e-4);
    }

    #[test]
    fn test_hop_fits_in_fft() {
        assert!(HOP_LENGTH <= N_FFT);
        assert!(WIN_LENGTH <= N_FFT);
        assert!(N_FFT <= MODEL_INPUT_SIZE);
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(tracing::Level::WARN);
        init_logging(tracing::Level::DEBUG);
    }
}
