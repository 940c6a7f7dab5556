// DSP error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// DSP error code constants shared with the host application
///
/// Error code range: 3001-3004
pub struct DspErrorCodes {}

impl DspErrorCodes {
    /// Frame or vector length precondition violated
    pub const SIZE_MISMATCH: i32 = 3001;

    /// Coefficient blob has the wrong number of bytes
    pub const ASSET_SIZE_MISMATCH: i32 = 3002;

    /// Coefficient blob or input file could not be read
    pub const ASSET_IO: i32 = 3003;

    /// Detector configuration is inconsistent
    pub const INVALID_CONFIG: i32 = 3004;
}

/// Log a DSP error with structured context
///
/// DSP errors are never recovered: they abort pipeline construction or the
/// current step, so they are always logged at error level.
pub fn log_dsp_error(err: &DspError, context: &str) {
    error!(
        "DSP error in {}: code={}, component=ClapPipeline, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Signal-processing and asset errors
///
/// `SizeMismatch` is a programming/config error. The asset variants are fatal
/// at startup: a pipeline never runs with partially loaded coefficients.
#[derive(Debug, Clone, PartialEq)]
pub enum DspError {
    /// A frame, spectrum or feature vector had the wrong length
    SizeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A coefficient asset did not contain exactly the expected byte count
    AssetSizeMismatch {
        asset: &'static str,
        expected_bytes: usize,
        actual_bytes: usize,
    },

    /// A coefficient asset or waveform could not be read at all
    AssetIo { asset: String, details: String },

    /// Configuration values are inconsistent with each other
    InvalidConfig { reason: String },
}

impl ErrorCode for DspError {
    fn code(&self) -> i32 {
        match self {
            DspError::SizeMismatch { .. } => DspErrorCodes::SIZE_MISMATCH,
            DspError::AssetSizeMismatch { .. } => DspErrorCodes::ASSET_SIZE_MISMATCH,
            DspError::AssetIo { .. } => DspErrorCodes::ASSET_IO,
            DspError::InvalidConfig { .. } => DspErrorCodes::INVALID_CONFIG,
        }
    }

    fn message(&self) -> String {
        match self {
            DspError::SizeMismatch {
                context,
                expected,
                actual,
            } => {
                format!(
                    "Size mismatch for {}: expected {}, got {}",
                    context, expected, actual
                )
            }
            DspError::AssetSizeMismatch {
                asset,
                expected_bytes,
                actual_bytes,
            } => {
                format!(
                    "{} asset size mismatch: expected {} bytes, read {}",
                    asset, expected_bytes, actual_bytes
                )
            }
            DspError::AssetIo { asset, details } => {
                format!("Failed to read {}: {}", asset, details)
            }
            DspError::InvalidConfig { reason } => {
                format!("Invalid detector configuration: {}", reason)
            }
        }
    }
}

impl fmt::Display for DspError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DspError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for DspError {}

impl From<std::io::Error> for DspError {
    fn from(err: std::io::Error) -> Self {
        DspError::AssetIo {
            asset: "stream".to_string(),
            details: err.to_string(),
        }
    }
}
