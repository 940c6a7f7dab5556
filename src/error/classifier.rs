// Classifier error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Classifier error code constants shared with the host application
///
/// Error code range: 4001-4004
pub struct ClassifierErrorCodes {}

impl ClassifierErrorCodes {
    /// The external model raised an error while running
    pub const INFERENCE_FAILED: i32 = 4001;

    /// Waveform length did not match the model input size
    pub const SHAPE_MISMATCH: i32 = 4002;

    /// The model returned a value outside [0, 1] or a non-finite value
    pub const INVALID_OUTPUT: i32 = 4003;

    /// The model has been closed or was never loaded
    pub const UNAVAILABLE: i32 = 4004;
}

/// Log a classifier error with structured context
///
/// Classifier errors are recovered (probability treated as 0), so they are
/// logged at warn level rather than error.
pub fn log_classifier_error(err: &ClassifierError, context: &str) {
    warn!(
        "Classifier error in {}: code={}, component=ClapClassifier, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors crossing the classifier boundary
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierError {
    /// Inference call failed inside the model runtime
    InferenceFailed { reason: String },

    /// Input waveform length does not match what the model expects
    ShapeMismatch { expected: usize, actual: usize },

    /// Returned score was NaN, infinite, or outside [0, 1]
    InvalidOutput { value: f32 },

    /// Model not loaded or already released
    Unavailable,
}

impl ErrorCode for ClassifierError {
    fn code(&self) -> i32 {
        match self {
            ClassifierError::InferenceFailed { .. } => ClassifierErrorCodes::INFERENCE_FAILED,
            ClassifierError::ShapeMismatch { .. } => ClassifierErrorCodes::SHAPE_MISMATCH,
            ClassifierError::InvalidOutput { .. } => ClassifierErrorCodes::INVALID_OUTPUT,
            ClassifierError::Unavailable => ClassifierErrorCodes::UNAVAILABLE,
        }
    }

    fn message(&self) -> String {
        match self {
            ClassifierError::InferenceFailed { reason } => {
                format!("Classifier inference failed: {}", reason)
            }
            ClassifierError::ShapeMismatch { expected, actual } => {
                format!(
                    "Classifier input size mismatch: expected {}, got {}",
                    expected, actual
                )
            }
            ClassifierError::InvalidOutput { value } => {
                format!("Classifier returned invalid probability {}", value)
            }
            ClassifierError::Unavailable => "Classifier is not available".to_string(),
        }
    }
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClassifierError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ClassifierError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_error_codes() {
        assert_eq!(
            ClassifierError::InferenceFailed {
                reason: "test".to_string()
            }
            .code(),
            ClassifierErrorCodes::INFERENCE_FAILED
        );
        assert_eq!(
            ClassifierError::ShapeMismatch {
                expected: 15600,
                actual: 512
            }
            .code(),
            ClassifierErrorCodes::SHAPE_MISMATCH
        );
        assert_eq!(
            ClassifierError::InvalidOutput { value: 2.0 }.code(),
            ClassifierErrorCodes::INVALID_OUTPUT
        );
        assert_eq!(
            ClassifierError::Unavailable.code(),
            ClassifierErrorCodes::UNAVAILABLE
        );
    }

    #[test]
    fn test_classifier_error_display() {
        let err = ClassifierError::ShapeMismatch {
            expected: 15600,
            actual: 512,
        };
        assert!(err.message().contains("expected 15600"));
        assert!(err.to_string().starts_with("ClassifierError::"));
    }
}
