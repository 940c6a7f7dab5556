// Error types for the clap detection pipeline
//
// This module defines custom error types for DSP and classifier operations,
// providing structured error handling with error codes suitable for a host
// application across an FFI boundary.

mod classifier;
mod dsp;

pub use classifier::{log_classifier_error, ClassifierError, ClassifierErrorCodes};
pub use dsp::{log_dsp_error, DspError, DspErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the FFI boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_trait_objects() {
        let dsp_err: &dyn ErrorCode = &DspError::SizeMismatch {
            context: "frame",
            expected: 512,
            actual: 400,
        };
        assert_eq!(dsp_err.code(), DspErrorCodes::SIZE_MISMATCH);

        let cls_err: &dyn ErrorCode = &ClassifierError::Unavailable;
        assert_eq!(cls_err.code(), ClassifierErrorCodes::UNAVAILABLE);
    }

    #[test]
    fn test_error_ranges_do_not_overlap() {
        let dsp = [
            DspErrorCodes::SIZE_MISMATCH,
            DspErrorCodes::ASSET_SIZE_MISMATCH,
            DspErrorCodes::ASSET_IO,
            DspErrorCodes::INVALID_CONFIG,
        ];
        let classifier = [
            ClassifierErrorCodes::INFERENCE_FAILED,
            ClassifierErrorCodes::SHAPE_MISMATCH,
            ClassifierErrorCodes::INVALID_OUTPUT,
            ClassifierErrorCodes::UNAVAILABLE,
        ];
        for code in dsp {
            assert!((3001..=3099).contains(&code));
        }
        for code in classifier {
            assert!((4001..=4099).contains(&code));
        }
    }
}
