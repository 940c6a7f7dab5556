// Window module - frozen analysis window
//
// Applies precomputed window coefficients to a time-domain frame. The window
// may be shorter than the FFT; the remainder of the frame is zero-filled so
// the FFT sees a zero-padded frame.

use std::io::Read;

use crate::analysis::assets::{decode_f32_le, read_f32_le};
use crate::error::DspError;

const ASSET_NAME: &str = "analysis window";

/// Analysis window with coefficients loaded once at startup
#[derive(Debug, Clone)]
pub struct AnalysisWindow {
    coefficients: Vec<f32>,
}

impl AnalysisWindow {
    /// Decode `win_length` coefficients from a flat little-endian blob
    pub fn from_bytes(bytes: &[u8], win_length: usize) -> Result<Self, DspError> {
        Ok(Self {
            coefficients: decode_f32_le(bytes, win_length, ASSET_NAME)?,
        })
    }

    /// Read and decode `win_length` coefficients from a stream
    pub fn from_reader<R: Read>(reader: R, win_length: usize) -> Result<Self, DspError> {
        Ok(Self {
            coefficients: read_f32_le(reader, win_length, ASSET_NAME)?,
        })
    }

    /// Build a window from coefficients already in memory
    pub fn from_coefficients(coefficients: Vec<f32>) -> Self {
        Self { coefficients }
    }

    /// Window length in samples
    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    pub fn coefficients(&self) -> &[f32] {
        &self.coefficients
    }

    /// Window the frame in place and zero-pad everything past the window
    ///
    /// # Errors
    /// `SizeMismatch` if the frame is shorter than the window
    pub fn apply(&self, frame: &mut [f32]) -> Result<(), DspError> {
        let win_length = self.coefficients.len();
        if frame.len() < win_length {
            return Err(DspError::SizeMismatch {
                context: "windowed frame",
                expected: win_length,
                actual: frame.len(),
            });
        }

        let (head, tail) = frame.split_at_mut(win_length);
        for (sample, &coefficient) in head.iter_mut().zip(self.coefficients.iter()) {
            *sample *= coefficient;
        }
        tail.fill(0.0);
        Ok(())
    }
}
