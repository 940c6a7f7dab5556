// Mel module - mel projection and log compression
//
// MelProjector applies a frozen (n_mels × n_freq_bins) basis to a power
// spectrum. LogCompressor converts mel energies to dB-like features with the
// exact floor and multiplier the reference pipeline uses.

use std::io::Read;

use crate::analysis::assets::{decode_f32_le, read_f32_le};
use crate::error::DspError;
use crate::{LOG_EPSILON, LOG_MULTIPLIER};

const ASSET_NAME: &str = "mel basis";

/// Linear map from power bins to mel bands
#[derive(Debug, Clone)]
pub struct MelProjector {
    n_mels: usize,
    n_freq_bins: usize,
    /// Row-major (mel, freq)
    basis: Vec<f32>,
}

impl MelProjector {
    /// Decode a row-major (mel, freq) basis from a flat little-endian blob
    pub fn from_bytes(bytes: &[u8], n_mels: usize, n_freq_bins: usize) -> Result<Self, DspError> {
        Ok(Self {
            n_mels,
            n_freq_bins,
            basis: decode_f32_le(bytes, n_mels * n_freq_bins, ASSET_NAME)?,
        })
    }

    /// Read and decode a basis from a stream
    pub fn from_reader<R: Read>(
        reader: R,
        n_mels: usize,
        n_freq_bins: usize,
    ) -> Result<Self, DspError> {
        Ok(Self {
            n_mels,
            n_freq_bins,
            basis: read_f32_le(reader, n_mels * n_freq_bins, ASSET_NAME)?,
        })
    }

    pub fn n_mels(&self) -> usize {
        self.n_mels
    }

    pub fn n_freq_bins(&self) -> usize {
        self.n_freq_bins
    }

    /// Weights of one mel band
    pub fn row(&self, mel: usize) -> &[f32] {
        &self.basis[mel * self.n_freq_bins..(mel + 1) * self.n_freq_bins]
    }

    /// `out[m] = Σ_f power[f] * basis[m][f]`
    pub fn project_into(&self, power: &[f32], out: &mut [f32]) -> Result<(), DspError> {
        if power.len() != self.n_freq_bins {
            return Err(DspError::SizeMismatch {
                context: "mel projector input",
                expected: self.n_freq_bins,
                actual: power.len(),
            });
        }
        if out.len() != self.n_mels {
            return Err(DspError::SizeMismatch {
                context: "mel projector output",
                expected: self.n_mels,
                actual: out.len(),
            });
        }

        for (energy, row) in out.iter_mut().zip(self.basis.chunks_exact(self.n_freq_bins)) {
            *energy = row
                .iter()
                .zip(power.iter())
                .fold(0.0_f32, |acc, (&w, &p)| acc + p * w);
        }
        Ok(())
    }

    pub fn project(&self, power: &[f32]) -> Result<Vec<f32>, DspError> {
        let mut out = vec![0.0; self.n_mels];
        self.project_into(power, &mut out)?;
        Ok(out)
    }
}

/// Power-to-dB conversion with a hard epsilon floor
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCompressor;

impl LogCompressor {
    /// `10 * log10(max(x, 1e-10))`; NaN also maps to the floor
    #[inline]
    pub fn compress_value(energy: f32) -> f32 {
        let clamped = if energy > LOG_EPSILON {
            energy
        } else {
            LOG_EPSILON
        };
        LOG_MULTIPLIER * clamped.log10()
    }

    pub fn compress_into(&self, mel: &[f32], out: &mut [f32]) -> Result<(), DspError> {
        if mel.len() != out.len() {
            return Err(DspError::SizeMismatch {
                context: "log compressor output",
                expected: mel.len(),
                actual: out.len(),
            });
        }
        for (dst, &energy) in out.iter_mut().zip(mel.iter()) {
            *dst = Self::compress_value(energy);
        }
        Ok(())
    }

    pub fn compress(&self, mel: &[f32]) -> Vec<f32> {
        mel.iter().map(|&e| Self::compress_value(e)).collect()
    }
}
