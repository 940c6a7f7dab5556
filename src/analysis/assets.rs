// Assets module - frozen DSP coefficient blobs
//
// The analysis window and the mel basis are produced offline and shipped as
// flat little-endian f32 arrays. This module decodes them and defines the
// byte-supplier seam the host uses to hand them over (APK assets, files on
// disk, embedded bytes).

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::DspError;

/// Default file name of the analysis window asset
pub const WINDOW_ASSET: &str = "hann_window.bin";
/// Default file name of the mel basis asset
pub const MEL_ASSET: &str = "mel_filterbank.bin";

/// Decode exactly `expected_len` little-endian f32 values
///
/// Any other byte count is a fatal load error: the pipeline must never run
/// with partially loaded coefficients.
pub fn decode_f32_le(
    bytes: &[u8],
    expected_len: usize,
    asset: &'static str,
) -> Result<Vec<f32>, DspError> {
    let expected_bytes = expected_len * 4;
    if bytes.len() != expected_bytes {
        return Err(DspError::AssetSizeMismatch {
            asset,
            expected_bytes,
            actual_bytes: bytes.len(),
        });
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Read a reader to the end and decode it as `expected_len` f32 values
pub fn read_f32_le<R: Read>(
    mut reader: R,
    expected_len: usize,
    asset: &'static str,
) -> Result<Vec<f32>, DspError> {
    let mut bytes = Vec::with_capacity(expected_len * 4);
    reader
        .read_to_end(&mut bytes)
        .map_err(|err| DspError::AssetIo {
            asset: asset.to_string(),
            details: err.to_string(),
        })?;
    decode_f32_le(&bytes, expected_len, asset)
}

/// Encode values as a flat little-endian f32 blob
pub fn encode_f32_le(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Supplier of raw asset bytes
///
/// Loading coefficients from platform storage is the host's concern; the
/// pipeline only needs the bytes.
pub trait AssetSource {
    fn load(&self, name: &str) -> Result<Vec<u8>, DspError>;
}

/// Assets stored as files under one directory
#[derive(Debug, Clone)]
pub struct DirectoryAssets {
    root: PathBuf,
}

impl DirectoryAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for DirectoryAssets {
    fn load(&self, name: &str) -> Result<Vec<u8>, DspError> {
        let path = self.root.join(name);
        fs::read(&path).map_err(|err| DspError::AssetIo {
            asset: path.display().to_string(),
            details: err.to_string(),
        })
    }
}

impl AssetSource for HashMap<String, Vec<u8>> {
    fn load(&self, name: &str) -> Result<Vec<u8>, DspError> {
        self.get(name).cloned().ok_or_else(|| DspError::AssetIo {
            asset: name.to_string(),
            details: "asset not registered".to_string(),
        })
    }
}
