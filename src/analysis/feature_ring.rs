// FeatureRing - fixed-capacity circular buffer of log-mel vectors
//
// Storage is a single flat [n_mels][n_frames] array plus a write cursor, so
// every update is O(n_mels) with no allocation. Cells start at the silence
// sentinel so reads before the ring fills are well-defined.

use crate::error::DspError;
use crate::SILENCE_DB;

/// Rolling log-mel feature matrix
#[derive(Debug, Clone)]
pub struct FeatureRing {
    n_mels: usize,
    n_frames: usize,
    /// Row-major (mel, time slot)
    cells: Vec<f32>,
    pos: usize,
    full: bool,
    frames_written: u64,
}

impl FeatureRing {
    pub fn new(n_mels: usize, n_frames: usize) -> Self {
        Self {
            n_mels,
            n_frames,
            cells: vec![SILENCE_DB; n_mels * n_frames],
            pos: 0,
            full: false,
            frames_written: 0,
        }
    }

    pub fn n_mels(&self) -> usize {
        self.n_mels
    }

    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    /// True once every slot has been written at least once
    pub fn is_ready(&self) -> bool {
        self.full
    }

    /// Slot the next frame will be written to
    pub fn cursor(&self) -> usize {
        self.pos
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Write one log-mel vector into the current slot and advance
    pub fn add_frame(&mut self, frame: &[f32]) -> Result<(), DspError> {
        if frame.len() != self.n_mels {
            return Err(DspError::SizeMismatch {
                context: "feature ring frame",
                expected: self.n_mels,
                actual: frame.len(),
            });
        }

        for (m, &value) in frame.iter().enumerate() {
            self.cells[m * self.n_frames + self.pos] = value;
        }

        self.pos = (self.pos + 1) % self.n_frames;
        if self.pos == 0 {
            self.full = true;
        }
        self.frames_written += 1;
        Ok(())
    }

    /// Index of the oldest column in chronological order
    fn oldest(&self) -> usize {
        if self.full {
            self.pos
        } else {
            0
        }
    }

    /// Copy the matrix oldest-first into a flat row-major (mel, time) slice
    pub fn ordered_into(&self, out: &mut [f32]) -> Result<(), DspError> {
        if out.len() != self.cells.len() {
            return Err(DspError::SizeMismatch {
                context: "ordered feature matrix",
                expected: self.cells.len(),
                actual: out.len(),
            });
        }

        for m in 0..self.n_mels {
            self.copy_row_ordered(m, &mut out[m * self.n_frames..(m + 1) * self.n_frames]);
        }
        Ok(())
    }

    /// Matrix of `n_mels` rows × `n_frames` columns, column 0 oldest
    pub fn ordered(&self) -> Vec<Vec<f32>> {
        (0..self.n_mels)
            .map(|m| {
                let mut row = vec![0.0; self.n_frames];
                self.copy_row_ordered(m, &mut row);
                row
            })
            .collect()
    }

    /// `dst` must hold exactly `n_frames` values
    fn copy_row_ordered(&self, mel: usize, dst: &mut [f32]) {
        let oldest = self.oldest();
        let row = &self.cells[mel * self.n_frames..(mel + 1) * self.n_frames];
        let head = self.n_frames - oldest;
        dst[..head].copy_from_slice(&row[oldest..]);
        dst[head..].copy_from_slice(&row[..oldest]);
    }

    /// Refill with silence and rewind the cursor
    pub fn reset(&mut self) {
        self.cells.fill(SILENCE_DB);
        self.pos = 0;
        self.full = false;
        self.frames_written = 0;
    }
}
