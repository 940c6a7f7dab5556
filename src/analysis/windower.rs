// StreamingWindower - sliding analysis and classifier buffers
//
// Two fixed-size buffers advance by one hop per step:
// - short buffer (n_fft samples) feeds the spectral analyzer and the gate
// - long buffer (model_input_size samples) is the classifier waveform
// Each step shifts both left by `hop` in place and appends the newest hop,
// normalized to [-1, 1), at the tail. No allocation after construction.

use crate::error::DspError;
use crate::PCM_SCALE;

#[derive(Debug, Clone)]
pub struct StreamingWindower {
    hop: usize,
    short: Vec<f32>,
    long: Vec<f32>,
    hops_processed: u64,
}

impl StreamingWindower {
    pub fn new(n_fft: usize, hop: usize, model_input_size: usize) -> Result<Self, DspError> {
        if hop == 0 || hop > n_fft || hop > model_input_size {
            return Err(DspError::InvalidConfig {
                reason: format!(
                    "hop {} must be in 1..=min(n_fft {}, model_input_size {})",
                    hop, n_fft, model_input_size
                ),
            });
        }
        Ok(Self {
            hop,
            short: vec![0.0; n_fft],
            long: vec![0.0; model_input_size],
            hops_processed: 0,
        })
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Append one hop of 16-bit PCM
    pub fn push_pcm(&mut self, chunk: &[i16]) -> Result<(), DspError> {
        self.check_len(chunk.len())?;
        Self::shift_in(&mut self.short, chunk.iter().map(|&s| s as f32 * PCM_SCALE));
        Self::shift_in(&mut self.long, chunk.iter().map(|&s| s as f32 * PCM_SCALE));
        self.hops_processed += 1;
        Ok(())
    }

    /// Append one hop of already-normalized samples
    pub fn push_normalized(&mut self, chunk: &[f32]) -> Result<(), DspError> {
        self.check_len(chunk.len())?;
        Self::shift_in(&mut self.short, chunk.iter().copied());
        Self::shift_in(&mut self.long, chunk.iter().copied());
        self.hops_processed += 1;
        Ok(())
    }

    fn check_len(&self, len: usize) -> Result<(), DspError> {
        if len != self.hop {
            return Err(DspError::SizeMismatch {
                context: "windower hop chunk",
                expected: self.hop,
                actual: len,
            });
        }
        Ok(())
    }

    fn shift_in(buffer: &mut [f32], samples: impl ExactSizeIterator<Item = f32>) {
        let hop = samples.len();
        let len = buffer.len();
        buffer.copy_within(hop.., 0);
        for (dst, sample) in buffer[len - hop..].iter_mut().zip(samples) {
            *dst = sample;
        }
    }

    /// Most recent `n_fft` samples, oldest first
    pub fn analysis_frame(&self) -> &[f32] {
        &self.short
    }

    /// Most recent `model_input_size` samples, oldest first
    pub fn classifier_window(&self) -> &[f32] {
        &self.long
    }

    pub fn hops_processed(&self) -> u64 {
        self.hops_processed
    }

    pub fn is_warmed_up(&self, min_hops: u64) -> bool {
        self.hops_processed >= min_hops
    }

    pub fn reset(&mut self) {
        self.short.fill(0.0);
        self.long.fill(0.0);
        self.hops_processed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_hop_is_rejected() {
        assert!(StreamingWindower::new(512, 0, 15_600).is_err());
        assert!(StreamingWindower::new(512, 513, 15_600).is_err());
        assert!(StreamingWindower::new(512, 160, 100).is_err());
        assert!(StreamingWindower::new(512, 512, 15_600).is_ok());
    }

    #[test]
    fn test_buffers_start_zeroed() {
        let windower = StreamingWindower::new(512, 160, 15_600).unwrap();
        assert_eq!(windower.analysis_frame().len(), 512);
        assert_eq!(windower.classifier_window().len(), 15_600);
        assert!(windower.analysis_frame().iter().all(|&s| s == 0.0));
        assert!(windower.classifier_window().iter().all(|&s| s == 0.0));
        assert!(!windower.is_warmed_up(1));
        assert!(windower.is_warmed_up(0));
    }

    #[test]
    fn test_pcm_is_normalized() {
        let mut windower = StreamingWindower::new(8, 4, 16).unwrap();
        windower
            .push_pcm(&[i16::MIN, -16384, 16384, i16::MAX])
            .unwrap();
        let tail = &windower.analysis_frame()[4..];
        assert_eq!(tail[0], -1.0);
        assert_eq!(tail[1], -0.5);
        assert_eq!(tail[2], 0.5);
        assert!((tail[3] - 32767.0 / 32768.0).abs() < 1e-7);
    }

    #[test]
    fn test_wrong_chunk_size_is_rejected() {
        let mut windower = StreamingWindower::new(512, 160, 15_600).unwrap();
        assert_eq!(
            windower.push_pcm(&[0; 159]),
            Err(DspError::SizeMismatch {
                context: "windower hop chunk",
                expected: 160,
                actual: 159,
            })
        );
        assert_eq!(windower.hops_processed(), 0);
    }

    #[test]
    fn test_continuity_after_many_hops() {
        let (n_fft, hop, long_len) = (512, 160, 15_600);
        let mut windower = StreamingWindower::new(n_fft, hop, long_len).unwrap();

        // Sample k of the stream carries value k (scaled into PCM range)
        let hops = 150;
        let mut history = Vec::new();
        for h in 0..hops {
            let chunk: Vec<i16> = (0..hop).map(|i| ((h * hop + i) % 30_000) as i16).collect();
            history.extend(chunk.iter().map(|&s| s as f32 * PCM_SCALE));
            windower.push_pcm(&chunk).unwrap();
        }

        assert_eq!(windower.hops_processed(), hops as u64);
        assert_eq!(windower.analysis_frame(), &history[history.len() - n_fft..]);
        assert_eq!(
            windower.classifier_window(),
            &history[history.len() - long_len..]
        );
    }

    #[test]
    fn test_partial_history_is_zero_padded_at_front() {
        let mut windower = StreamingWindower::new(8, 3, 10).unwrap();
        windower.push_normalized(&[0.1, 0.2, 0.3]).unwrap();
        windower.push_normalized(&[0.4, 0.5, 0.6]).unwrap();
        assert_eq!(
            windower.analysis_frame(),
            &[0.0, 0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6]
        );
        assert_eq!(
            windower.classifier_window(),
            &[0.0, 0.0, 0.0, 0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6]
        );
    }

    #[test]
    fn test_reset() {
        let mut windower = StreamingWindower::new(8, 4, 16).unwrap();
        windower.push_normalized(&[1.0; 4]).unwrap();
        windower.reset();
        assert_eq!(windower.hops_processed(), 0);
        assert!(windower.analysis_frame().iter().all(|&s| s == 0.0));
    }
}
