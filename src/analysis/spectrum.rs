// Spectrum module - normalized power spectrum via FFT
//
// Computes a one-sided power spectrum (n_fft/2 + 1 bins) from a real frame:
// 1. Copy the frame into a pre-allocated complex buffer (input untouched)
// 2. Forward FFT with a plan built once at construction
// 3. Power = Re² + Im² per bin; DC and Nyquist bins are purely real
// 4. Scale every bin by a uniform constant (reference: 1 / n_fft²)

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::error::DspError;

/// Real-to-power spectral analyzer with pre-allocated buffers
pub struct SpectralAnalyzer {
    n_fft: usize,
    power_scale: f32,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectralAnalyzer {
    /// Create an analyzer using the reference normalization `1 / n_fft²`
    pub fn new(n_fft: usize) -> Self {
        let scale = 1.0 / (n_fft as f32 * n_fft as f32);
        Self::with_power_scale(n_fft, scale)
    }

    /// Create an analyzer with an explicit normalization constant
    pub fn with_power_scale(n_fft: usize, power_scale: f32) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            n_fft,
            power_scale,
            fft,
            buffer: vec![Complex::new(0.0, 0.0); n_fft],
            scratch,
        }
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    /// Number of output bins (n_fft / 2 + 1)
    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn power_scale(&self) -> f32 {
        self.power_scale
    }

    /// Index of the bin nearest to `hz`
    pub fn bin_for_frequency(&self, hz: f32, sample_rate: u32) -> usize {
        let bin = (hz * self.n_fft as f32 / sample_rate as f32).round() as usize;
        bin.min(self.n_bins() - 1)
    }

    /// Compute the power spectrum of `frame` into `out`
    ///
    /// Allocation-free; safe to call every hop.
    ///
    /// # Errors
    /// `SizeMismatch` if `frame.len() != n_fft` or `out.len() != n_fft/2 + 1`
    pub fn power_spectrum_into(&mut self, frame: &[f32], out: &mut [f32]) -> Result<(), DspError> {
        if frame.len() != self.n_fft {
            return Err(DspError::SizeMismatch {
                context: "spectral analyzer input",
                expected: self.n_fft,
                actual: frame.len(),
            });
        }
        let n_bins = self.n_bins();
        if out.len() != n_bins {
            return Err(DspError::SizeMismatch {
                context: "power spectrum output",
                expected: n_bins,
                actual: out.len(),
            });
        }

        for (slot, &sample) in self.buffer.iter_mut().zip(frame.iter()) {
            *slot = Complex::new(sample, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        let nyquist = self.n_fft / 2;
        let dc = self.buffer[0].re;
        out[0] = dc * dc * self.power_scale;
        for k in 1..nyquist {
            let c = self.buffer[k];
            out[k] = (c.re * c.re + c.im * c.im) * self.power_scale;
        }
        let ny = self.buffer[nyquist].re;
        out[nyquist] = ny * ny * self.power_scale;

        Ok(())
    }

    /// Allocating convenience wrapper around [`Self::power_spectrum_into`]
    pub fn power_spectrum(&mut self, frame: &[f32]) -> Result<Vec<f32>, DspError> {
        let mut out = vec![0.0; self.n_bins()];
        self.power_spectrum_into(frame, &mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::signals;

    fn argmax(values: &[f32]) -> usize {
        values
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |(best_i, best), (i, &v)| {
                if v > best {
                    (i, v)
                } else {
                    (best_i, best)
                }
            })
            .0
    }

    #[test]
    fn test_output_length() {
        let mut analyzer = SpectralAnalyzer::new(512);
        let spectrum = analyzer.power_spectrum(&vec![0.0; 512]).unwrap();
        assert_eq!(spectrum.len(), 257);
        assert!(spectrum.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_rejects_wrong_frame_length() {
        let mut analyzer = SpectralAnalyzer::new(512);
        assert!(matches!(
            analyzer.power_spectrum(&vec![0.0; 400]),
            Err(DspError::SizeMismatch {
                expected: 512,
                actual: 400,
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_wrong_output_length() {
        let mut analyzer = SpectralAnalyzer::new(512);
        let mut out = vec![0.0; 256];
        assert!(analyzer
            .power_spectrum_into(&vec![0.0; 512], &mut out)
            .is_err());
    }

    #[test]
    fn test_dc_bin_is_real_and_normalized() {
        let mut analyzer = SpectralAnalyzer::new(512);
        let spectrum = analyzer.power_spectrum(&vec![1.0; 512]).unwrap();
        // Σx = 512, squared and scaled by 1/512² gives exactly 1
        assert!((spectrum[0] - 1.0).abs() < 1e-4);
        assert!(spectrum[1..].iter().all(|&p| p < 1e-6));
    }

    #[test]
    fn test_nyquist_bin_is_real_and_normalized() {
        let mut analyzer = SpectralAnalyzer::new(512);
        let frame: Vec<f32> = (0..512)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let spectrum = analyzer.power_spectrum(&frame).unwrap();
        assert!((spectrum[256] - 1.0).abs() < 1e-4);
        assert!(spectrum[..256].iter().all(|&p| p < 1e-6));
    }

    #[test]
    fn test_sinusoid_peaks_at_nearest_bin() {
        let mut analyzer = SpectralAnalyzer::new(512);
        for &freq in &[250.0_f32, 1000.0, 1234.0, 3000.0, 7000.0] {
            let frame = signals::sine(freq, 0.5, 16_000, 512);
            let spectrum = analyzer.power_spectrum(&frame).unwrap();
            let expected = analyzer.bin_for_frequency(freq, 16_000) as i64;
            let actual = argmax(&spectrum) as i64;
            assert!(
                (actual - expected).abs() <= 1,
                "{} Hz peaked at bin {}, expected ~{}",
                freq,
                actual,
                expected
            );
        }
    }

    #[test]
    fn test_input_frame_is_not_modified() {
        let mut analyzer = SpectralAnalyzer::new(256);
        let frame = signals::sine(440.0, 0.8, 16_000, 256);
        let copy = frame.clone();
        analyzer.power_spectrum(&frame).unwrap();
        assert_eq!(frame, copy);
    }

    #[test]
    fn test_power_scale_is_uniform() {
        let frame = signals::sine(1000.0, 0.5, 16_000, 512);
        let mut reference = SpectralAnalyzer::new(512);
        let mut raw = SpectralAnalyzer::with_power_scale(512, 1.0);
        let scaled = reference.power_spectrum(&frame).unwrap();
        let unscaled = raw.power_spectrum(&frame).unwrap();
        for (s, u) in scaled.iter().zip(unscaled.iter()) {
            let expected = u / (512.0 * 512.0);
            assert!((s - expected).abs() <= expected.abs() * 1e-5 + 1e-12);
        }
    }

    #[test]
    fn test_repeated_calls_are_deterministic() {
        let frame = signals::sine(2500.0, 0.3, 16_000, 512);
        let mut analyzer = SpectralAnalyzer::new(512);
        let first = analyzer.power_spectrum(&frame).unwrap();
        let second = analyzer.power_spectrum(&frame).unwrap();
        assert_eq!(first, second);
    }
}
