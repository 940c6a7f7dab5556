//! Offline parity path.
//!
//! Runs a whole waveform through the same window → power → mel → log →
//! ring chain as the live pipeline, but framed the way the reference dump is
//! produced: frames start at `i * hop` with no centering or padding, and the
//! final ordered matrix is written as 6-decimal CSV text (one row per mel
//! band). Two runs over the same input must produce byte-identical output.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::analysis::feature_ring::FeatureRing;
use crate::analysis::mel::{LogCompressor, MelProjector};
use crate::analysis::spectrum::SpectralAnalyzer;
use crate::analysis::window::AnalysisWindow;
use crate::config::DspConfig;
use crate::error::DspError;
use crate::PCM_SCALE;

/// Ordered log-mel matrix, row-major (mel, time), oldest frame first
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub n_mels: usize,
    pub n_frames: usize,
    pub data: Vec<f32>,
}

impl FeatureMatrix {
    pub fn row(&self, mel: usize) -> &[f32] {
        &self.data[mel * self.n_frames..(mel + 1) * self.n_frames]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.n_frames.max(1))
    }

    /// `{:.6}` values, comma-separated, one `\n`-terminated line per mel band
    pub fn to_csv_string(&self) -> String {
        let mut out = String::with_capacity(self.data.len() * 12);
        for row in self.rows() {
            for (t, value) in row.iter().enumerate() {
                if t > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{:.6}", value);
            }
            out.push('\n');
        }
        out
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), DspError> {
        fs::write(&path, self.to_csv_string()).map_err(|err| DspError::AssetIo {
            asset: path.as_ref().display().to_string(),
            details: err.to_string(),
        })
    }
}

/// Whole-file feature extractor for reference comparisons
pub struct ParityRunner {
    config: DspConfig,
    window: AnalysisWindow,
    analyzer: SpectralAnalyzer,
    mel: MelProjector,
    log: LogCompressor,
    ring: FeatureRing,
    frame: Vec<f32>,
    spectrum: Vec<f32>,
    mel_energies: Vec<f32>,
    log_mel: Vec<f32>,
}

impl ParityRunner {
    pub fn new(config: DspConfig, window_bytes: &[u8], mel_bytes: &[u8]) -> Result<Self, DspError> {
        config.validate()?;
        let window = AnalysisWindow::from_bytes(window_bytes, config.win_length)?;
        let mel = MelProjector::from_bytes(mel_bytes, config.n_mels, config.n_freq_bins())?;

        Ok(Self {
            analyzer: SpectralAnalyzer::with_power_scale(
                config.n_fft,
                config.effective_power_scale(),
            ),
            ring: FeatureRing::new(config.n_mels, config.time_frames),
            frame: vec![0.0; config.n_fft],
            spectrum: vec![0.0; config.n_freq_bins()],
            mel_energies: vec![0.0; config.n_mels],
            log_mel: vec![0.0; config.n_mels],
            log: LogCompressor,
            window,
            mel,
            config,
        })
    }

    pub fn config(&self) -> &DspConfig {
        &self.config
    }

    /// Number of frames `run` will compute for a waveform of `len` samples
    pub fn frame_count(&self, len: usize) -> usize {
        if len < self.config.n_fft {
            0
        } else {
            (len - self.config.n_fft) / self.config.hop_length + 1
        }
    }

    /// Extract the ordered feature matrix for a normalized waveform
    pub fn run(&mut self, waveform: &[f32]) -> Result<FeatureMatrix, DspError> {
        self.ring.reset();
        let n_fft = self.config.n_fft;
        let hop = self.config.hop_length;
        let frames = self.frame_count(waveform.len());

        tracing::info!(
            "[Parity] {} samples -> {} frames (n_fft={}, hop={})",
            waveform.len(),
            frames,
            n_fft,
            hop
        );

        for i in 0..frames {
            let start = i * hop;
            self.frame.copy_from_slice(&waveform[start..start + n_fft]);
            self.window.apply(&mut self.frame)?;
            self.analyzer
                .power_spectrum_into(&self.frame, &mut self.spectrum)?;
            self.mel
                .project_into(&self.spectrum, &mut self.mel_energies)?;
            self.log.compress_into(&self.mel_energies, &mut self.log_mel)?;

            if i == 0 {
                self.dump_first_frame();
            }

            self.ring.add_frame(&self.log_mel)?;
        }

        let mut data = vec![0.0; self.config.n_mels * self.config.time_frames];
        self.ring.ordered_into(&mut data)?;
        Ok(FeatureMatrix {
            n_mels: self.config.n_mels,
            n_frames: self.config.time_frames,
            data,
        })
    }

    fn dump_first_frame(&self) {
        let head = |values: &[f32]| -> Vec<f32> { values.iter().take(5).copied().collect() };
        tracing::debug!("[Parity] frame 0 windowed[..5]: {:?}", head(&self.frame));
        tracing::debug!("[Parity] frame 0 power[..5]: {:?}", head(&self.spectrum));
        tracing::debug!("[Parity] frame 0 mel[..5]: {:?}", head(&self.mel_energies));
        tracing::debug!("[Parity] frame 0 log-mel[..5]: {:?}", head(&self.log_mel));
    }
}

/// Mono 16-bit PCM read from a WAV file
#[derive(Debug, Clone, PartialEq)]
pub struct WavPcm {
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

impl WavPcm {
    /// Samples scaled into [-1, 1)
    pub fn normalized(&self) -> Vec<f32> {
        self.samples.iter().map(|&s| s as f32 * PCM_SCALE).collect()
    }
}

fn wav_error(path: &Path, details: impl Into<String>) -> DspError {
    DspError::AssetIo {
        asset: path.display().to_string(),
        details: details.into(),
    }
}

/// Read a mono 16-bit integer WAV file
pub fn read_wav_pcm16<P: AsRef<Path>>(path: P) -> Result<WavPcm, DspError> {
    let path = path.as_ref();
    let mut reader =
        hound::WavReader::open(path).map_err(|err| wav_error(path, format!("failed to open: {err}")))?;
    let spec = reader.spec();

    if spec.channels != 1 {
        return Err(wav_error(
            path,
            format!("expected mono audio, found {} channels", spec.channels),
        ));
    }
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(wav_error(
            path,
            format!(
                "expected 16-bit integer PCM, found {:?} {}-bit",
                spec.sample_format, spec.bits_per_sample
            ),
        ));
    }

    let samples = reader
        .samples::<i16>()
        .collect::<Result<Vec<i16>, _>>()
        .map_err(|err| wav_error(path, format!("error reading samples: {err}")))?;

    Ok(WavPcm {
        sample_rate: spec.sample_rate,
        samples,
    })
}

/// Read a mono 16-bit WAV file normalized by 1/32768
pub fn load_wav_normalized<P: AsRef<Path>>(path: P) -> Result<Vec<f32>, DspError> {
    Ok(read_wav_pcm16(path)?.normalized())
}

/// Write mono 16-bit PCM as a WAV file
pub fn write_wav_pcm16<P: AsRef<Path>>(
    path: P,
    samples: &[i16],
    sample_rate: u32,
) -> Result<(), DspError> {
    let path = path.as_ref();
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|err| wav_error(path, format!("failed to create: {err}")))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|err| wav_error(path, format!("failed to write: {err}")))?;
    }
    writer
        .finalize()
        .map_err(|err| wav_error(path, format!("failed to finalize: {err}")))
}
