// Analysis module - streaming clap detection pipeline
//
// This module wires the DSP stages into a per-hop pipeline and runs it on a
// dedicated detector thread fed by the chunk pool.
//
// Per hop:
// - StreamingWindower: append the newest hop to the short and long buffers
// - AnalysisWindow → SpectralAnalyzer: windowed power spectrum
// - ImpulseGate: physical plausibility check on the raw short buffer
// - MelProjector → LogCompressor → FeatureRing: rolling log-mel features
// - ClapSequencer: timeout check, then (warm + impulse + confident) count
//
// Time is stream time derived from the hop counter, so replaying the same
// audio always produces the same decisions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rtrb::PopError;
use serde::{Deserialize, Serialize};

use crate::audio::chunk_pool::DetectorChannels;
use crate::config::DetectorConfig;
use crate::error::{log_classifier_error, log_dsp_error, ClassifierError, DspError};
use crate::telemetry::{self, TelemetryHub};

pub mod assets;
pub mod classifier;
pub mod feature_ring;
pub mod impulse;
pub mod mel;
pub mod sequencer;
pub mod spectrum;
pub mod window;
pub mod windower;

use assets::{AssetSource, MEL_ASSET, WINDOW_ASSET};
use classifier::ClapClassifier;
use feature_ring::FeatureRing;
use impulse::{ImpulseDecision, ImpulseGate, RejectionReason};
use mel::{LogCompressor, MelProjector};
use sequencer::{ClapSequencer, SequenceOutcome};
use spectrum::SpectralAnalyzer;
use window::AnalysisWindow;
use windower::StreamingWindower;

/// Everything that happened while processing one hop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopOutcome {
    /// Stream time at the end of this hop
    pub now_ms: u64,
    /// Gate verdict for the current short buffer
    pub impulse: ImpulseDecision,
    /// Classifier score, present only when the classifier was consulted
    pub probability: Option<f32>,
    /// Sequencer transition, present only for a confident clap
    pub sequence: Option<SequenceOutcome>,
    /// An open sequence timed out on this hop
    pub expired: bool,
}

impl HopOutcome {
    pub fn triggered(&self) -> bool {
        matches!(self.sequence, Some(SequenceOutcome::Triggered { .. }))
    }
}

/// Running counters for one pipeline instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub hops: u64,
    pub impulses: u64,
    pub classifications: u64,
    pub classifier_failures: u64,
    pub claps_counted: u64,
    pub echoes_suppressed: u64,
    pub sequences_expired: u64,
    pub triggers: u64,
}

/// Streaming clap detector: DSP front end, gate, classifier and sequencer
pub struct ClapPipeline {
    config: DetectorConfig,

    // DSP Components
    windower: StreamingWindower,
    window: AnalysisWindow,
    analyzer: SpectralAnalyzer,
    mel: MelProjector,
    log: LogCompressor,
    ring: FeatureRing,
    gate: ImpulseGate,
    sequencer: ClapSequencer,
    classifier: Box<dyn ClapClassifier>,

    // Pre-allocated scratch
    frame: Vec<f32>,
    spectrum: Vec<f32>,
    mel_energies: Vec<f32>,
    log_mel: Vec<f32>,
    remainder: Vec<i16>,

    // State
    stats: PipelineStats,
}

impl ClapPipeline {
    /// Build a pipeline from raw coefficient blobs
    ///
    /// # Errors
    /// `InvalidConfig` for inconsistent geometry, `AssetSizeMismatch` when a
    /// blob does not hold exactly the expected number of floats
    pub fn new(
        config: DetectorConfig,
        window_bytes: &[u8],
        mel_bytes: &[u8],
        classifier: Box<dyn ClapClassifier>,
    ) -> Result<Self, DspError> {
        config.validate()?;
        let dsp = &config.dsp;

        let window = AnalysisWindow::from_bytes(window_bytes, dsp.win_length)?;
        let mel = MelProjector::from_bytes(mel_bytes, dsp.n_mels, dsp.n_freq_bins())?;
        let windower = StreamingWindower::new(dsp.n_fft, dsp.hop_length, dsp.model_input_size)?;
        let analyzer = SpectralAnalyzer::with_power_scale(dsp.n_fft, dsp.effective_power_scale());

        if classifier.input_len() != dsp.model_input_size {
            tracing::warn!(
                "[ClapPipeline] Classifier expects {} samples but the window holds {}; every inference will fail",
                classifier.input_len(),
                dsp.model_input_size
            );
        }

        tracing::info!(
            "[ClapPipeline] Ready: n_fft={} hop={} win={} n_mels={} frames={} warmup={} hops",
            dsp.n_fft,
            dsp.hop_length,
            dsp.win_length,
            dsp.n_mels,
            dsp.time_frames,
            config.pipeline.warmup_hops
        );

        Ok(Self {
            windower,
            window,
            analyzer,
            mel,
            log: LogCompressor,
            ring: FeatureRing::new(dsp.n_mels, dsp.time_frames),
            gate: ImpulseGate::new(config.gate.clone(), dsp.sample_rate),
            sequencer: ClapSequencer::new(config.sequencer.clone()),
            classifier,
            frame: vec![0.0; dsp.n_fft],
            spectrum: vec![0.0; dsp.n_freq_bins()],
            mel_energies: vec![0.0; dsp.n_mels],
            log_mel: vec![0.0; dsp.n_mels],
            remainder: Vec::with_capacity(dsp.hop_length),
            stats: PipelineStats::default(),
            config,
        })
    }

    /// Build a pipeline pulling the window and mel basis from `source`
    pub fn from_assets(
        config: DetectorConfig,
        source: &dyn AssetSource,
        classifier: Box<dyn ClapClassifier>,
    ) -> Result<Self, DspError> {
        let window_bytes = source.load(WINDOW_ASSET)?;
        let mel_bytes = source.load(MEL_ASSET)?;
        Self::new(config, &window_bytes, &mel_bytes, classifier)
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn feature_ring(&self) -> &FeatureRing {
        &self.ring
    }

    /// Log-mel matrix, oldest frame first
    pub fn features(&self) -> Vec<Vec<f32>> {
        self.ring.ordered()
    }

    pub fn sequencer(&self) -> &ClapSequencer {
        &self.sequencer
    }

    pub fn windower(&self) -> &StreamingWindower {
        &self.windower
    }

    /// Stream time at the end of the last processed hop
    pub fn now_ms(&self) -> u64 {
        self.windower.hops_processed() * self.config.dsp.hop_length as u64 * 1000
            / self.config.dsp.sample_rate as u64
    }

    fn hub(&self) -> Option<&'static TelemetryHub> {
        if self.config.pipeline.telemetry_enabled {
            Some(telemetry::hub())
        } else {
            None
        }
    }

    /// Process exactly one hop of PCM
    ///
    /// `trigger` is invoked at most once, and only on the hop that completes
    /// a clap sequence.
    pub fn process_hop(
        &mut self,
        pcm: &[i16],
        trigger: &mut dyn FnMut(),
    ) -> Result<HopOutcome, DspError> {
        self.windower.push_pcm(pcm)?;
        self.stats.hops += 1;

        // Spectrum of the windowed, zero-padded short buffer
        self.frame.copy_from_slice(self.windower.analysis_frame());
        self.window.apply(&mut self.frame)?;
        self.analyzer
            .power_spectrum_into(&self.frame, &mut self.spectrum)?;

        // Gate sees the raw samples
        let impulse = self
            .gate
            .evaluate(self.windower.analysis_frame(), &self.spectrum);

        if self.config.pipeline.track_features {
            self.mel
                .project_into(&self.spectrum, &mut self.mel_energies)?;
            self.log.compress_into(&self.mel_energies, &mut self.log_mel)?;
            self.ring.add_frame(&self.log_mel)?;
        }

        let now_ms = self.now_ms();
        let expired = self.sequencer.check_timeout(now_ms);
        if expired {
            self.stats.sequences_expired += 1;
            if let Some(hub) = self.hub() {
                hub.record_expiry(now_ms);
            }
        }

        let mut outcome = HopOutcome {
            now_ms,
            impulse,
            probability: None,
            sequence: None,
            expired,
        };

        if !outcome.impulse.accepted {
            // Silence is the common case; only report shape-based rejections
            if let (Some(hub), Some(reason)) = (self.hub(), outcome.impulse.rejection) {
                if reason != RejectionReason::LowPeak {
                    hub.record_gate_rejection(reason);
                }
            }
            return Ok(outcome);
        }
        self.stats.impulses += 1;

        if !self
            .windower
            .is_warmed_up(self.config.pipeline.warmup_hops)
        {
            tracing::debug!(
                "[ClapPipeline] Impulse at {} ms ignored during warm-up",
                now_ms
            );
            return Ok(outcome);
        }

        let probability = self.run_classifier();
        outcome.probability = Some(probability);

        if probability > self.config.pipeline.confidence_threshold {
            tracing::info!(
                "[ClapPipeline] Clap candidate at {} ms (p={:.3}, peak={:.3})",
                now_ms,
                probability,
                outcome.impulse.diagnostics.peak
            );
            let sequence = self.sequencer.process_event(now_ms);
            self.record_sequence(sequence, now_ms);
            if let SequenceOutcome::Triggered { duration_ms } = sequence {
                tracing::info!(
                    "[ClapPipeline] TRIGGER at {} ms ({} claps in {} ms)",
                    now_ms,
                    self.config.sequencer.required_claps,
                    duration_ms
                );
                trigger();
            }
            outcome.sequence = Some(sequence);
        }

        Ok(outcome)
    }

    /// Feed PCM of any length; whole hops are processed, the rest is kept
    /// for the next call. Returns the number of hops processed.
    pub fn process_pcm(
        &mut self,
        samples: &[i16],
        trigger: &mut dyn FnMut(),
    ) -> Result<usize, DspError> {
        let hop = self.windower.hop();
        let mut processed = 0;
        let mut rest = samples;

        if !self.remainder.is_empty() {
            let take = (hop - self.remainder.len()).min(rest.len());
            self.remainder.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.remainder.len() < hop {
                return Ok(0);
            }
            let staged = std::mem::take(&mut self.remainder);
            let result = self.process_hop(&staged, trigger);
            self.remainder = staged;
            self.remainder.clear();
            result?;
            processed += 1;
        }

        let mut chunks = rest.chunks_exact(hop);
        for chunk in &mut chunks {
            self.process_hop(chunk, trigger)?;
            processed += 1;
        }
        self.remainder.extend_from_slice(chunks.remainder());
        Ok(processed)
    }

    /// Score the long buffer; any classifier failure counts as probability 0
    fn run_classifier(&mut self) -> f32 {
        let waveform = self.windower.classifier_window();
        let started = Instant::now();
        let result = classifier::check_input(self.classifier.as_ref(), waveform)
            .and_then(|_| self.classifier.classify(waveform))
            .and_then(classifier::check_output);
        let inference_ms = started.elapsed().as_secs_f32() * 1000.0;
        self.stats.classifications += 1;

        match result {
            Ok(probability) => {
                if let Some(hub) = self.hub() {
                    hub.record_classification(probability, inference_ms);
                }
                probability
            }
            Err(err) => {
                self.stats.classifier_failures += 1;
                self.report_classifier_error(&err);
                0.0
            }
        }
    }

    fn report_classifier_error(&self, err: &ClassifierError) {
        log_classifier_error(err, "ClapPipeline::process_hop");
        if let Some(hub) = self.hub() {
            hub.record_error(err, "classifier");
            hub.record_status("classifier failure treated as probability 0");
        }
    }

    fn record_sequence(&mut self, sequence: SequenceOutcome, now_ms: u64) {
        let hub = self.hub();
        match sequence {
            SequenceOutcome::Counted { count } => {
                self.stats.claps_counted += 1;
                if let Some(hub) = hub {
                    hub.record_clap(count, now_ms);
                }
            }
            SequenceOutcome::EchoSuppressed { interval_ms } => {
                self.stats.echoes_suppressed += 1;
                if let Some(hub) = hub {
                    hub.record_echo(interval_ms);
                }
            }
            SequenceOutcome::Triggered { .. } => {
                self.stats.claps_counted += 1;
                self.stats.triggers += 1;
                if let Some(hub) = hub {
                    hub.record_clap(self.config.sequencer.required_claps, now_ms);
                    hub.record_trigger(now_ms);
                }
            }
        }
    }

    /// Return to the freshly constructed state, keeping loaded coefficients
    pub fn reset(&mut self) {
        self.windower.reset();
        self.ring.reset();
        self.sequencer.reset();
        self.remainder.clear();
        self.stats = PipelineStats::default();
    }
}

/// Summary returned by the detector thread when it exits
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorStats {
    pub pipeline: PipelineStats,
    /// Chunks that could not be handed back to the pool
    pub lost_chunks: u64,
    /// Fatal DSP error that stopped the loop, if any
    pub error: Option<String>,
}

/// Run `pipeline` on a dedicated thread until `running` clears
///
/// The loop drains every queued hop before honouring the stop flag, then
/// drops the pipeline and returns its counters.
pub fn spawn_detector_thread<F>(
    mut channels: DetectorChannels,
    mut pipeline: ClapPipeline,
    mut trigger: F,
    running: Arc<AtomicBool>,
) -> JoinHandle<DetectorStats>
where
    F: FnMut() + Send + 'static,
{
    thread::spawn(move || {
        tracing::info!("[DetectorThread] Starting detection loop");
        let mut stats = DetectorStats::default();

        loop {
            let chunk = match channels.data_consumer.pop() {
                Ok(chunk) => chunk,
                Err(PopError::Empty) => {
                    // Only stop once the queue is drained
                    if !running.load(Ordering::SeqCst) {
                        tracing::info!("[DetectorThread] Stop requested and queue empty, exiting");
                        break;
                    }
                    thread::sleep(Duration::from_millis(1));
                    continue;
                }
            };

            let result = pipeline.process_hop(&chunk, &mut trigger);

            if channels.pool_producer.push(chunk).is_err() {
                stats.lost_chunks += 1;
                tracing::warn!("[DetectorThread] Pool queue full, dropping chunk");
            }

            if let Err(err) = result {
                log_dsp_error(&err, "DetectorThread");
                telemetry::hub().record_error(&err, "detector thread");
                stats.error = Some(err.to_string());
                break;
            }
        }

        stats.pipeline = pipeline.stats().clone();
        tracing::info!(
            "[DetectorThread] Stopped after {} hops ({} triggers)",
            stats.pipeline.hops,
            stats.pipeline.triggers
        );
        drop(pipeline);
        stats
    })
}
