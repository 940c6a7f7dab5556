// End-to-end detection through the public API: assets on disk, a capture
// feeder, the detector thread and the trigger callback.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap_finder::analysis::assets::{DirectoryAssets, MEL_ASSET, WINDOW_ASSET};
use clap_finder::analysis::sequencer::SequenceOutcome;
use clap_finder::audio::{ChunkPool, HopFeeder};
use clap_finder::testing::signals;
use clap_finder::{
    spawn_detector_thread, ClapPipeline, DetectorConfig, DspError, FixedProbabilityClassifier,
    FnClassifier,
};

fn asset_dir(name: &str, config: &DetectorConfig) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("clap_pipeline_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create asset dir");
    fs::write(
        dir.join(WINDOW_ASSET),
        signals::window_asset_bytes(config.dsp.win_length),
    )
    .expect("write window asset");
    fs::write(
        dir.join(MEL_ASSET),
        signals::mel_asset_bytes(config.dsp.n_mels, config.dsp.n_freq_bins()),
    )
    .expect("write mel asset");
    dir
}

fn quiet_config() -> DetectorConfig {
    let mut config = DetectorConfig::default();
    config.pipeline.telemetry_enabled = false;
    config
}

#[test]
fn clap_sequence_triggers_through_detector_thread() {
    let config = quiet_config();
    let dir = asset_dir("thread", &config);
    let hop = config.dsp.hop_length;

    let classifier = FixedProbabilityClassifier::new(config.dsp.model_input_size, 0.95);
    let pipeline = ClapPipeline::from_assets(
        config.clone(),
        &DirectoryAssets::new(&dir),
        Box::new(classifier),
    )
    .expect("pipeline from assets");

    let (capture, detector) = ChunkPool::new(config.pipeline.chunk_pool_size, hop).split();
    let fired = Arc::new(AtomicUsize::new(0));
    let fired_in = Arc::clone(&fired);
    let running = Arc::new(AtomicBool::new(true));
    let handle = spawn_detector_thread(
        detector,
        pipeline,
        move || {
            fired_in.fetch_add(1, Ordering::SeqCst);
        },
        Arc::clone(&running),
    );

    // Two identical 3 s segments, each holding one group of three claps
    let segment = signals::clap_track(16_000, 3000, &[500, 1000, 1500], 0.8);
    let mut track = segment.clone();
    track.extend_from_slice(&segment);
    let pcm = signals::to_pcm(&track);
    let mut feeder = HopFeeder::new(capture, hop);
    for block in pcm.chunks(1024) {
        while feeder.free_chunks() < 8 {
            thread::sleep(Duration::from_millis(1));
        }
        feeder.push_samples(block);
    }

    running.store(false, Ordering::SeqCst);
    let stats = handle.join().expect("detector thread panicked");

    assert!(stats.error.is_none(), "detector error: {:?}", stats.error);
    assert_eq!(feeder.dropped_chunks(), 0);
    assert_eq!(stats.pipeline.hops, (pcm.len() / hop) as u64);
    assert_eq!(stats.pipeline.claps_counted, 6);
    assert_eq!(stats.pipeline.triggers, 2);
    assert_eq!(fired.load(Ordering::SeqCst), 2);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn two_claps_expire_without_trigger() {
    let config = quiet_config();
    let dir = asset_dir("expire", &config);
    let classifier = FixedProbabilityClassifier::new(config.dsp.model_input_size, 0.95);
    let mut pipeline =
        ClapPipeline::from_assets(config, &DirectoryAssets::new(&dir), Box::new(classifier))
            .expect("pipeline from assets");

    let track = signals::clap_track(16_000, 5000, &[500, 1000], 0.8);
    let mut fired = 0;
    pipeline
        .process_pcm(&signals::to_pcm(&track), &mut || fired += 1)
        .expect("process pcm");

    assert_eq!(fired, 0);
    assert_eq!(pipeline.stats().claps_counted, 2);
    assert_eq!(pipeline.stats().sequences_expired, 1);
    assert_eq!(pipeline.sequencer().count(), 0);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn classifier_veto_blocks_counting() {
    let config = quiet_config();
    let dir = asset_dir("veto", &config);
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in = Arc::clone(&calls);
    let classifier = FnClassifier::new(config.dsp.model_input_size, move |_window: &[f32]| {
        calls_in.fetch_add(1, Ordering::SeqCst);
        Ok(0.1)
    });
    let mut pipeline =
        ClapPipeline::from_assets(config, &DirectoryAssets::new(&dir), Box::new(classifier))
            .expect("pipeline from assets");

    let track = signals::clap_track(16_000, 2500, &[500, 1000, 1500], 0.8);
    let mut fired = 0;
    let pcm = signals::to_pcm(&track);
    let mut outcomes = Vec::new();
    for chunk in pcm.chunks_exact(pipeline.config().dsp.hop_length) {
        outcomes.push(pipeline.process_hop(chunk, &mut || fired += 1).expect("hop"));
    }

    assert_eq!(fired, 0);
    assert!(calls.load(Ordering::SeqCst) >= 3);
    assert_eq!(pipeline.stats().claps_counted, 0);
    assert!(outcomes
        .iter()
        .all(|o| !matches!(o.sequence, Some(SequenceOutcome::Counted { .. }))));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_asset_directory_fails_construction() {
    let config = quiet_config();
    let dir = std::env::temp_dir().join(format!("clap_pipeline_absent_{}", std::process::id()));
    let classifier = FixedProbabilityClassifier::new(config.dsp.model_input_size, 0.95);
    let err = ClapPipeline::from_assets(config, &DirectoryAssets::new(&dir), Box::new(classifier))
        .err()
        .expect("construction should fail");
    assert!(matches!(err, DspError::AssetIo { .. }));
}

#[test]
fn feature_ring_tracks_streamed_audio() {
    let config = quiet_config();
    let dir = asset_dir("features", &config);
    let time_frames = config.dsp.time_frames;
    let n_mels = config.dsp.n_mels;
    let classifier = FixedProbabilityClassifier::new(config.dsp.model_input_size, 0.0);
    let mut pipeline =
        ClapPipeline::from_assets(config, &DirectoryAssets::new(&dir), Box::new(classifier))
            .expect("pipeline from assets");

    let noise = signals::white_noise(16_000, 0.3, 11);
    pipeline
        .process_pcm(&signals::to_pcm(&noise), &mut || {})
        .expect("process pcm");

    let features = pipeline.features();
    assert_eq!(features.len(), time_frames);
    assert!(features.iter().all(|frame| frame.len() == n_mels));
    assert!(pipeline.feature_ring().is_ready());
    // Broadband noise lifts every band well above the silence floor
    let newest = features.last().expect("newest frame");
    assert!(newest.iter().all(|&db| db > clap_finder::SILENCE_DB + 20.0));
    let _ = fs::remove_dir_all(&dir);
}
