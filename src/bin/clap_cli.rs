use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clap_finder::analysis::assets::{MEL_ASSET, WINDOW_ASSET};
use clap_finder::config::DspConfig;
use clap_finder::parity::{read_wav_pcm16, ParityRunner};
use clap_finder::{ClapPipeline, DetectorConfig, FixedProbabilityClassifier};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "clap_cli",
    about = "Offline harness for the clap detection pipeline"
)]
struct Cli {
    /// Log verbosity (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Preset {
    /// 512-point FFT, 10ms hop, 96 frames (live microphone geometry)
    Live,
    /// 1024-point FFT, 256-sample hop, 40 frames (reference dump geometry)
    Reference,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dump the log-mel feature matrix of a WAV file as CSV
    Parity {
        #[arg(long)]
        wav: PathBuf,
        /// Directory holding the window and mel basis blobs
        #[arg(long)]
        assets: Option<PathBuf>,
        /// Explicit window blob (overrides --assets)
        #[arg(long)]
        window: Option<PathBuf>,
        /// Explicit mel basis blob (overrides --assets)
        #[arg(long)]
        mel: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Preset::Reference)]
        preset: Preset,
        /// Write CSV here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Stream a WAV file through the detector and report clap events as JSON lines
    Detect {
        #[arg(long)]
        wav: PathBuf,
        #[arg(long)]
        assets: PathBuf,
        /// Detector configuration JSON (defaults when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Constant classifier score; above the confidence threshold the gate decides
        #[arg(long, default_value_t = 0.9)]
        probability: f32,
        /// Exit with code 2 unless exactly this many triggers fire
        #[arg(long)]
        expect_triggers: Option<u64>,
    },
    /// Print the default detector configuration
    Config,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    clap_finder::init_logging(cli.log_level);

    match cli.command {
        Commands::Parity {
            wav,
            assets,
            window,
            mel,
            preset,
            output,
        } => run_parity(&wav, assets, window, mel, preset, output),
        Commands::Detect {
            wav,
            assets,
            config,
            probability,
            expect_triggers,
        } => run_detect(&wav, &assets, config, probability, expect_triggers),
        Commands::Config => run_config(),
    }
}

fn resolve_asset(
    explicit: Option<PathBuf>,
    assets: Option<&Path>,
    name: &str,
) -> Result<PathBuf> {
    match (explicit, assets) {
        (Some(path), _) => Ok(path),
        (None, Some(dir)) => Ok(dir.join(name)),
        (None, None) => bail!("no path for {name}: pass --assets or an explicit blob path"),
    }
}

fn read_blob(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn run_parity(
    wav: &Path,
    assets: Option<PathBuf>,
    window: Option<PathBuf>,
    mel: Option<PathBuf>,
    preset: Preset,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let config = match preset {
        Preset::Live => DspConfig::live(),
        Preset::Reference => DspConfig::parity_reference(),
    };
    let window_path = resolve_asset(window, assets.as_deref(), WINDOW_ASSET)?;
    let mel_path = resolve_asset(mel, assets.as_deref(), MEL_ASSET)?;

    let mut runner = ParityRunner::new(config, &read_blob(&window_path)?, &read_blob(&mel_path)?)
        .context("loading DSP coefficients")?;
    let pcm = read_wav_pcm16(wav).with_context(|| format!("reading {}", wav.display()))?;
    if pcm.sample_rate != runner.config().sample_rate {
        bail!(
            "{} is {} Hz, expected {} Hz",
            wav.display(),
            pcm.sample_rate,
            runner.config().sample_rate
        );
    }

    let matrix = runner
        .run(&pcm.normalized())
        .with_context(|| format!("extracting features from {}", wav.display()))?;

    match output {
        Some(path) => {
            matrix
                .write_csv(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!(
                "Wrote {}x{} feature matrix to {}",
                matrix.n_mels,
                matrix.n_frames,
                path.display()
            );
        }
        None => print!("{}", matrix.to_csv_string()),
    }
    Ok(ExitCode::from(0))
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DetectLine<'a> {
    Impulse {
        timestamp_ms: u64,
        peak: f32,
        probability: f32,
        sequence: Option<&'a clap_finder::analysis::sequencer::SequenceOutcome>,
    },
    Trigger {
        timestamp_ms: u64,
    },
    Summary {
        wav: String,
        duration_ms: u64,
        stats: &'a clap_finder::analysis::PipelineStats,
        trigger_times_ms: &'a [u64],
    },
}

fn run_detect(
    wav: &Path,
    assets: &Path,
    config_path: Option<PathBuf>,
    probability: f32,
    expect_triggers: Option<u64>,
) -> Result<ExitCode> {
    let config = match config_path {
        Some(path) => DetectorConfig::try_load_from_file(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => DetectorConfig::default(),
    };

    let pcm = read_wav_pcm16(wav).with_context(|| format!("reading {}", wav.display()))?;
    if pcm.sample_rate != config.dsp.sample_rate {
        bail!(
            "{} is {} Hz, expected {} Hz",
            wav.display(),
            pcm.sample_rate,
            config.dsp.sample_rate
        );
    }

    let classifier = FixedProbabilityClassifier::new(config.dsp.model_input_size, probability);
    let source = clap_finder::analysis::assets::DirectoryAssets::new(assets);
    let hop = config.dsp.hop_length;
    let mut pipeline = ClapPipeline::from_assets(config, &source, Box::new(classifier))
        .context("building pipeline")?;

    let mut trigger_times = Vec::new();
    for chunk in pcm.samples.chunks_exact(hop) {
        let outcome = pipeline
            .process_hop(chunk, &mut || {})
            .context("processing hop")?;

        if let Some(p) = outcome.probability {
            let line = DetectLine::Impulse {
                timestamp_ms: outcome.now_ms,
                peak: outcome.impulse.diagnostics.peak,
                probability: p,
                sequence: outcome.sequence.as_ref(),
            };
            println!("{}", serde_json::to_string(&line)?);
        }
        if outcome.triggered() {
            trigger_times.push(outcome.now_ms);
            let line = DetectLine::Trigger {
                timestamp_ms: outcome.now_ms,
            };
            println!("{}", serde_json::to_string(&line)?);
        }
    }

    let summary = DetectLine::Summary {
        wav: wav.display().to_string(),
        duration_ms: pipeline.now_ms(),
        stats: pipeline.stats(),
        trigger_times_ms: &trigger_times,
    };
    println!("{}", serde_json::to_string(&summary)?);

    match expect_triggers {
        Some(expected) if expected != trigger_times.len() as u64 => {
            eprintln!(
                "Expected {} trigger(s), observed {}",
                expected,
                trigger_times.len()
            );
            Ok(ExitCode::from(2))
        }
        _ => Ok(ExitCode::from(0)),
    }
}

fn run_config() -> Result<ExitCode> {
    let json = serde_json::to_string_pretty(&DetectorConfig::default())?;
    println!("{json}");
    Ok(ExitCode::from(0))
}
