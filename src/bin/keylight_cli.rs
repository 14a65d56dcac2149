use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use keylight::analysis::SpectrumPipeline;
use keylight::config::AppConfig;
use keylight::engine::RefreshDriver;
use keylight::lighting::{IntensityMapper, WireColor};
use keylight::protocol::{
    hex_dump, spawn_reply_pump, ChannelTransport, CommandChannel, FrameFormat, LightingDevice,
    StatusCode, SILENT_FLAG,
};
use keylight::telemetry;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "keylight_cli",
    about = "Offline harness for the keyboard lighting pipeline"
)]
struct Cli {
    /// JSON configuration file (defaults are used when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyse a WAV file, printing smoothed bucket levels once per refresh tick
    Analyze {
        #[arg(long)]
        wav: PathBuf,
        /// Print only a per-bucket report for the end of the file
        #[arg(long)]
        summary: bool,
    },
    /// Replay a WAV file through the refresh loop against an emulated keyboard
    Frames {
        #[arg(long)]
        wav: PathBuf,
    },
    /// Print the effective configuration as JSON
    DumpConfig,
}

#[derive(Serialize)]
struct BucketReport {
    name: String,
    center_hz: f32,
    level: f32,
    led: Option<usize>,
    hsv: Option<[u8; 3]>,
}

#[derive(Serialize)]
struct TickReport {
    tick: usize,
    time_s: f32,
    passes: u64,
    levels: Vec<f32>,
}

#[derive(Serialize)]
struct AnalysisReport {
    sample_rate: u32,
    channels: u16,
    passes: u64,
    buckets: Vec<BucketReport>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

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
    let config = cli
        .config
        .as_ref()
        .map(AppConfig::load_from_file)
        .unwrap_or_default();
    config.validate().context("validating configuration")?;

    match cli.command {
        Commands::Analyze { wav, summary: false } => run_analyze(&config, &wav),
        Commands::Analyze { wav, summary: true } => run_summary(&config, &wav),
        Commands::Frames { wav } => run_frames(&config, &wav),
        Commands::DumpConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::from(0))
        }
    }
}

fn run_analyze(config: &AppConfig, wav: &Path) -> Result<ExitCode> {
    let audio = read_wav(wav)?;
    let channels = audio.channels as usize;
    let (mut pipeline, reader) = SpectrumPipeline::new(&config.analysis, audio.sample_rate)?;

    let tick_frames = tick_frames(audio.sample_rate, config.refresh.rate_hz);
    let mut levels = vec![0.0; reader.bucket_count()];
    for (tick, block) in audio.samples.chunks(tick_frames * channels).enumerate() {
        pipeline.process_interleaved(block, channels);
        if !reader.take_fresh() {
            continue;
        }
        reader.read(&mut levels);
        let line = TickReport {
            tick,
            time_s: (tick * tick_frames) as f32 / audio.sample_rate as f32,
            passes: reader.passes(),
            levels: levels.clone(),
        };
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(ExitCode::from(0))
}

fn run_summary(config: &AppConfig, wav: &Path) -> Result<ExitCode> {
    let audio = read_wav(wav)?;
    let (mut pipeline, reader) = SpectrumPipeline::new(&config.analysis, audio.sample_rate)?;
    pipeline.process_interleaved(&audio.samples, audio.channels as usize);

    let levels = reader.snapshot();
    let mapper = IntensityMapper::new(config.lighting.led_map.clone());
    let colors = mapper.map(&levels);

    let buckets = pipeline
        .layout()
        .buckets()
        .iter()
        .enumerate()
        .map(|(i, bucket)| {
            let led = mapper.led_map().get(i).copied();
            BucketReport {
                name: bucket.name.clone(),
                center_hz: bucket.center_hz,
                level: levels[i],
                led,
                hsv: led.map(|led| colors[led].to_wire()),
            }
        })
        .collect();

    let report = AnalysisReport {
        sample_rate: audio.sample_rate,
        channels: audio.channels,
        passes: reader.passes(),
        buckets,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}

fn run_frames(config: &AppConfig, wav: &Path) -> Result<ExitCode> {
    let audio = read_wav(wav)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building runtime")?;

    runtime.block_on(async {
        let (mut pipeline, reader) =
            SpectrumPipeline::new(&config.analysis, audio.sample_rate)?;

        let (transport, outbound) = ChannelTransport::new();
        let channel = Arc::new(CommandChannel::new(
            FrameFormat::from_config(&config.protocol)?,
            Arc::new(transport),
        ));
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let pump = spawn_reply_pump(Arc::clone(&channel), reply_rx);
        let keyboard = tokio::spawn(emulate_keyboard(outbound, reply_tx));

        let stats = reader.clone();
        let device = Arc::new(LightingDevice::new(Arc::clone(&channel)));
        device.initialize().await?;
        let mut driver = RefreshDriver::new(reader, &config.lighting, device)?;

        // One refresh tick worth of audio per step
        let tick_frames = tick_frames(audio.sample_rate, config.refresh.rate_hz);
        let mut light_frames = 0usize;
        for block in audio.samples.chunks(tick_frames * audio.channels as usize) {
            pipeline.process_interleaved(block, audio.channels as usize);
            light_frames += driver.refresh_once().await?;
        }

        // Releasing the last channel handle closes the outbound stream
        pump.abort();
        let _ = pump.await;
        drop(driver);
        drop(channel);
        let total = keyboard.await.context("keyboard emulator")?;

        eprintln!(
            "{} frames total, {} lighting frames, {} analysis passes",
            total,
            light_frames,
            stats.passes()
        );
        let report = telemetry::hub().snapshot();
        eprintln!(
            "{} replies ok, {} rejected, {} failures, round trip avg {:.3}ms max {:.3}ms",
            report.totals.replies_ok,
            report.totals.replies_rejected,
            report.totals.failures,
            report.round_trip.avg_ms,
            report.round_trip.max_ms
        );
        Ok::<_, anyhow::Error>(())
    })?;

    Ok(ExitCode::from(0))
}

/// Audio frames (per channel) covered by one refresh tick
fn tick_frames(sample_rate: u32, rate_hz: u32) -> usize {
    (sample_rate / rate_hz.max(1)).max(1) as usize
}

/// Print every outbound frame and answer non-silent ones with OK
async fn emulate_keyboard(
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    replies: mpsc::UnboundedSender<Vec<u8>>,
) -> usize {
    let mut seen = 0usize;
    while let Some(frame) = outbound.recv().await {
        seen += 1;
        println!("[>] {}", hex_dump(&frame));
        if frame.len() > 1 && frame[1] & SILENT_FLAG == 0 {
            let mut reply = vec![0u8; frame.len()];
            reply[0] = frame[0];
            reply[1] = frame[1];
            reply[2] = StatusCode::Ok.as_byte();
            let _ = replies.send(reply);
        }
    }
    seen
}

struct WavAudio {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

fn read_wav(path: &Path) -> Result<WavAudio> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(|err| anyhow!(err)))
            .collect::<Result<Vec<f32>>>()?,
        hound::SampleFormat::Int => {
            let max = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f32;
            match spec.bits_per_sample {
                16 => reader
                    .samples::<i16>()
                    .map(|sample| sample.map(|v| v as f32 / max).map_err(|err| anyhow!(err)))
                    .collect::<Result<Vec<f32>>>()?,
                24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|v| v as f32 / max).map_err(|err| anyhow!(err)))
                    .collect::<Result<Vec<f32>>>()?,
                other => {
                    return Err(anyhow!(
                        "Unsupported bits per sample {} in {}",
                        other,
                        path.display()
                    ))
                }
            }
        }
    };

    Ok(WavAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}
