//! spikescan CLI entry point.
//!
//! Detects and localizes extracellular spikes in a raw multielectrode
//! recording and writes them to a binary spike file.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use spikescan_core::{points_from_coords, ChannelGraph, CommonReference, DetectionConfig};
use spikescan_io::{RawRecording, RecordLayout, SpikeFileWriter};
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "spikescan")]
#[command(version = VERSION)]
#[command(about = "Streaming spike detection for dense multielectrode arrays", long_about = None)]
struct Args {
    /// Raw recording: little-endian i16 samples, channel-interleaved
    #[arg(short, long)]
    recording: PathBuf,

    /// Probe geometry JSON (see --help for the schema)
    ///
    /// Either a plain array of per-channel coordinates, or an object:
    /// {"positions": [[x, y], ...], "masked_channels": [..]}
    /// Coordinates with more than two dimensions use the last two.
    #[arg(short, long)]
    probe: PathBuf,

    /// Sampling frequency of the recording in Hz
    #[arg(short = 'f', long)]
    sampling_rate: f64,

    /// Number of channels in the recording
    #[arg(short = 'c', long)]
    num_channels: usize,

    /// Output spike file
    #[arg(short, long, default_value = "spikes.bin")]
    output: PathBuf,

    /// Detection configuration JSON; missing fields use defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Detection threshold, in running-deviation units
    #[arg(short, long)]
    threshold: Option<i32>,

    /// Frames per processing chunk
    #[arg(long)]
    chunk_size: Option<i32>,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<i32>,

    /// Skip spike localization
    #[arg(long)]
    no_localize: bool,

    /// Do not store waveform cutouts in the output
    #[arg(long)]
    no_shape: bool,

    /// Suppress duplicates with the amplitude-decay model
    #[arg(long)]
    decay_filtering: bool,

    /// Rescale each channel to a common dynamic range first
    #[arg(long)]
    rescale: bool,

    /// Common reference subtraction: none, median or average
    #[arg(long)]
    common_reference: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Probe geometry file: either a bare coordinate array or this object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProbeFile {
    Coords(Vec<Vec<f32>>),
    Full {
        positions: Vec<Vec<f32>>,
        #[serde(default)]
        masked_channels: Vec<usize>,
    },
}

fn load_config(args: &Args) -> Result<DetectionConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => DetectionConfig::default(),
    };

    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(max_frames) = args.max_frames {
        config.max_frames = Some(max_frames);
    }
    if args.no_localize {
        config.localize = false;
    }
    if args.no_shape {
        config.save_shape = false;
    }
    if args.decay_filtering {
        config.decay_filtering = true;
    }
    if args.rescale {
        config.rescale = true;
    }
    if let Some(mode) = &args.common_reference {
        config.common_reference = match mode.as_str() {
            "none" => CommonReference::None,
            "median" => CommonReference::Median,
            "average" => CommonReference::Average,
            other => anyhow::bail!(
                "unknown common reference '{}'; expected none, median or average",
                other
            ),
        };
    }

    config.validate()?;
    Ok(config)
}

fn load_graph(args: &Args, config: &DetectionConfig) -> Result<ChannelGraph> {
    let text = std::fs::read_to_string(&args.probe)
        .with_context(|| format!("reading probe {}", args.probe.display()))?;
    let probe: ProbeFile = serde_json::from_str(&text)
        .with_context(|| format!("parsing probe {}", args.probe.display()))?;

    let (coords, mut masked) = match probe {
        ProbeFile::Coords(coords) => (coords, Vec::new()),
        ProbeFile::Full {
            positions,
            masked_channels,
        } => (positions, masked_channels),
    };
    if coords.len() != args.num_channels {
        anyhow::bail!(
            "probe has {} channels, recording has {}",
            coords.len(),
            args.num_channels
        );
    }
    masked.extend_from_slice(&config.masked_channels);
    masked.sort_unstable();
    masked.dedup();

    let positions = points_from_coords(&coords)?;
    Ok(ChannelGraph::new(
        &positions,
        config.neighbor_radius,
        config.inner_radius,
        &masked,
    )?)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(filter)
        .init();

    log::info!("spikescan {} - starting", VERSION);

    let config = load_config(&args)?;
    let graph = load_graph(&args, &config)?;
    let recording = RawRecording::open(&args.recording, args.num_channels, args.sampling_rate)?;
    let params = config.resolve(args.sampling_rate)?;

    let layout = RecordLayout::new(
        params.localize,
        if params.save_shape {
            params.cutout_length()
        } else {
            0
        },
    );
    let mut writer = SpikeFileWriter::create(&args.output, layout)?;

    let summary = spikescan_engine::run(&recording, &graph, &params, &mut writer)?;
    let written = writer.finish()?;
    if written != summary.num_spikes {
        log::warn!(
            "emitted {} spikes but wrote {} rows",
            summary.num_spikes,
            written
        );
    }

    log::info!(
        "done: {} spikes ({} raw detections) over {} frames -> {}",
        summary.num_spikes,
        summary.num_detected,
        summary.frames_processed,
        args.output.display()
    );

    Ok(())
}
