//! CAN FD Waveform Decoder CLI Application
//!
//! Command-line front end for the canfd-wave-decoder library. It adds:
//! - Capture file loading and TOML configuration
//! - Text and JSON reports of the decoded frame
//! - ENVI payload decoding
//! - Digitised capture export

use anyhow::{Context, Result};
use canfd_wave_decoder::formats::{capture_file_name, write_digital};
use canfd_wave_decoder::{
    BitString, CsvCapture, DecoderError, EnviMessage, FrameDecoder, Waveform, WaveformSource,
};
use clap::Parser;
use std::path::{Path, PathBuf};

mod config;
mod report;

use config::{AppConfig, OutputFormat};

/// CAN FD Waveform Decoder - Decode a CAN FD frame from an oscilloscope capture
#[derive(Parser, Debug)]
#[command(name = "canfd-wave-cli")]
#[command(about = "Decode a CAN FD frame from a two-channel bus capture (CSV)", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the capture file (Time[s],Ch1,Ch2)
    #[arg(short = 'i', long, value_name = "FILE")]
    capture: Option<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Differential threshold in volts
    #[arg(long, value_name = "VOLTS")]
    threshold: Option<f64>,

    /// Arbitration phase bit rate in bit/s
    #[arg(long, value_name = "BPS")]
    arbitration_bitrate: Option<u32>,

    /// Data phase bit rate in bit/s
    #[arg(long, value_name = "BPS")]
    data_bitrate: Option<u32>,

    /// Sample point as a fraction of the bit time
    #[arg(long, value_name = "FRACTION")]
    sample_point: Option<f64>,

    /// Sample index to start searching for the frame from
    #[arg(long, value_name = "INDEX")]
    start_index: Option<usize>,

    /// Decode the data field as an ENVI message
    #[arg(long)]
    payload: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Write a digitised copy of the capture into this directory
    #[arg(long, value_name = "DIR")]
    digital_dir: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("CAN FD Waveform Decoder CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", canfd_wave_decoder::VERSION);

    let config = resolve_config(&args)?;

    match config.input.capture.clone() {
        Some(capture) => decode_capture(&config, &capture),
        None => {
            println!("CAN FD Waveform Decoder - No capture specified");
            println!("\nQuick Start:");
            println!("  canfd-wave-cli --capture capture.csv");
            println!("  canfd-wave-cli --capture capture.csv --payload --json");
            println!("\nWith a configuration file:");
            println!("  canfd-wave-cli --config config.toml");
            println!("\nUse --help for more options");
            Ok(())
        }
    }
}

/// Merge the optional config file with command-line overrides
fn resolve_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    if let Some(capture) = &args.capture {
        config.input.capture = Some(capture.clone());
    }
    if let Some(index) = args.start_index {
        config.input.start_index = index;
    }
    if let Some(volts) = args.threshold {
        config.decoder.threshold_volts = volts;
    }
    if let Some(bitrate) = args.arbitration_bitrate {
        config.decoder.arbitration_bitrate = bitrate;
    }
    if let Some(bitrate) = args.data_bitrate {
        config.decoder.data_bitrate = bitrate;
    }
    if let Some(sample_point) = args.sample_point {
        config.decoder.sample_point = sample_point;
    }
    if args.payload {
        config.output.payload = true;
    }
    if args.json {
        config.output.format = OutputFormat::Json;
    }
    if let Some(dir) = &args.digital_dir {
        config.output.digital_dir = Some(dir.clone());
    }

    log::debug!("Effective configuration: {:?}", config);
    Ok(config)
}

/// Load a capture, decode it and print the report
fn decode_capture(config: &AppConfig, capture: &Path) -> Result<()> {
    let mut source = CsvCapture::open(capture)
        .with_context(|| format!("Failed to open capture: {:?}", capture))?;
    let waveform = acquire(&mut source)?;
    log::info!(
        "Capture loaded: {} samples, {:.9}s to {:.9}s",
        waveform.len(),
        waveform.timestamp(0),
        waveform.last_time()
    );

    let decoder = FrameDecoder::new(config.decoder.clone())?;

    if let Some(dir) = &config.output.digital_dir {
        let now = chrono::Local::now().naive_local();
        let path = dir.join(capture_file_name(now, Some("digital")));
        write_digital(&path, &waveform, config.decoder.threshold_volts)
            .with_context(|| format!("Failed to write digital capture: {:?}", path))?;
    }

    let frame = match decoder.decode_from(&waveform, config.input.start_index) {
        Ok(frame) => frame,
        Err(e) => {
            if let DecoderError::StuffingViolation { buffer, .. } = &e {
                let raw: BitString = buffer.iter().map(|s| s.value).collect();
                log::error!("Raw bit buffer at failure: {}", raw);
            }
            return Err(e).with_context(|| format!("Failed to decode frame in {:?}", capture));
        }
    };

    let payload = if config.output.payload {
        Some(EnviMessage::from_packet(&frame.packet).context("Failed to decode payload")?)
    } else {
        None
    };

    match config.output.format {
        OutputFormat::Text => report::print_text(&frame, payload.as_ref()),
        OutputFormat::Json => report::print_json(&frame, payload.as_ref())?,
    }

    Ok(())
}

/// Pull one capture out of any waveform source
fn acquire<S: WaveformSource>(source: &mut S) -> Result<Waveform> {
    source.acquire().context("Failed to acquire capture")
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
