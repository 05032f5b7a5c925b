//! CSV capture files
//!
//! Captures are stored as one row per sample under a `Time[s],Ch1,Ch2`
//! header: timestamp in seconds, then the two bus line voltages.

use super::WaveformSource;
use crate::bitstream::{bit_state, DOMINANT};
use crate::types::{DecoderError, Result, Waveform};
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Header row of a capture file
pub const CAPTURE_HEADER: [&str; 3] = ["Time[s]", "Ch1", "Ch2"];

/// Capture stored in a CSV file
#[derive(Debug, Clone)]
pub struct CsvCapture {
    path: PathBuf,
}

impl CsvCapture {
    /// Open a capture file (the file is read by [`WaveformSource::acquire`])
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DecoderError::CaptureParse(format!(
                "capture file not found: {:?}",
                path
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse a capture from any reader
    pub fn read<R: Read>(reader: R) -> Result<Waveform> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        if headers.iter().ne(CAPTURE_HEADER.iter().copied()) {
            log::warn!(
                "Unexpected capture header {:?}, reading columns by position",
                headers
            );
        }

        let mut time = Vec::new();
        let mut ch_a = Vec::new();
        let mut ch_b = Vec::new();

        for (row, record) in csv_reader.deserialize::<(f64, f64, f64)>().enumerate() {
            // Header is line 1
            let (t, a, b) = record.map_err(|e| {
                DecoderError::CaptureParse(format!("line {}: {}", row + 2, e))
            })?;
            time.push(t);
            ch_a.push(a);
            ch_b.push(b);
        }

        log::debug!("Read {} capture samples", time.len());
        Waveform::new(time, ch_a, ch_b)
    }
}

impl WaveformSource for CsvCapture {
    fn acquire(&mut self) -> Result<Waveform> {
        log::info!("Reading capture file: {:?}", self.path);
        let file = File::open(&self.path)?;
        Self::read(BufReader::new(file))
    }
}

/// Write `waveform` as a capture file
pub fn write_capture(path: &Path, waveform: &Waveform) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(CAPTURE_HEADER)?;
    for row in waveform.rows() {
        writer.serialize(row)?;
    }
    writer.flush()?;

    log::info!("Wrote {} samples to {:?}", waveform.len(), path);
    Ok(())
}

/// Write the digitised view of `waveform`.
///
/// `Ch1` is 1 while the bus is dominant and `Ch2` is its complement, so a
/// plot of the file looks like an idealised transceiver output.
pub fn write_digital(path: &Path, waveform: &Waveform, threshold: f64) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(CAPTURE_HEADER)?;
    for (t, a, b) in waveform.rows() {
        let dominant = bit_state(a, b, threshold) == DOMINANT;
        writer.serialize((t, u8::from(dominant), u8::from(!dominant)))?;
    }
    writer.flush()?;

    log::info!("Wrote digital capture to {:?}", path);
    Ok(())
}

/// File name for a capture taken at `now`, e.g. `16_10_2026_14_03_59.csv`
pub fn capture_file_name(now: NaiveDateTime, suffix: Option<&str>) -> String {
    let stamp = now.format("%d_%m_%Y_%H_%M_%S");
    match suffix {
        Some(suffix) => format!("{}_{}.csv", stamp, suffix),
        None => format!("{}.csv", stamp),
    }
}
