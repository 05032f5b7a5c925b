//! Waveform sources and capture file formats
//!
//! A waveform source hands the decoder a complete `(time, ch_a, ch_b)`
//! capture. Acquisition failures are reported through the returned
//! `Result`; the decoder itself only ever sees a valid [`Waveform`].

use crate::types::{Result, Waveform};

pub mod csv;

// Re-export source types
pub use self::csv::{capture_file_name, write_capture, write_digital, CsvCapture, CAPTURE_HEADER};

/// Common trait for everything that can supply a capture
pub trait WaveformSource {
    /// Acquire one complete capture
    fn acquire(&mut self) -> Result<Waveform>;
}
