//! CAN FD Waveform Decoder Library
//!
//! A stateless library that reconstructs a CAN FD frame from an oscilloscope
//! capture of the two bus lines, without a CAN controller.
//!
//! # Architecture
//!
//! - [`bitstream`]: differential threshold, edge search, timed sampling and
//!   dynamic destuffing over an explicit [`DecodeCursor`]
//! - [`decoder`]: the frame grammar, producing a [`Packet`]
//! - [`formats`]: capture sources (CSV files)
//! - [`payload`]: interpretation of the data field as an application message
//!
//! The library does NOT:
//! - Split a capture into multiple frames
//! - Handle error or overload frames
//! - Verify the CRC value
//!
//! # Example Usage
//!
//! ```no_run
//! use canfd_wave_decoder::{CsvCapture, DecoderConfig, FrameDecoder, WaveformSource};
//! use std::path::Path;
//!
//! let mut source = CsvCapture::open(Path::new("capture.csv")).unwrap();
//! let waveform = source.acquire().unwrap();
//!
//! let decoder = FrameDecoder::new(DecoderConfig::new().with_data_bitrate(4_000_000)).unwrap();
//! match decoder.decode(&waveform) {
//!     Ok(frame) => print!("{}", frame.packet),
//!     Err(e) => eprintln!("Decode error: {}", e),
//! }
//! ```

// Public modules
pub mod bitstream;
pub mod config;
pub mod decoder;
pub mod formats;
pub mod payload;
pub mod types;

// Re-export main types for convenience
pub use bitstream::{bit_state, DecodeCursor, EdgeDirection};
pub use config::DecoderConfig;
pub use decoder::{dlc_to_len, DecodedFrame, FrameDecoder, DLC_TO_BYTES};
pub use formats::{CsvCapture, WaveformSource};
pub use payload::EnviMessage;
pub use types::{BitSample, BitString, DecoderError, FieldValue, Packet, Result, Waveform};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
