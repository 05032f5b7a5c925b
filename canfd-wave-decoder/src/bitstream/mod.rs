//! Bit-level access to a sampled CAN bus
//!
//! This module turns the analog waveform into bits: edge search, timed
//! sampling on a nominal bit grid, and removal of dynamic stuff bits. All
//! scan state lives in an explicit [`DecodeCursor`] handed to each primitive.

mod cursor;
mod edge;
mod sampler;

pub use cursor::DecodeCursor;
pub use edge::{seek_edge, EdgeDirection};
pub use sampler::{sample, sample_unstuffed, SampledBit};

/// Logical value of a dominant bus level
pub const DOMINANT: bool = false;

/// Logical value of a recessive bus level
pub const RECESSIVE: bool = true;

/// Identical bits after which the transmitter inserts a stuff bit
pub const STUFF_RUN_LENGTH: usize = 5;

/// Map a pair of simultaneous line voltages to a bus level.
///
/// The bus is dominant when the differential voltage strictly exceeds
/// `threshold`, recessive otherwise.
pub fn bit_state(a: f64, b: f64, threshold: f64) -> bool {
    if (a - b).abs() > threshold {
        DOMINANT
    } else {
        RECESSIVE
    }
}
