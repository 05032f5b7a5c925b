//! Core types for the CAN FD waveform decoder
//!
//! This module defines the input waveform, the bit samples recorded while
//! decoding, and the decoded packet the library emits. The decoder keeps no
//! state between calls; everything a decode run produces is returned through
//! these types.

use crate::bitstream::{bit_state, EdgeDirection};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Errors that can occur during decoding
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("No {direction} edge found after sample {from_index}")]
    NoEdgeFound {
        direction: EdgeDirection,
        from_index: usize,
    },

    #[error("Capture ended before {target_time:.9}s (last sample at {last_time:.9}s)")]
    IncompleteCapture { target_time: f64, last_time: f64 },

    #[error("Bit stuffing not respected at {at_time:.9}s ({} bits sampled)", .buffer.len())]
    StuffingViolation {
        /// Timestamp of the second consecutive stuff detection
        at_time: f64,
        /// Every bit sampled up to and including the failure
        buffer: Vec<BitSample>,
    },

    #[error("Start index {index} is outside the waveform ({len} samples)")]
    StartOutOfRange { index: usize, len: usize },

    #[error("Invalid waveform: {0}")]
    InvalidWaveform(String),

    #[error("Invalid decoder configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid bit string: {0}")]
    InvalidBitString(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Failed to parse capture file: {0}")]
    CaptureParse(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Two-channel analog capture of a CAN bus
///
/// `time` is strictly increasing (seconds), `ch_a` and `ch_b` hold the bus
/// line voltages (volts) taken at those instants. All three sequences have the
/// same, non-zero length.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    time: Vec<f64>,
    ch_a: Vec<f64>,
    ch_b: Vec<f64>,
}

impl Waveform {
    /// Build a waveform, rejecting mismatched lengths, empty input and
    /// timestamps that do not strictly increase.
    pub fn new(time: Vec<f64>, ch_a: Vec<f64>, ch_b: Vec<f64>) -> Result<Self> {
        if time.len() != ch_a.len() || time.len() != ch_b.len() {
            return Err(DecoderError::InvalidWaveform(format!(
                "channel lengths differ (time: {}, ch_a: {}, ch_b: {})",
                time.len(),
                ch_a.len(),
                ch_b.len()
            )));
        }

        if time.is_empty() {
            return Err(DecoderError::InvalidWaveform(
                "waveform contains no samples".to_string(),
            ));
        }

        let unordered = time
            .windows(2)
            .position(|w| w[1].partial_cmp(&w[0]) != Some(Ordering::Greater));
        if let Some(pos) = unordered {
            return Err(DecoderError::InvalidWaveform(format!(
                "timestamps not strictly increasing at sample {}",
                pos + 1
            )));
        }

        Ok(Self { time, ch_a, ch_b })
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Always false for a constructed waveform
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn ch_a(&self) -> &[f64] {
        &self.ch_a
    }

    pub fn ch_b(&self) -> &[f64] {
        &self.ch_b
    }

    /// Timestamp of sample `index`
    pub fn timestamp(&self, index: usize) -> f64 {
        self.time[index]
    }

    /// Timestamp of the last sample
    pub fn last_time(&self) -> f64 {
        self.time[self.time.len() - 1]
    }

    /// Logical bus level at sample `index` (`false` = dominant)
    pub fn level(&self, index: usize, threshold: f64) -> bool {
        bit_state(self.ch_a[index], self.ch_b[index], threshold)
    }

    /// Iterate over `(time, ch_a, ch_b)` rows
    pub fn rows(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.time
            .iter()
            .zip(&self.ch_a)
            .zip(&self.ch_b)
            .map(|((&t, &a), &b)| (t, a, b))
    }
}

/// A single bit taken from the bus
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BitSample {
    /// Logical value (`false` = dominant)
    pub value: bool,
    /// Timestamp of the waveform sample the bit was read from
    pub timestamp: f64,
}

/// Ordered sequence of bits, first bit most significant
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BitString {
    bits: Vec<bool>,
}

impl BitString {
    pub fn new() -> Self {
        Self::default()
    }

    /// Big-endian bit string of `width` bits holding `value`
    pub fn from_u64(value: u64, width: usize) -> Self {
        let bits = (0..width)
            .rev()
            .map(|shift| shift < 64 && (value >> shift) & 1 == 1)
            .collect();
        Self { bits }
    }

    pub fn push(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    /// Unsigned value of the bits, `None` if wider than 64 bits
    pub fn to_u64(&self) -> Option<u64> {
        if self.bits.len() > 64 {
            return None;
        }
        Some(
            self.bits
                .iter()
                .fold(0u64, |acc, &bit| (acc << 1) | u64::from(bit)),
        )
    }

    /// Pack the bits into bytes, eight at a time, first bit in the MSB.
    ///
    /// A trailing group shorter than eight bits is packed as its own value.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bits
            .chunks(8)
            .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | u8::from(bit)))
            .collect()
    }

    /// Hex rendering of the unsigned value (`0x` prefix, no leading zeros)
    pub fn to_hex(&self) -> String {
        let pad = (4 - self.bits.len() % 4) % 4;
        let padded: Vec<bool> = std::iter::repeat(false)
            .take(pad)
            .chain(self.bits.iter().copied())
            .collect();

        let digits: String = padded
            .chunks(4)
            .map(|nibble| nibble.iter().fold(0u32, |acc, &bit| (acc << 1) | u32::from(bit)))
            .filter_map(|n| char::from_digit(n, 16))
            .collect();

        let trimmed = digits.trim_start_matches('0');
        if trimmed.is_empty() {
            "0x0".to_string()
        } else {
            format!("0x{}", trimmed)
        }
    }
}

impl FromIterator<bool> for BitString {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self {
            bits: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &bit in &self.bits {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for BitString {
    type Err = DecoderError;

    fn from_str(s: &str) -> Result<Self> {
        s.chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(DecoderError::InvalidBitString(format!(
                    "unexpected character {:?} in {:?}",
                    other, s
                ))),
            })
            .collect()
    }
}

impl Serialize for BitString {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BitString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Value of one packet field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Single bit (`false` = dominant)
    Bit(bool),
    /// Multi-bit field
    Bits(BitString),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bit(bit) => write!(f, "{}", u8::from(*bit)),
            FieldValue::Bits(bits) => write!(f, "{} , {}", bits.to_hex(), bits),
        }
    }
}

/// One decoded CAN FD frame
///
/// Fields appear in transmission order. The serialized names follow the
/// frame grammar (`RTR`, `CRCdelim`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub sync: bool,
    pub identifier: BitString,
    #[serde(rename = "RTR")]
    pub rtr: bool,
    #[serde(rename = "IDE")]
    pub ide: bool,
    #[serde(rename = "FDF")]
    pub fdf: bool,
    pub res: bool,
    #[serde(rename = "BRS")]
    pub brs: bool,
    #[serde(rename = "ESI")]
    pub esi: bool,
    #[serde(rename = "DLC")]
    pub dlc: BitString,
    #[serde(rename = "Data")]
    pub data: BitString,
    #[serde(rename = "StuffCount")]
    pub stuff_count: BitString,
    #[serde(rename = "StuffCountParity")]
    pub stuff_count_parity: bool,
    #[serde(rename = "CRC")]
    pub crc: BitString,
    #[serde(rename = "CRCdelim")]
    pub crc_delim: bool,
}

impl Packet {
    /// All fields as `(name, value)` pairs in transmission order
    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("sync", FieldValue::Bit(self.sync)),
            ("identifier", FieldValue::Bits(self.identifier.clone())),
            ("RTR", FieldValue::Bit(self.rtr)),
            ("IDE", FieldValue::Bit(self.ide)),
            ("FDF", FieldValue::Bit(self.fdf)),
            ("res", FieldValue::Bit(self.res)),
            ("BRS", FieldValue::Bit(self.brs)),
            ("ESI", FieldValue::Bit(self.esi)),
            ("DLC", FieldValue::Bits(self.dlc.clone())),
            ("Data", FieldValue::Bits(self.data.clone())),
            ("StuffCount", FieldValue::Bits(self.stuff_count.clone())),
            ("StuffCountParity", FieldValue::Bit(self.stuff_count_parity)),
            ("CRC", FieldValue::Bits(self.crc.clone())),
            ("CRCdelim", FieldValue::Bit(self.crc_delim)),
        ]
    }

    /// 11-bit base identifier
    pub fn identifier_value(&self) -> u16 {
        self.identifier.to_u64().unwrap_or_default() as u16
    }

    /// Raw 4-bit data length code
    pub fn dlc_code(&self) -> u8 {
        self.dlc.to_u64().unwrap_or_default() as u8
    }

    /// Payload length in bytes
    pub fn payload_len(&self) -> usize {
        self.data.len() / 8
    }

    /// Payload bytes, first byte transmitted first
    pub fn data_bytes(&self) -> Vec<u8> {
        self.data.to_bytes()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.fields() {
            writeln!(f, "{}: {}", name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveform_validation() {
        assert!(Waveform::new(vec![0.0, 1.0], vec![0.0, 0.0], vec![0.0, 0.0]).is_ok());

        let mismatched = Waveform::new(vec![0.0, 1.0], vec![0.0], vec![0.0, 0.0]);
        assert!(matches!(mismatched, Err(DecoderError::InvalidWaveform(_))));

        let empty = Waveform::new(vec![], vec![], vec![]);
        assert!(matches!(empty, Err(DecoderError::InvalidWaveform(_))));

        let unordered = Waveform::new(vec![0.0, 2.0, 1.0], vec![0.0; 3], vec![0.0; 3]);
        assert!(matches!(unordered, Err(DecoderError::InvalidWaveform(_))));

        let repeated = Waveform::new(vec![0.0, 0.0], vec![0.0; 2], vec![0.0; 2]);
        assert!(matches!(repeated, Err(DecoderError::InvalidWaveform(_))));
    }

    #[test]
    fn test_waveform_level() {
        let wave = Waveform::new(vec![0.0, 1.0], vec![3.5, 2.5], vec![1.0, 2.5]).unwrap();
        assert!(!wave.level(0, 2.0));
        assert!(wave.level(1, 2.0));
        assert_eq!(wave.last_time(), 1.0);
    }

    #[test]
    fn test_bit_string_values() {
        let id: BitString = "00100100011".parse().unwrap();
        assert_eq!(id.len(), 11);
        assert_eq!(id.to_u64(), Some(0x123));
        assert_eq!(id.to_hex(), "0x123");
        assert_eq!(id.to_string(), "00100100011");
        assert_eq!(BitString::from_u64(0x123, 11), id);
    }

    #[test]
    fn test_bit_string_bytes() {
        let bits: BitString = "0000000111111111".parse().unwrap();
        assert_eq!(bits.to_bytes(), vec![0x01, 0xFF]);
        assert_eq!(bits.to_hex(), "0x1ff");

        let zeros: BitString = "0000".parse().unwrap();
        assert_eq!(zeros.to_hex(), "0x0");
        assert_eq!(BitString::new().to_hex(), "0x0");
    }

    #[test]
    fn test_bit_string_too_wide() {
        let wide = BitString::from_iter(std::iter::repeat(true).take(72));
        assert_eq!(wide.to_u64(), None);
        assert_eq!(wide.to_bytes().len(), 9);
    }

    #[test]
    fn test_bit_string_rejects_garbage() {
        let parsed: Result<BitString> = "01x1".parse();
        assert!(matches!(parsed, Err(DecoderError::InvalidBitString(_))));
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::Bit(true).to_string(), "1");
        let dlc: BitString = "1000".parse().unwrap();
        assert_eq!(FieldValue::Bits(dlc).to_string(), "0x8 , 1000");
    }
}
