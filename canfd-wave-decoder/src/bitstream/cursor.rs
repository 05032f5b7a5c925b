//! Scan position for one decode run

use super::STUFF_RUN_LENGTH;
use crate::types::{BitSample, DecoderError, Result, Waveform};
use serde::Serialize;

/// Mutable scan state of a single frame decode
///
/// A cursor is created per decode and threaded through every primitive by
/// mutable reference. `buffer` records every sampled bit, stuff bits
/// included; `edges` records the timestamps of detected edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecodeCursor {
    /// Index of the waveform sample the cursor last moved to
    pub index: usize,
    /// Nominal time of the last sampled or sought bit boundary
    pub seek_time: f64,
    /// Every bit sampled so far, in order
    pub buffer: Vec<BitSample>,
    /// Timestamps of detected edges
    pub edges: Vec<f64>,
}

impl DecodeCursor {
    /// Cursor positioned on the first sample of `waveform`
    pub fn new(waveform: &Waveform) -> Self {
        Self {
            index: 0,
            seek_time: waveform.timestamp(0),
            buffer: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Cursor positioned on sample `index`
    pub fn starting_at(waveform: &Waveform, index: usize) -> Result<Self> {
        if index >= waveform.len() {
            return Err(DecoderError::StartOutOfRange {
                index,
                len: waveform.len(),
            });
        }

        Ok(Self {
            index,
            seek_time: waveform.timestamp(index),
            buffer: Vec::new(),
            edges: Vec::new(),
        })
    }

    /// First index a forward scan looks at
    pub(crate) fn scan_start(&self) -> usize {
        self.index.saturating_sub(1)
    }

    /// Value of the most recently sampled bit
    pub fn last_bit(&self) -> Option<bool> {
        self.buffer.last().map(|s| s.value)
    }

    /// True when the newest bit follows a run of identical bits long enough
    /// that it must be a stuff bit.
    pub fn is_stuff_position(&self) -> bool {
        let len = self.buffer.len();
        if len < STUFF_RUN_LENGTH + 1 {
            return false;
        }

        let run = &self.buffer[len - 1 - STUFF_RUN_LENGTH..len - 1];
        run.iter().all(|s| s.value == run[0].value)
    }

    /// Timestamps of every sampled bit
    pub fn sample_times(&self) -> Vec<f64> {
        self.buffer.iter().map(|s| s.timestamp).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::test_support::{bits, waveform_from_bits};

    fn cursor_with(pattern: &str) -> DecodeCursor {
        DecodeCursor {
            buffer: bits(pattern)
                .into_iter()
                .enumerate()
                .map(|(i, value)| BitSample {
                    value,
                    timestamp: i as f64,
                })
                .collect(),
            ..DecodeCursor::default()
        }
    }

    #[test]
    fn test_starting_at() {
        let wave = waveform_from_bits(&bits("10"));
        let cursor = DecodeCursor::starting_at(&wave, 12).unwrap();
        assert_eq!(cursor.index, 12);
        assert!((cursor.seek_time - 1.2).abs() < 1e-12);

        let err = DecodeCursor::starting_at(&wave, 20).unwrap_err();
        assert!(matches!(err, DecoderError::StartOutOfRange { index: 20, len: 20 }));
    }

    #[test]
    fn test_stuff_position() {
        assert!(!cursor_with("00000").is_stuff_position());
        assert!(cursor_with("000001").is_stuff_position());
        assert!(cursor_with("111110").is_stuff_position());
        assert!(!cursor_with("000010").is_stuff_position());
        assert!(cursor_with("1000001").is_stuff_position());
        assert!(!cursor_with("0000101").is_stuff_position());
    }

    #[test]
    fn test_scan_start_saturates() {
        let cursor = DecodeCursor::default();
        assert_eq!(cursor.scan_start(), 0);
        assert_eq!(cursor.last_bit(), None);
    }
}
