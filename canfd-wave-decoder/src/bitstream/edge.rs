//! Edge search over the digitised bus level

use super::{DecodeCursor, DOMINANT, RECESSIVE};
use crate::types::{DecoderError, Result, Waveform};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a bus level transition
///
/// Named after the differential voltage: a rising edge enters the dominant
/// state, a falling edge returns to recessive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeDirection {
    Rising,
    Falling,
}

impl EdgeDirection {
    /// Bus level the transition ends in
    pub fn target_level(self) -> bool {
        match self {
            EdgeDirection::Rising => DOMINANT,
            EdgeDirection::Falling => RECESSIVE,
        }
    }
}

impl fmt::Display for EdgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeDirection::Rising => write!(f, "rising"),
            EdgeDirection::Falling => write!(f, "falling"),
        }
    }
}

/// Advance `cursor` to the next transition in `direction`.
///
/// The scan starts one sample before the cursor so an edge right at the
/// cursor is still seen. On success the cursor index and seek time move to
/// the first sample of the new level and the edge time is recorded. If the
/// waveform ends first the cursor is left untouched.
pub fn seek_edge(
    waveform: &Waveform,
    cursor: &mut DecodeCursor,
    direction: EdgeDirection,
    threshold: f64,
) -> Result<()> {
    let start = cursor.scan_start();
    if start >= waveform.len() {
        return Err(DecoderError::NoEdgeFound {
            direction,
            from_index: start,
        });
    }

    let mut last_state = waveform.level(start, threshold);
    for index in start..waveform.len() {
        let state = waveform.level(index, threshold);
        if state != last_state && state == direction.target_level() {
            let timestamp = waveform.timestamp(index);
            cursor.index = index;
            cursor.seek_time = timestamp;
            cursor.edges.push(timestamp);
            log::debug!("{} edge at sample {} ({:.9}s)", direction, index, timestamp);
            return Ok(());
        }
        last_state = state;
    }

    Err(DecoderError::NoEdgeFound {
        direction,
        from_index: start,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::test_support::{bits, waveform_from_bits};

    #[test]
    fn test_rising_edge() {
        let wave = waveform_from_bits(&bits("1100"));
        let mut cursor = DecodeCursor::new(&wave);

        seek_edge(&wave, &mut cursor, EdgeDirection::Rising, 2.0).unwrap();
        assert_eq!(cursor.index, 20);
        assert_eq!(cursor.seek_time, wave.timestamp(20));
        assert_eq!(cursor.edges, vec![wave.timestamp(20)]);
    }

    #[test]
    fn test_falling_after_rising() {
        let wave = waveform_from_bits(&bits("110011"));
        let mut cursor = DecodeCursor::new(&wave);

        seek_edge(&wave, &mut cursor, EdgeDirection::Rising, 2.0).unwrap();
        seek_edge(&wave, &mut cursor, EdgeDirection::Falling, 2.0).unwrap();
        assert_eq!(cursor.index, 40);
        assert_eq!(cursor.edges.len(), 2);
    }

    #[test]
    fn test_initial_level_is_not_an_edge() {
        // Starting dominant: the first rising edge is the second one
        let wave = waveform_from_bits(&bits("0110"));
        let mut cursor = DecodeCursor::new(&wave);

        seek_edge(&wave, &mut cursor, EdgeDirection::Rising, 2.0).unwrap();
        assert_eq!(cursor.index, 30);
    }

    #[test]
    fn test_no_edge_leaves_cursor() {
        let wave = waveform_from_bits(&bits("1111"));
        let mut cursor = DecodeCursor::new(&wave);
        let before = cursor.clone();

        let err = seek_edge(&wave, &mut cursor, EdgeDirection::Rising, 2.0).unwrap_err();
        assert!(matches!(
            err,
            DecoderError::NoEdgeFound {
                direction: EdgeDirection::Rising,
                from_index: 0
            }
        ));
        assert_eq!(cursor, before);
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(EdgeDirection::Rising.to_string(), "rising");
        assert_eq!(EdgeDirection::Falling.to_string(), "falling");
    }
}
