//! Timed sampling and dynamic bit destuffing

use super::DecodeCursor;
use crate::types::{BitSample, DecoderError, Result, Waveform};

/// Outcome of one timed sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampledBit {
    /// Logical bus level (`false` = dominant)
    pub value: bool,
    /// The bit follows five identical bits and is a stuff bit
    pub stuffed: bool,
}

/// Sample the bus `delta` seconds after the cursor's seek time.
///
/// The cursor moves to the first sample strictly later than the target, and
/// its seek time advances to the target itself so the bit grid stays nominal
/// regardless of sample alignment. The bit is appended to the cursor buffer
/// together with the timestamp of the sample it was read from.
pub fn sample(
    waveform: &Waveform,
    cursor: &mut DecodeCursor,
    delta: f64,
    threshold: f64,
) -> Result<SampledBit> {
    let target = cursor.seek_time + delta;
    let start = cursor.scan_start();

    let found = waveform
        .time()
        .get(start..)
        .and_then(|times| times.iter().position(|&t| t > target))
        .map(|offset| start + offset);

    let Some(index) = found else {
        return Err(DecoderError::IncompleteCapture {
            target_time: target,
            last_time: waveform.last_time(),
        });
    };

    let value = waveform.level(index, threshold);
    let timestamp = waveform.timestamp(index);
    cursor.index = index;
    cursor.seek_time = target;
    cursor.buffer.push(BitSample { value, timestamp });

    let stuffed = cursor.is_stuff_position();
    log::trace!(
        "bit {} at {:.9}s{}",
        u8::from(value),
        timestamp,
        if stuffed { " (stuff)" } else { "" }
    );

    Ok(SampledBit { value, stuffed })
}

/// Sample one bit, discarding a stuff bit if one is found.
///
/// Only a single extra sample is taken: a second stuff detection in a row
/// is reported as a stuffing violation carrying every bit sampled so far.
pub fn sample_unstuffed(
    waveform: &Waveform,
    cursor: &mut DecodeCursor,
    delta: f64,
    threshold: f64,
) -> Result<bool> {
    let first = sample(waveform, cursor, delta, threshold)?;
    if !first.stuffed {
        return Ok(first.value);
    }

    let second = sample(waveform, cursor, delta, threshold)?;
    if second.stuffed {
        let at_time = cursor
            .buffer
            .last()
            .map_or(cursor.seek_time, |s| s.timestamp);
        return Err(DecoderError::StuffingViolation {
            at_time,
            buffer: cursor.buffer.clone(),
        });
    }

    Ok(second.value)
}
