//! Main decoder API
//!
//! [`FrameDecoder`] walks the CAN FD frame grammar over a captured waveform:
//! start-of-frame edge, arbitration phase fields at the nominal rate, then the
//! data phase fields at the data rate, ending with the CRC delimiter. The
//! grammar is a straight-line pipeline; the only data-dependent width is the
//! payload, selected by the DLC.

use crate::bitstream::{sample, sample_unstuffed, seek_edge, DecodeCursor, EdgeDirection};
use crate::config::DecoderConfig;
use crate::types::{BitSample, BitString, DecoderError, Packet, Result, Waveform};
use serde::Serialize;

/// Payload length in bytes for each 4-bit DLC value
pub const DLC_TO_BYTES: [usize; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

/// Width of the base identifier
pub const IDENTIFIER_BITS: usize = 11;

/// Width of the data length code
pub const DLC_BITS: usize = 4;

/// Width of the gray-coded stuff count (parity bit excluded)
pub const STUFF_COUNT_BITS: usize = 3;

/// Every n-th raw CRC bit time is a fixed stuff bit
pub const CRC_FIXED_STUFF_INTERVAL: usize = 5;

/// Payloads longer than this (in bits) use the long CRC field
const LONG_CRC_DATA_BITS: usize = 8 * 16;

/// Payload length in bytes for a DLC value (upper bits ignored)
pub fn dlc_to_len(dlc: u8) -> usize {
    DLC_TO_BYTES[usize::from(dlc & 0x0F)]
}

/// Raw CRC field length in bit times, fixed stuff bits included
pub fn crc_raw_bit_count(data_bits: usize) -> usize {
    if data_bits > LONG_CRC_DATA_BITS {
        26
    } else {
        22
    }
}

/// Drop the fixed stuff bits (raw indices 0, 5, 10, ...) from a CRC field
pub fn strip_fixed_stuff_bits(raw: &BitString) -> BitString {
    raw.bits()
        .iter()
        .enumerate()
        .filter(|(i, _)| i % CRC_FIXED_STUFF_INTERVAL != 0)
        .map(|(_, &bit)| bit)
        .collect()
}

/// A decoded frame together with the diagnostics gathered while decoding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedFrame {
    pub packet: Packet,
    /// Every sampled bit, stuff bits included
    pub samples: Vec<BitSample>,
    /// Timestamps of detected edges
    pub edges: Vec<f64>,
}

impl DecodedFrame {
    /// Timestamps at which bits were sampled
    pub fn sample_times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }
}

/// CAN FD frame decoder
///
/// Holds only configuration, so one decoder can decode any number of
/// waveforms and repeated decodes of the same waveform give the same result.
#[derive(Debug, Clone, Default)]
pub struct FrameDecoder {
    config: DecoderConfig,
}

impl FrameDecoder {
    /// Create a decoder, rejecting an unusable configuration
    pub fn new(config: DecoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode the first frame in `waveform`
    ///
    /// # Example
    /// ```
    /// use canfd_wave_decoder::{DecoderError, FrameDecoder, Waveform};
    ///
    /// // An idle bus never starts a frame
    /// let wave = Waveform::new(vec![0.0, 1e-6], vec![2.5, 2.5], vec![2.5, 2.5]).unwrap();
    /// let result = FrameDecoder::default().decode(&wave);
    /// assert!(matches!(result, Err(DecoderError::NoEdgeFound { .. })));
    /// ```
    pub fn decode(&self, waveform: &Waveform) -> Result<DecodedFrame> {
        self.decode_from(waveform, 0)
    }

    /// Decode the first frame starting at or after sample `start_index`
    pub fn decode_from(&self, waveform: &Waveform, start_index: usize) -> Result<DecodedFrame> {
        let mut cursor = DecodeCursor::starting_at(waveform, start_index)?;
        let packet = self.decode_with_cursor(waveform, &mut cursor)?;

        Ok(DecodedFrame {
            packet,
            samples: cursor.buffer,
            edges: cursor.edges,
        })
    }

    /// Decode one frame from the cursor position.
    ///
    /// The cursor keeps everything sampled so far even when decoding fails,
    /// so callers can inspect it after an error.
    pub fn decode_with_cursor(
        &self,
        waveform: &Waveform,
        cursor: &mut DecodeCursor,
    ) -> Result<Packet> {
        log::info!(
            "Decoding CAN FD frame from sample {} ({} samples)",
            cursor.index,
            waveform.len()
        );

        let threshold = self.config.threshold_volts;
        let nominal = self.config.arbitration_bit_time();
        let data = self.config.data_bit_time();
        let sample_point = self.config.sample_point;

        seek_edge(waveform, cursor, EdgeDirection::Rising, threshold)?;

        let mut reader = FieldReader {
            waveform,
            cursor,
            threshold,
        };

        // Arbitration phase
        let sync = reader.bit("sync", sample_point * nominal)?;
        let identifier = reader.unstuffed_bits("identifier", IDENTIFIER_BITS, nominal)?;
        let rtr = reader.unstuffed_bit("RTR", nominal)?;
        let ide = reader.unstuffed_bit("IDE", nominal)?;
        let fdf = reader.unstuffed_bit("FDF", nominal)?;
        let res = reader.unstuffed_bit("res", nominal)?;
        let brs = reader.unstuffed_bit("BRS", nominal)?;

        // Data phase
        let esi = reader.bit("ESI", sample_point * data)?;
        let dlc = reader.unstuffed_bits("DLC", DLC_BITS, data)?;
        let payload_len = dlc_to_len(dlc.to_u64().unwrap_or_default() as u8);
        let data_field = reader.unstuffed_bits("Data", payload_len * 8, data)?;

        reader.bit("fixed stuff", data)?;
        let stuff_count = reader.bits("StuffCount", STUFF_COUNT_BITS, data)?;
        let stuff_count_parity = reader.bit("StuffCountParity", data)?;

        let raw_crc = reader.bits("CRC", crc_raw_bit_count(data_field.len()), data)?;
        let crc = strip_fixed_stuff_bits(&raw_crc);
        let crc_delim = reader.bit("CRCdelim", data)?;

        let packet = Packet {
            sync,
            identifier,
            rtr,
            ide,
            fdf,
            res,
            brs,
            esi,
            dlc,
            data: data_field,
            stuff_count,
            stuff_count_parity,
            crc,
            crc_delim,
        };

        log::info!(
            "Decoded frame: ID 0x{:03X}, {} data bytes, {} bits sampled",
            packet.identifier_value(),
            packet.payload_len(),
            reader.cursor.buffer.len()
        );

        Ok(packet)
    }
}

/// Reads named frame fields through the sampling primitives
struct FieldReader<'a> {
    waveform: &'a Waveform,
    cursor: &'a mut DecodeCursor,
    threshold: f64,
}

impl FieldReader<'_> {
    /// One bit, stuff detection ignored
    fn bit(&mut self, field: &str, delta: f64) -> Result<bool> {
        let sampled = sample(self.waveform, self.cursor, delta, self.threshold)
            .map_err(|e| self.report(field, e))?;
        log::debug!("{}: {}", field, u8::from(sampled.value));
        Ok(sampled.value)
    }

    /// `count` bits, stuff detection ignored
    fn bits(&mut self, field: &str, count: usize, delta: f64) -> Result<BitString> {
        let mut out = BitString::new();
        for _ in 0..count {
            let sampled = sample(self.waveform, self.cursor, delta, self.threshold)
                .map_err(|e| self.report(field, e))?;
            out.push(sampled.value);
        }
        log::debug!("{}: {} ({})", field, out.to_hex(), out);
        Ok(out)
    }

    /// One destuffed bit
    fn unstuffed_bit(&mut self, field: &str, delta: f64) -> Result<bool> {
        let bit = sample_unstuffed(self.waveform, self.cursor, delta, self.threshold)
            .map_err(|e| self.report(field, e))?;
        log::debug!("{}: {}", field, u8::from(bit));
        Ok(bit)
    }

    /// `count` destuffed bits
    fn unstuffed_bits(&mut self, field: &str, count: usize, delta: f64) -> Result<BitString> {
        let mut out = BitString::new();
        for _ in 0..count {
            let bit = sample_unstuffed(self.waveform, self.cursor, delta, self.threshold)
                .map_err(|e| self.report(field, e))?;
            out.push(bit);
        }
        log::debug!("{}: {} ({})", field, out.to_hex(), out);
        Ok(out)
    }

    /// Log a failure with the field it happened in and pass it on
    fn report(&self, field: &str, error: DecoderError) -> DecoderError {
        match &error {
            DecoderError::StuffingViolation { buffer, .. } => {
                let bits: BitString = buffer.iter().map(|s| s.value).collect();
                log::warn!("Bit stuffing not respected in {}: {}", field, bits);
            }
            other => log::warn!("Decoding stopped in {}: {}", field, other),
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dlc_table() {
        for dlc in 0..=8u8 {
            assert_eq!(dlc_to_len(dlc), usize::from(dlc));
        }
        let long: Vec<usize> = (9..=15u8).map(dlc_to_len).collect();
        assert_eq!(long, vec![12, 16, 20, 24, 32, 48, 64]);
    }

    #[test]
    fn test_crc_raw_length() {
        assert_eq!(crc_raw_bit_count(0), 22);
        assert_eq!(crc_raw_bit_count(128), 22);
        assert_eq!(crc_raw_bit_count(160), 26);
        assert_eq!(crc_raw_bit_count(512), 26);
    }

    #[test]
    fn test_crc_short_field() {
        let raw: BitString = (0..22).map(|i| i % 5 != 0).collect();
        let crc = strip_fixed_stuff_bits(&raw);
        assert_eq!(crc.len(), 17);
        // Only the fixed stuff positions were zero
        assert!(crc.bits().iter().all(|&b| b));
    }

    #[test]
    fn test_crc_long_field() {
        let raw: BitString = (0..26).map(|i| i % 5 == 0).collect();
        let crc = strip_fixed_stuff_bits(&raw);
        assert_eq!(crc.len(), 20);
        assert!(crc.bits().iter().all(|&b| !b));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = DecoderConfig::new().with_arbitration_bitrate(0);
        assert!(matches!(
            FrameDecoder::new(config),
            Err(DecoderError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_start_out_of_range() {
        let wave = Waveform::new(vec![0.0], vec![2.5], vec![2.5]).unwrap();
        let result = FrameDecoder::default().decode_from(&wave, 5);
        assert!(matches!(
            result,
            Err(DecoderError::StartOutOfRange { index: 5, len: 1 })
        ));
    }
}
