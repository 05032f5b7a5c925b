//! Synthetic CAN FD captures for integration tests
//!
//! Frames are rendered at 32 samples per data bit and 128 per arbitration
//! bit, with the bit rate switching at the BRS sample point, and converted to
//! line voltages by inverting the differential threshold.

#![allow(dead_code)]

use canfd_wave_decoder::{dlc_to_len, DecoderConfig, Waveform};

pub const SAMPLES_PER_DATA_BIT: usize = 32;
pub const SAMPLES_PER_ARBITRATION_BIT: usize = 128;
pub const SAMPLE_PERIOD: f64 = 0.25e-6 / SAMPLES_PER_DATA_BIT as f64;

const IDLE_SAMPLES: usize = 256;
const TRAILING_SAMPLES: usize = 512;

/// Remainder of the BRS bit after its sample point, at the data bit time
const BRS_SAMPLES: usize = SAMPLES_PER_ARBITRATION_BIT * 3 / 4 + SAMPLES_PER_DATA_BIT / 4;

const DOMINANT: (f64, f64) = (3.75, 1.25);
const RECESSIVE: (f64, f64) = (2.5, 2.5);

/// Field values of a frame to synthesise
#[derive(Debug, Clone)]
pub struct FrameSpec {
    pub identifier: u16,
    pub rtr: bool,
    pub ide: bool,
    pub fdf: bool,
    pub res: bool,
    pub brs: bool,
    pub esi: bool,
    pub dlc: u8,
    pub data: Vec<u8>,
    pub stuff_count: u8,
    pub stuff_count_parity: bool,
    pub crc: u32,
}

impl FrameSpec {
    /// CAN FD data frame with bit rate switch, zero-filled trailer fields
    pub fn new(identifier: u16, dlc: u8, data: Vec<u8>) -> Self {
        assert_eq!(dlc_to_len(dlc), data.len(), "payload does not match DLC");
        Self {
            identifier,
            rtr: false,
            ide: false,
            fdf: true,
            res: false,
            brs: true,
            esi: false,
            dlc,
            data,
            stuff_count: 0b011,
            stuff_count_parity: false,
            crc: 0x1_5A5A,
        }
    }

    /// Width of the CRC value carried by this frame
    pub fn crc_bits(&self) -> usize {
        if self.data.len() > 16 {
            20
        } else {
            17
        }
    }
}

/// Bits on the wire, starting with SOF
#[derive(Debug, Clone, Default)]
pub struct EncodedFrame {
    pub bits: Vec<bool>,
    /// Bits sent at the nominal rate (SOF through BRS)
    pub arbitration_len: usize,
}

impl EncodedFrame {
    /// Append a bit that is not subject to dynamic stuffing
    fn push_raw(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    /// Append a bit, inserting a stuff bit first after five identical bits
    fn push_stuffed(&mut self, bit: bool) {
        let len = self.bits.len();
        if len >= 5 {
            let run = &self.bits[len - 5..];
            if run.iter().all(|&b| b == run[0]) {
                self.bits.push(!run[0]);
            }
        }
        self.bits.push(bit);
    }

    fn push_value(&mut self, value: u64, width: usize, stuffed: bool) {
        for shift in (0..width).rev() {
            let bit = (value >> shift) & 1 == 1;
            if stuffed {
                self.push_stuffed(bit);
            } else {
                self.push_raw(bit);
            }
        }
    }

    fn last(&self) -> bool {
        self.bits.last().copied().unwrap_or(true)
    }
}

/// Serialise `frame` into bus bits with dynamic and fixed stuffing
pub fn encode(frame: &FrameSpec) -> EncodedFrame {
    let mut out = EncodedFrame::default();

    out.push_raw(false); // SOF
    out.push_value(u64::from(frame.identifier), 11, true);
    for bit in [frame.rtr, frame.ide, frame.fdf, frame.res, frame.brs] {
        out.push_stuffed(bit);
    }
    out.arbitration_len = out.bits.len();

    out.push_raw(frame.esi);
    out.push_value(u64::from(frame.dlc), 4, true);
    for &byte in &frame.data {
        out.push_value(u64::from(byte), 8, true);
    }

    let fixed = !out.last();
    out.push_raw(fixed);
    out.push_value(u64::from(frame.stuff_count), 3, false);
    out.push_raw(frame.stuff_count_parity);

    let raw_crc_len = if frame.data.len() * 8 > 128 { 26 } else { 22 };
    let mut crc_bits = (0..frame.crc_bits())
        .rev()
        .map(|shift| (frame.crc >> shift) & 1 == 1);
    for i in 0..raw_crc_len {
        if i % 5 == 0 {
            let fixed = !out.last();
            out.push_raw(fixed);
        } else {
            let bit = crc_bits.next().unwrap_or(false);
            out.push_raw(bit);
        }
    }

    out.push_raw(true); // CRC delimiter
    out
}

/// Line voltage levels for every sample of the rendered frame
pub fn render_levels(encoded: &EncodedFrame) -> Vec<bool> {
    let mut levels = vec![true; IDLE_SAMPLES];
    for (i, &bit) in encoded.bits.iter().enumerate() {
        let width = if i + 1 < encoded.arbitration_len {
            SAMPLES_PER_ARBITRATION_BIT
        } else if i + 1 == encoded.arbitration_len {
            BRS_SAMPLES
        } else {
            SAMPLES_PER_DATA_BIT
        };
        levels.extend(std::iter::repeat(bit).take(width));
    }
    levels.extend(std::iter::repeat(true).take(TRAILING_SAMPLES));
    levels
}

/// Convert logical levels to a two-channel waveform
pub fn waveform_from_levels(levels: &[bool]) -> Waveform {
    let time = (0..levels.len()).map(|i| i as f64 * SAMPLE_PERIOD).collect();
    let (ch_a, ch_b) = levels
        .iter()
        .map(|&recessive| if recessive { RECESSIVE } else { DOMINANT })
        .unzip();
    Waveform::new(time, ch_a, ch_b).unwrap()
}

/// Render a complete capture of `frame`
pub fn synthesize(frame: &FrameSpec) -> (EncodedFrame, Waveform) {
    let encoded = encode(frame);
    let waveform = waveform_from_levels(&render_levels(&encoded));
    (encoded, waveform)
}

/// Decoder configuration matching the synthetic bus timing
pub fn config() -> DecoderConfig {
    DecoderConfig::new()
        .with_arbitration_bitrate(1_000_000)
        .with_data_bitrate(4_000_000)
        .with_sample_point(0.75)
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
