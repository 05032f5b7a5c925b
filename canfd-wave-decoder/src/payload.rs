//! Application payload decoding
//!
//! Interprets the data field of a decoded frame as an ENVI register
//! message:
//!
//! ```text
//! byte 0      source id
//! byte 1      payload length n (bytes following the header)
//! bytes 2..   n / 10 register records:
//!               u16 control word (big-endian)
//!               f32 value 0      (big-endian)
//!               f32 value 1      (big-endian)
//! ```
//!
//! The control word packs the ack flag (bit 15), command flag (bit 14),
//! write flag (bit 13) and a 13-bit register address.

use crate::types::{DecoderError, Packet, Result};
use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;
use std::fmt;

/// Source id and length bytes
pub const HEADER_LEN: usize = 2;

/// Control word plus two floats
pub const RECORD_LEN: usize = 10;

/// Register access control word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlWord(pub u16);

impl ControlWord {
    pub fn ack(self) -> bool {
        self.0 & (1 << 15) != 0
    }

    pub fn command(self) -> bool {
        self.0 & (1 << 14) != 0
    }

    /// True for a register write, false for a read
    pub fn write(self) -> bool {
        self.0 & (1 << 13) != 0
    }

    pub fn register_address(self) -> u16 {
        self.0 & 0x1FFF
    }
}

/// One register access
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegisterRecord {
    pub control: ControlWord,
    pub values: [f32; 2],
}

/// Decoded application message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnviMessage {
    pub source: u8,
    pub length: u8,
    pub records: Vec<RegisterRecord>,
}

impl EnviMessage {
    /// Parse a message from raw payload bytes
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(DecoderError::InvalidPayload(format!(
                "need {} header bytes, got {}",
                HEADER_LEN,
                bytes.len()
            )));
        }

        let source = bytes[0];
        let length = bytes[1];
        let end = HEADER_LEN + usize::from(length);
        let payload = bytes.get(HEADER_LEN..end).ok_or_else(|| {
            DecoderError::InvalidPayload(format!(
                "declared {} payload bytes but only {} present",
                length,
                bytes.len() - HEADER_LEN
            ))
        })?;

        if payload.len() % RECORD_LEN != 0 {
            return Err(DecoderError::InvalidPayload(format!(
                "payload length {} is not a multiple of the {}-byte record",
                payload.len(),
                RECORD_LEN
            )));
        }

        let records = payload
            .chunks_exact(RECORD_LEN)
            .map(|chunk| RegisterRecord {
                control: ControlWord(BigEndian::read_u16(&chunk[0..2])),
                values: [
                    BigEndian::read_f32(&chunk[2..6]),
                    BigEndian::read_f32(&chunk[6..10]),
                ],
            })
            .collect();

        Ok(Self {
            source,
            length,
            records,
        })
    }

    /// Parse the data field of a decoded frame
    pub fn from_packet(packet: &Packet) -> Result<Self> {
        Self::parse(&packet.data_bytes())
    }
}

impl fmt::Display for EnviMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "source: 0x{:02x}", self.source)?;
        writeln!(f, "length: {}", self.length)?;
        for record in &self.records {
            writeln!(
                f,
                "register 0x{:04x}: ack={} cmd={} w/r={} data0={} data1={}",
                record.control.register_address(),
                u8::from(record.control.ack()),
                u8::from(record.control.command()),
                u8::from(record.control.write()),
                record.values[0],
                record.values[1]
            )?;
        }
        Ok(())
    }
}
