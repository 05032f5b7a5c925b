//! Decoder configuration types
//!
//! Bus timing and electrical parameters used by the frame decoder. The
//! defaults match a 1 Mbit/s arbitration phase, a 4 Mbit/s data phase, a 75%
//! sample point and a 2 V differential threshold.

use crate::types::{DecoderError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the frame decoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Differential voltage above which the bus is dominant
    #[serde(default = "default_threshold")]
    pub threshold_volts: f64,

    /// Nominal (arbitration phase) bit rate in bit/s
    #[serde(default = "default_arbitration_bitrate")]
    pub arbitration_bitrate: u32,

    /// Data phase bit rate in bit/s
    #[serde(default = "default_data_bitrate")]
    pub data_bitrate: u32,

    /// Sample point as a fraction of the bit time
    #[serde(default = "default_sample_point")]
    pub sample_point: f64,
}

fn default_threshold() -> f64 {
    2.0
}

fn default_arbitration_bitrate() -> u32 {
    1_000_000
}

fn default_data_bitrate() -> u32 {
    4_000_000
}

fn default_sample_point() -> f64 {
    0.75
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            threshold_volts: default_threshold(),
            arbitration_bitrate: default_arbitration_bitrate(),
            data_bitrate: default_data_bitrate(),
            sample_point: default_sample_point(),
        }
    }
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the differential threshold
    pub fn with_threshold(mut self, volts: f64) -> Self {
        self.threshold_volts = volts;
        self
    }

    /// Builder method: set the arbitration phase bit rate
    pub fn with_arbitration_bitrate(mut self, bitrate: u32) -> Self {
        self.arbitration_bitrate = bitrate;
        self
    }

    /// Builder method: set the data phase bit rate
    pub fn with_data_bitrate(mut self, bitrate: u32) -> Self {
        self.data_bitrate = bitrate;
        self
    }

    /// Builder method: set the sample point fraction
    pub fn with_sample_point(mut self, sample_point: f64) -> Self {
        self.sample_point = sample_point;
        self
    }

    /// Arbitration phase bit time in seconds
    pub fn arbitration_bit_time(&self) -> f64 {
        1.0 / f64::from(self.arbitration_bitrate)
    }

    /// Data phase bit time in seconds
    pub fn data_bit_time(&self) -> f64 {
        1.0 / f64::from(self.data_bitrate)
    }

    /// Reject configurations the decoder cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.arbitration_bitrate == 0 || self.data_bitrate == 0 {
            return Err(DecoderError::InvalidConfig(
                "bit rates must be greater than zero".to_string(),
            ));
        }

        if !(self.sample_point > 0.0 && self.sample_point <= 1.0) {
            return Err(DecoderError::InvalidConfig(format!(
                "sample point {} outside (0, 1]",
                self.sample_point
            )));
        }

        if !self.threshold_volts.is_finite() || self.threshold_volts < 0.0 {
            return Err(DecoderError::InvalidConfig(format!(
                "threshold {} V is not a non-negative voltage",
                self.threshold_volts
            )));
        }

        Ok(())
    }
}
