//! Command and response frames exchanged with the SM-USB-DIG adapter.
//!
//! Every frame is 32 bytes. Commands are a fixed skeleton with at most one
//! variable byte; responses carry the register value at offsets 9 and 11.

use crate::config::{ConversionTime, FullScale, OperatingMode, SensorConfig};
use crate::constants::{
    CONFIG_WORD_OFFSET, FRAME_LEN, MIN_RESPONSE_LEN, READ_ADDRESS_OFFSET, REGISTER_COUNT,
};
use crate::error::Error;
use std::fmt;
use tracing::debug;
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

#[rustfmt::skip]
const READ_REGISTER_TEMPLATE: [u8; FRAME_LEN] = [
    0x02, 0x01, 0x00, 0x0E, 0xAE, 0xFC, 0x00, 0x03,
    0x88, 0x06, 0x00, 0x06, 0x04, 0x03, 0x89, 0x06,
    0xFF, 0x05, 0xFF, 0x05, 0x04, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

#[rustfmt::skip]
const CONFIGURATION_TEMPLATE: [u8; FRAME_LEN] = [
    0x02, 0x01, 0x00, 0x0A, 0xAA, 0xC0, 0x00, 0x03,
    0x88, 0x06, 0x01, 0x06, 0x00, 0x06, 0x10, 0x06,
    0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

#[rustfmt::skip]
const ACK_TRIGGER: [u8; FRAME_LEN] = [
    0x04, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

// Bits of the configuration nibble that hold the mode; bit 3 is the conversion-time bit
const MODE_FIELD_MASK: u8 = 0x06;

/// A fixed-length outbound command frame.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> [u8; FRAME_LEN] {
        self.0
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", hex::encode(self.0))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

/// Leading part of a response frame, enough to reach both register bytes.
#[derive(Debug, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct ResponseHead {
    _lead: [u8; 9],
    high: u8,
    _gap: u8,
    low: u8,
}

/// Builds the command that reads one register.
pub fn encode_read_register(address: u8) -> Result<Frame, Error> {
    if address >= REGISTER_COUNT {
        return Err(Error::InvalidRegister(address));
    }
    let mut frame = READ_REGISTER_TEMPLATE;
    frame[READ_ADDRESS_OFFSET] = address;
    Ok(Frame(frame))
}

/// Builds the configuration command from raw parameter values.
///
/// Fails with [`Error::InvalidFullScale`] outside `0..=12` and with
/// [`Error::InvalidConversionTime`] for anything but 100 or 800 ms.
pub fn encode_configuration(full_scale: u8, conversion_time: u16, mode: OperatingMode) -> Result<Frame, Error> {
    let config = SensorConfig {
        full_scale: FullScale::new(full_scale)?,
        conversion_time: ConversionTime::try_from(conversion_time)?,
        mode,
    };
    Ok(encode_sensor_config(&config))
}

/// Builds the configuration command from already validated parameters.
///
/// The configuration byte is the full-scale selector in the high nibble and
/// `mode * multiplier` in the low nibble. The product is kept as is even when
/// it spills out of the mode bits into the conversion-time bit.
pub fn encode_sensor_config(config: &SensorConfig) -> Frame {
    let mode_word = config.mode.value() * config.conversion_time.multiplier();
    if mode_word & !MODE_FIELD_MASK != 0 {
        debug!(
            mode = %config.mode,
            conversion_time = %config.conversion_time,
            mode_word,
            "Mode word extends past the mode field"
        );
    }
    let mut frame = CONFIGURATION_TEMPLATE;
    frame[CONFIG_WORD_OFFSET] = (config.full_scale.value() << 4) | mode_word;
    Frame(frame)
}

/// The constant second half of the configuration handshake.
pub fn encode_ack_trigger() -> Frame {
    Frame(ACK_TRIGGER)
}

/// Extracts the `(high, low)` register bytes from a response.
pub fn decode_register_response(response: &[u8]) -> Result<(u8, u8), Error> {
    let (head, _) = ResponseHead::ref_from_prefix(response).map_err(|_| Error::ShortResponse {
        expected: MIN_RESPONSE_LEN,
        actual: response.len(),
    })?;
    Ok((head.high, head.low))
}
