use crate::constants::{LUX_FACTOR, REGISTER_COUNT, RESULT_REGISTER};
use crate::error::Error;
use serde::Serialize;
use std::fmt;
use uom::si::f64::Illuminance;
use uom::si::illuminance::lux;

/// Address of one of the 16 slots on the adapter's register bus.
///
/// Only register 0 has a decoding defined here; the others are passed through verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RegisterAddress(u8);

impl RegisterAddress {
    /// The measurement result register
    pub const RESULT: RegisterAddress = RegisterAddress(RESULT_REGISTER);

    pub fn new(address: u8) -> Result<Self, Error> {
        if address >= REGISTER_COUNT {
            return Err(Error::InvalidRegister(address));
        }
        Ok(RegisterAddress(address))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// All addresses in ascending order
    pub fn all() -> impl Iterator<Item = RegisterAddress> {
        (0..REGISTER_COUNT).map(RegisterAddress)
    }
}

impl TryFrom<u8> for RegisterAddress {
    type Error = Error;

    fn try_from(address: u8) -> Result<Self, Self::Error> {
        RegisterAddress::new(address)
    }
}

impl fmt::Display for RegisterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", self.0)
    }
}

/// Raw register contents as returned by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RegisterValue {
    pub high: u8,
    pub low: u8,
}

impl RegisterValue {
    pub fn new(high: u8, low: u8) -> Self {
        RegisterValue { high, low }
    }

    pub fn word(self) -> u16 {
        u16::from_be_bytes([self.high, self.low])
    }

    /// Top four bits of the high byte
    pub fn exponent(self) -> u8 {
        (self.high & 0xF0) >> 4
    }

    /// Low four bits of the high byte followed by the low byte
    pub fn mantissa(self) -> u16 {
        (u16::from(self.high & 0x0F) << 8) + u16::from(self.low)
    }

    /// Interprets the value as a result-register measurement in lux.
    pub fn lux(self) -> f64 {
        f64::from(1u32 << self.exponent()) * f64::from(self.mantissa()) * LUX_FACTOR
    }

    pub fn illuminance(self) -> Illuminance {
        Illuminance::new::<lux>(self.lux())
    }
}

impl From<(u8, u8)> for RegisterValue {
    fn from((high, low): (u8, u8)) -> Self {
        RegisterValue { high, low }
    }
}

impl From<RegisterValue> for (u8, u8) {
    fn from(value: RegisterValue) -> Self {
        (value.high, value.low)
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X}", self.high, self.low)
    }
}
