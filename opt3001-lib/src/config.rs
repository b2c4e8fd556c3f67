use crate::constants::{DEFAULT_TIMEOUT, FULL_SCALE_AUTO, PID, SETTLE_DELAY, VID};
use crate::error::Error;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use strum_macros::Display;

/// Operating mode of the sensor's conversion engine.
///
/// The discriminant is the value the adapter protocol expects before the
/// conversion-time multiplier is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, IntoPrimitive, TryFromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperatingMode {
    #[strum(to_string = "shutdown")]
    Shutdown = 0,
    #[strum(to_string = "single-shot")]
    SingleShot = 2,
    #[default]
    #[strum(to_string = "continuous")]
    Continuous = 4,
    #[strum(to_string = "continuous-alt")]
    ContinuousAlt = 6,
}

impl OperatingMode {
    pub fn value(self) -> u8 {
        self.into()
    }
}

/// Conversion time of a single measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, IntoPrimitive, Serialize, Deserialize)]
#[repr(u16)]
pub enum ConversionTime {
    #[strum(to_string = "100 ms")]
    Ms100 = 100,
    #[default]
    #[strum(to_string = "800 ms")]
    Ms800 = 800,
}

impl ConversionTime {
    /// Factor the mode value is multiplied by in the configuration word
    pub fn multiplier(self) -> u8 {
        match self {
            ConversionTime::Ms100 => 1,
            ConversionTime::Ms800 => 2,
        }
    }

    pub fn as_millis(self) -> u16 {
        self.into()
    }
}

impl TryFrom<u16> for ConversionTime {
    type Error = Error;

    fn try_from(ms: u16) -> Result<Self, Self::Error> {
        match ms {
            100 => Ok(ConversionTime::Ms100),
            800 => Ok(ConversionTime::Ms800),
            other => Err(Error::InvalidConversionTime(other)),
        }
    }
}

/// Full-scale range selector, 0 through 11 for a fixed range and 12 for auto-ranging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct FullScale(u8);

impl FullScale {
    pub const AUTO: FullScale = FullScale(FULL_SCALE_AUTO);

    pub fn new(value: u8) -> Result<Self, Error> {
        if value > FULL_SCALE_AUTO {
            return Err(Error::InvalidFullScale(value));
        }
        Ok(FullScale(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_auto(self) -> bool {
        self.0 == FULL_SCALE_AUTO
    }

    /// Upper end of the measurement range in lux, `None` when auto-ranging
    pub fn range_lux(self) -> Option<f64> {
        if self.is_auto() {
            None
        } else {
            Some(40.96 * f64::from(1u32 << self.0))
        }
    }
}

impl Default for FullScale {
    fn default() -> Self {
        FullScale::AUTO
    }
}

impl TryFrom<u8> for FullScale {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        FullScale::new(value)
    }
}

impl From<FullScale> for u8 {
    fn from(fs: FullScale) -> Self {
        fs.0
    }
}

impl fmt::Display for FullScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.range_lux() {
            Some(range) => write!(f, "{} ({:.2} lx)", self.0, range),
            None => write!(f, "{} (auto)", self.0),
        }
    }
}

/// Sensor operating parameters written during the configuration handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensorConfig {
    pub full_scale: FullScale,
    pub conversion_time: ConversionTime,
    pub mode: OperatingMode,
}

impl SensorConfig {
    /// Builds a configuration from raw values, validating each of them.
    pub fn new(full_scale: u8, conversion_time_ms: u16, mode: OperatingMode) -> Result<Self, Error> {
        Ok(SensorConfig {
            full_scale: FullScale::new(full_scale)?,
            conversion_time: ConversionTime::try_from(conversion_time_ms)?,
            mode,
        })
    }

    pub fn full_scale(mut self, full_scale: FullScale) -> Self {
        self.full_scale = full_scale;
        self
    }

    pub fn conversion_time(mut self, conversion_time: ConversionTime) -> Self {
        self.conversion_time = conversion_time;
        self
    }

    pub fn mode(mut self, mode: OperatingMode) -> Self {
        self.mode = mode;
        self
    }
}

/// How to find and talk to the USB adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: u8,
    /// Bound applied to every bulk transfer
    pub timeout: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            vendor_id: VID,
            product_id: PID,
            interface: 0,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Timing of frame exchanges within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Wait between writing a frame and reading its response
    pub settle_delay: Duration,
    /// Upper bound on waiting for a response frame
    pub read_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            settle_delay: SETTLE_DELAY,
            read_timeout: DEFAULT_TIMEOUT,
        }
    }
}
