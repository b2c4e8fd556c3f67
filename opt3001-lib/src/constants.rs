// Protocol constants for the OPT3001 behind an SM-USB-DIG adapter

use std::time::Duration;

/// USB vendor id of the SM-USB-DIG adapter
pub const VID: u16 = 0x0451;

/// USB product id of the SM-USB-DIG adapter
pub const PID: u16 = 0x2F90;

/// Every frame, in both directions, is exactly this long
pub const FRAME_LEN: usize = 32;

/// Number of addressable registers on the adapter's register bus
pub const REGISTER_COUNT: u8 = 16;

/// Register holding the exponent/mantissa light measurement
pub const RESULT_REGISTER: u8 = 0;

/// Offset of the register address byte in a read-register command
pub const READ_ADDRESS_OFFSET: usize = 10;

/// Offset of the full-scale/mode byte in a configuration command
pub const CONFIG_WORD_OFFSET: usize = 12;

/// Offset of the high-order register byte in a response
pub const RESPONSE_HIGH_OFFSET: usize = 9;

/// Offset of the low-order register byte in a response
pub const RESPONSE_LOW_OFFSET: usize = 11;

/// Shortest response that still carries both register bytes
pub const MIN_RESPONSE_LEN: usize = RESPONSE_LOW_OFFSET + 1;

/// Largest full-scale selector; 12 selects automatic ranging
pub const FULL_SCALE_AUTO: u8 = 12;

/// Scale of one mantissa LSB at exponent 0, in lux
pub const LUX_FACTOR: f64 = 0.01;

/// Device processing time between a command write and its response read
pub const SETTLE_DELAY: Duration = Duration::from_millis(1);

/// Default bound on a single bulk transfer
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
