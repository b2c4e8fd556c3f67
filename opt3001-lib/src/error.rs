use nusb::transfer::TransferError;
use thiserror::Error;

/// The primary error type for the `opt3001-lib` library.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid register address {0}: must be in range [0..15]")]
    InvalidRegister(u8),

    #[error("Invalid full scale {0}: must be in range [0..12]")]
    InvalidFullScale(u8),

    #[error("Invalid conversion time {0} ms: must be 100 or 800")]
    InvalidConversionTime(u16),

    #[error("Short response: expected at least {expected} bytes, got {actual}")]
    ShortResponse { expected: usize, actual: usize },

    #[error("Sensor is not configured; the last configuration handshake did not complete")]
    NotConfigured,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures of the underlying byte channel, including device discovery.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("USB device not found. Is the SM-USB-DIG adapter connected?")]
    DeviceNotFound,

    #[error("USB error: {0}")]
    Usb(#[from] nusb::Error),

    #[error("USB transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Timeout during USB operation: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("Unexpected endpoint topology: {0}")]
    EndpointTopology(String),

    #[error("Failed to read USB descriptors: {0}")]
    Descriptor(String),
}

impl From<nusb::Error> for Error {
    fn from(e: nusb::Error) -> Self {
        Error::Transport(TransportError::Usb(e))
    }
}

impl From<TransferError> for Error {
    fn from(e: TransferError) -> Self {
        Error::Transport(TransportError::Transfer(e))
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        Error::Transport(TransportError::Timeout(e))
    }
}
