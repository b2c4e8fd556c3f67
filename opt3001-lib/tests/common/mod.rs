//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use hex;
#[allow(unused_imports)]
pub use nusb::transfer::TransferError;
#[allow(unused_imports)]
pub use opt3001_lib::constants::{FRAME_LEN, SETTLE_DELAY};
#[allow(unused_imports)]
pub use opt3001_lib::frame::{
    decode_register_response, encode_ack_trigger, encode_configuration, encode_read_register, encode_sensor_config,
};
#[allow(unused_imports)]
pub use opt3001_lib::{
    ConfigState, ConversionTime, Error, FullScale, OperatingMode, RegisterValue, SensorConfig, Session, SessionConfig,
    SharedSession, Transport, TransportError,
};

use std::collections::VecDeque;
use tokio::time::Instant;

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Vec<u8> {
    hex::decode(hex_data.replace(' ', "")).expect("Failed to decode hex")
}

/// Configuration frame for full scale 12, 800 ms, continuous
#[allow(dead_code)]
pub const DEFAULT_CONFIG_FRAME: &str =
    "0201000aaac0000388060106c806100604000000000000000000000000000000";

#[allow(dead_code)]
pub const ACK_TRIGGER_FRAME: &str = "0403000000000000000000000000000000000000000000000000000000000000";

/// A 32-byte response carrying `high`/`low` at the register offsets
#[allow(dead_code)]
pub fn response_frame(high: u8, low: u8) -> Vec<u8> {
    let mut frame = vec![0u8; FRAME_LEN];
    frame[0] = 0x01;
    frame[9] = high;
    frame[11] = low;
    frame
}

/// What the scripted device does on the next read
#[allow(dead_code)]
#[derive(Debug)]
pub enum Reply {
    Frame(Vec<u8>),
    Fail(TransferError),
    Stall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Write(Instant),
    Read(Instant),
}

/// In-memory transport that records writes and answers reads from a script.
///
/// Reads past the end of the script are answered with a zeroed acknowledgement frame.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    pub writes: Vec<Vec<u8>>,
    pub events: Vec<Event>,
    pub replies: VecDeque<Reply>,
    pub fail_write_at: Option<usize>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script for a session that has already acknowledged its opening handshake
    pub fn opened_with(replies: Vec<Reply>) -> Self {
        let mut transport = Self::new();
        transport.replies.push_back(Reply::Frame(vec![0u8; FRAME_LEN]));
        transport.replies.push_back(Reply::Frame(vec![0u8; FRAME_LEN]));
        transport.replies.extend(replies);
        transport
    }

    pub fn failing_write_at(index: usize) -> Self {
        ScriptedTransport {
            fail_write_at: Some(index),
            ..Self::default()
        }
    }

    pub fn written_hex(&self) -> Vec<String> {
        self.writes.iter().map(hex::encode).collect()
    }
}

impl Transport for ScriptedTransport {
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.fail_write_at == Some(self.writes.len()) {
            return Err(TransportError::Transfer(TransferError::Disconnected));
        }
        self.events.push(Event::Write(Instant::now()));
        self.writes.push(data.to_vec());
        Ok(())
    }

    async fn read(&mut self, max_len: usize) -> Result<Bytes, TransportError> {
        self.events.push(Event::Read(Instant::now()));
        match self.replies.pop_front() {
            None => Ok(Bytes::from(vec![0u8; max_len])),
            Some(Reply::Frame(frame)) => Ok(Bytes::from(frame)),
            Some(Reply::Fail(e)) => Err(TransportError::Transfer(e)),
            Some(Reply::Stall) => std::future::pending().await,
        }
    }
}
