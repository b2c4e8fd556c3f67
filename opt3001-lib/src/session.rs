use crate::config::{OperatingMode, SensorConfig, SessionConfig};
use crate::constants::FRAME_LEN;
use crate::error::Error;
use crate::frame::{self, Frame};
use crate::register::{RegisterAddress, RegisterValue};
use crate::transport::Transport;
use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use strum_macros::Display;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Progress of the configuration handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConfigState {
    Unconfigured,
    Configuring,
    Configured,
}

/// A single lux measurement stamped with wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    pub lux: f64,
}

/// Current wall-clock time as whole seconds since the Unix epoch.
pub fn timestamp() -> i64 {
    Utc::now().timestamp()
}

/// An open, configured connection to the sensor.
///
/// The session is the sole owner of its transport. Every operation writes a
/// frame, waits the settle delay and reads the matching response before the
/// next frame goes out.
pub struct Session<T> {
    transport: T,
    state: ConfigState,
    sensor: SensorConfig,
    timing: SessionConfig,
}

impl<T: Transport> Session<T> {
    /// Binds to `transport` and configures the sensor with default parameters
    /// (auto-range, 800 ms, continuous).
    pub async fn open(transport: T) -> Result<Self, Error> {
        Self::open_with(transport, SensorConfig::default(), SessionConfig::default()).await
    }

    pub async fn open_with(transport: T, sensor: SensorConfig, timing: SessionConfig) -> Result<Self, Error> {
        let mut session = Session {
            transport,
            state: ConfigState::Unconfigured,
            sensor,
            timing,
        };
        session.set_config(sensor).await?;
        info!("Sensor configured and ready for polling.");
        Ok(session)
    }

    /// Validates raw parameters and runs the configuration handshake.
    pub async fn configure(&mut self, full_scale: u8, conversion_time: u16, mode: OperatingMode) -> Result<(), Error> {
        let config = SensorConfig::new(full_scale, conversion_time, mode)?;
        self.set_config(config).await
    }

    /// Runs the two-step configuration handshake.
    ///
    /// The configuration frame and then the ack trigger are each written and
    /// answered by one acknowledgement, which is read and discarded.
    pub async fn set_config(&mut self, config: SensorConfig) -> Result<(), Error> {
        let command = frame::encode_sensor_config(&config);
        info!(
            full_scale = %config.full_scale,
            conversion_time = %config.conversion_time,
            mode = %config.mode,
            "--- Starting Configuration Handshake ---"
        );
        self.state = ConfigState::Configuring;

        self.acknowledge(&command).await?;
        self.acknowledge(&frame::encode_ack_trigger()).await?;

        self.sensor = config;
        self.state = ConfigState::Configured;
        info!("--- Configuration Handshake Complete ---");
        Ok(())
    }

    pub async fn read_register(&mut self, address: u8) -> Result<RegisterValue, Error> {
        let command = frame::encode_read_register(address)?;
        if self.state != ConfigState::Configured {
            return Err(Error::NotConfigured);
        }
        let response = self.exchange(&command).await?;
        let value = RegisterValue::from(frame::decode_register_response(&response)?);
        debug!(address, value = %value, "Register read");
        Ok(value)
    }

    /// Reads all 16 registers one round trip at a time, in ascending address order.
    pub async fn read_all_registers(&mut self) -> Result<Vec<RegisterValue>, Error> {
        let mut values = Vec::with_capacity(RegisterAddress::all().count());
        for address in RegisterAddress::all() {
            values.push(self.read_register(address.value()).await?);
        }
        Ok(values)
    }

    pub async fn read_lux(&mut self) -> Result<f64, Error> {
        let value = self.read_register(RegisterAddress::RESULT.value()).await?;
        Ok(value.lux())
    }

    /// Reads the light level and stamps it with the current time.
    pub async fn sample(&mut self) -> Result<Reading, Error> {
        let lux = self.read_lux().await?;
        Ok(Reading {
            timestamp: self.timestamp(),
            lux,
        })
    }

    pub fn timestamp(&self) -> i64 {
        timestamp()
    }

    pub fn state(&self) -> ConfigState {
        self.state
    }

    /// Parameters of the last successful configuration
    pub fn config(&self) -> SensorConfig {
        self.sensor
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Ends the session and hands the transport back.
    pub fn into_transport(self) -> T {
        self.transport
    }

    async fn acknowledge(&mut self, command: &Frame) -> Result<(), Error> {
        let ack = self.exchange(command).await?;
        if ack.len() < FRAME_LEN {
            warn!(
                "Acknowledgement shorter than a frame: {} bytes ({})",
                ack.len(),
                hex::encode(&ack)
            );
        }
        Ok(())
    }

    async fn exchange(&mut self, command: &Frame) -> Result<Bytes, Error> {
        self.transport.write(command.as_bytes()).await?;
        sleep(self.timing.settle_delay).await;
        let response = timeout(self.timing.read_timeout, self.transport.read(FRAME_LEN)).await??;
        Ok(response)
    }
}

/// A session that can be shared between tasks.
///
/// Each operation holds the lock for its whole write-settle-read sequence, so
/// frames from different callers never interleave on the wire.
pub struct SharedSession<T> {
    inner: Arc<Mutex<Session<T>>>,
}

impl<T> Clone for SharedSession<T> {
    fn clone(&self) -> Self {
        SharedSession {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> SharedSession<T> {
    pub fn new(session: Session<T>) -> Self {
        SharedSession {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Exclusive access for sequences spanning several operations.
    pub async fn lock(&self) -> MutexGuard<'_, Session<T>> {
        self.inner.lock().await
    }

    pub async fn configure(&self, full_scale: u8, conversion_time: u16, mode: OperatingMode) -> Result<(), Error> {
        self.inner.lock().await.configure(full_scale, conversion_time, mode).await
    }

    pub async fn set_config(&self, config: SensorConfig) -> Result<(), Error> {
        self.inner.lock().await.set_config(config).await
    }

    pub async fn read_register(&self, address: u8) -> Result<RegisterValue, Error> {
        self.inner.lock().await.read_register(address).await
    }

    pub async fn read_all_registers(&self) -> Result<Vec<RegisterValue>, Error> {
        self.inner.lock().await.read_all_registers().await
    }

    pub async fn read_lux(&self) -> Result<f64, Error> {
        self.inner.lock().await.read_lux().await
    }

    pub async fn sample(&self) -> Result<Reading, Error> {
        self.inner.lock().await.sample().await
    }
}

impl<T: Transport> From<Session<T>> for SharedSession<T> {
    fn from(session: Session<T>) -> Self {
        SharedSession::new(session)
    }
}
