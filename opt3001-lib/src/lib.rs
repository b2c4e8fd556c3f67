pub mod config;
pub mod constants;
pub mod error;
pub mod frame;
pub mod register;
pub mod session;
pub mod transport;

// Re-export the session types for easy access
pub use config::{ConversionTime, DeviceConfig, FullScale, OperatingMode, SensorConfig, SessionConfig};
pub use error::{Error, TransportError};
pub use register::{RegisterAddress, RegisterValue};
pub use session::{ConfigState, Reading, Session, SharedSession};
pub use transport::{AdapterInfo, Transport, UsbTransport, list_adapters};
