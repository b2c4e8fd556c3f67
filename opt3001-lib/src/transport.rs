use crate::config::DeviceConfig;
use crate::error::TransportError;
use bytes::Bytes;
use nusb::transfer::{EndpointType, RequestBuffer};
use nusb::{DeviceInfo, Interface};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// A bidirectional byte channel to the adapter.
///
/// The device pairs every written frame with the next frame read back, so an
/// implementation must not reorder or buffer across calls.
pub trait Transport {
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn read(&mut self, max_len: usize) -> impl Future<Output = Result<Bytes, TransportError>> + Send;
}

/// Summary of an attached adapter, as reported by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub bus: u8,
    pub address: u8,
    pub product: Option<String>,
    pub serial: Option<String>,
}

impl From<&DeviceInfo> for AdapterInfo {
    fn from(info: &DeviceInfo) -> Self {
        AdapterInfo {
            bus: info.bus_number(),
            address: info.device_address(),
            product: info.product_string().map(str::to_owned),
            serial: info.serial_number().map(str::to_owned),
        }
    }
}

/// Lists every attached device matching the configured vendor and product ids.
pub fn list_adapters(config: &DeviceConfig) -> Result<Vec<AdapterInfo>, TransportError> {
    Ok(nusb::list_devices()?
        .filter(|d| d.vendor_id() == config.vendor_id && d.product_id() == config.product_id)
        .map(|d| AdapterInfo::from(&d))
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferKind {
    Bulk,
    Interrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Endpoint {
    address: u8,
    kind: TransferKind,
}

/// USB transport over the adapter's IN/OUT endpoint pair.
pub struct UsbTransport {
    interface: Interface,
    ep_in: Endpoint,
    ep_out: Endpoint,
    timeout: Duration,
}

impl UsbTransport {
    /// Finds the adapter, claims its interface and resolves the endpoint pair.
    pub fn open(config: &DeviceConfig) -> Result<Self, TransportError> {
        info!(
            "Searching for SM-USB-DIG ({:#06x}:{:#06x})...",
            config.vendor_id, config.product_id
        );
        let device_info = nusb::list_devices()?
            .find(|d| d.vendor_id() == config.vendor_id && d.product_id() == config.product_id)
            .ok_or(TransportError::DeviceNotFound)?;

        info!(
            "Found device on bus {} addr {}",
            device_info.bus_number(),
            device_info.device_address()
        );

        let device = device_info.open()?;
        let (ep_in, ep_out) = {
            let active_config = device
                .active_configuration()
                .map_err(|e| TransportError::Descriptor(e.to_string()))?;
            let mut addresses = Vec::new();
            for group in active_config.interfaces() {
                for setting in group.alt_settings() {
                    if setting.interface_number() != config.interface || setting.alternate_setting() != 0 {
                        continue;
                    }
                    for endpoint in setting.endpoints() {
                        addresses.push((endpoint.address(), endpoint.transfer_type()));
                    }
                }
            }
            resolve_endpoints(&addresses)?
        };

        let interface = device.detach_and_claim_interface(config.interface)?;
        info!(
            "Interface claimed successfully (IN {:#04x}, OUT {:#04x}).",
            ep_in.address, ep_out.address
        );

        Ok(UsbTransport {
            interface,
            ep_in,
            ep_out,
            timeout: config.timeout,
        })
    }
}

/// Requires exactly one IN and one OUT endpoint, each bulk or interrupt.
fn resolve_endpoints(endpoints: &[(u8, EndpointType)]) -> Result<(Endpoint, Endpoint), TransportError> {
    let mut ep_in = Vec::new();
    let mut ep_out = Vec::new();
    for &(address, transfer_type) in endpoints {
        let kind = match transfer_type {
            EndpointType::Bulk => TransferKind::Bulk,
            EndpointType::Interrupt => TransferKind::Interrupt,
            other => {
                return Err(TransportError::EndpointTopology(format!(
                    "endpoint {address:#04x} has unsupported transfer type {other:?}"
                )));
            }
        };
        let endpoint = Endpoint { address, kind };
        if address & 0x80 != 0 {
            ep_in.push(endpoint);
        } else {
            ep_out.push(endpoint);
        }
    }

    match (ep_in.as_slice(), ep_out.as_slice()) {
        ([ep_in], [ep_out]) => {
            if ep_in.kind != ep_out.kind {
                warn!(
                    "IN endpoint is {:?} but OUT endpoint is {:?}",
                    ep_in.kind, ep_out.kind
                );
            }
            Ok((*ep_in, *ep_out))
        }
        _ => Err(TransportError::EndpointTopology(format!(
            "expected one IN and one OUT endpoint, found {} IN and {} OUT",
            ep_in.len(),
            ep_out.len()
        ))),
    }
}

impl Transport for UsbTransport {
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        debug!(bytes = hex::encode(data), "USB Write");
        let data = data.to_vec();
        let transfer = match self.ep_out.kind {
            TransferKind::Bulk => self.interface.bulk_out(self.ep_out.address, data),
            TransferKind::Interrupt => self.interface.interrupt_out(self.ep_out.address, data),
        };
        let completion = timeout(self.timeout, transfer).await?;
        completion.into_result()?;
        Ok(())
    }

    async fn read(&mut self, max_len: usize) -> Result<Bytes, TransportError> {
        let buffer = RequestBuffer::new(max_len);
        let transfer = match self.ep_in.kind {
            TransferKind::Bulk => self.interface.bulk_in(self.ep_in.address, buffer),
            TransferKind::Interrupt => self.interface.interrupt_in(self.ep_in.address, buffer),
        };
        let completion = timeout(self.timeout, transfer).await?;
        let data = completion.into_result()?;
        debug!(bytes = hex::encode(&data), "USB Read");
        Ok(Bytes::from(data))
    }
}
