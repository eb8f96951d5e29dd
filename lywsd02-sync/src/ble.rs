//! btleplug implementation of discovery and transport
//!
//! "Connectable" here means the host stack has seen the device advertise
//! (it has an RSSI); a peripheral that is only cached from an earlier session
//! is returned by [`DeviceDiscovery::find_any`] but not by
//! [`DeviceDiscovery::find_connectable`].

use std::time::Duration;

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use uuid::Uuid;

use crate::error::{ConnectionError, WriteError};
use crate::transport::{DeviceDiscovery, Link, Transport};

/// Get the default Bluetooth adapter
pub async fn get_adapter() -> Result<Adapter, ConnectionError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters
        .into_iter()
        .next()
        .ok_or_else(|| ConnectionError::Other("no Bluetooth adapter found".to_string()))
}

/// The host's Bluetooth adapter, acting as both discovery and transport
#[derive(Clone)]
pub struct BleHost {
    adapter: Adapter,
    scan_duration: Duration,
}

impl BleHost {
    pub fn new(adapter: Adapter, scan_duration: Duration) -> Self {
        Self {
            adapter,
            scan_duration,
        }
    }

    /// Use the first adapter on the system
    pub async fn default_adapter(scan_duration: Duration) -> Result<Self, ConnectionError> {
        Ok(Self::new(get_adapter().await?, scan_duration))
    }

    /// Look up a peripheral the adapter already knows. The flag tells whether
    /// it is currently advertising.
    async fn known(&self, address: &str) -> Result<Option<(Peripheral, bool)>, btleplug::Error> {
        for peripheral in self.adapter.peripherals().await? {
            if !matches_address(&peripheral, address) {
                continue;
            }
            let advertising = peripheral
                .properties()
                .await?
                .is_some_and(|props| props.rssi.is_some());
            return Ok(Some((peripheral, advertising)));
        }
        Ok(None)
    }

    async fn scan(&self) -> Result<(), btleplug::Error> {
        log::debug!("scanning for {}s", self.scan_duration.as_secs());
        self.adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(self.scan_duration).await;
        self.adapter.stop_scan().await
    }

    async fn find_connectable_inner(
        &self,
        address: &str,
    ) -> Result<Option<Peripheral>, btleplug::Error> {
        if let Some((peripheral, true)) = self.known(address).await? {
            return Ok(Some(peripheral));
        }
        self.scan().await?;
        Ok(match self.known(address).await? {
            Some((peripheral, true)) => Some(peripheral),
            _ => None,
        })
    }
}

fn matches_address(peripheral: &Peripheral, address: &str) -> bool {
    peripheral.address().to_string().eq_ignore_ascii_case(address)
}

impl DeviceDiscovery for BleHost {
    type Handle = Peripheral;

    async fn find_connectable(&self, address: &str) -> Option<Peripheral> {
        match self.find_connectable_inner(address).await {
            Ok(found) => found,
            Err(e) => {
                log::warn!("{address}: discovery failed: {e}");
                None
            }
        }
    }

    async fn find_any(&self, address: &str) -> Option<Peripheral> {
        match self.known(address).await {
            Ok(found) => found.map(|(peripheral, _)| peripheral),
            Err(e) => {
                log::warn!("{address}: discovery failed: {e}");
                None
            }
        }
    }
}

impl Transport for BleHost {
    type Handle = Peripheral;
    type Link = BleLink;

    async fn open(
        &self,
        peripheral: Peripheral,
        timeout: Duration,
    ) -> Result<BleLink, ConnectionError> {
        let mut pending = PendingConnect(Some(peripheral.clone()));

        let connect = async {
            peripheral.connect().await?;
            peripheral.discover_services().await
        };
        let result = match tokio::time::timeout(timeout, connect).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::Ble(e)),
            Err(_) => Err(ConnectionError::Timeout(timeout)),
        };

        pending.0 = None;
        match result {
            Ok(()) => Ok(BleLink { peripheral }),
            Err(e) => {
                disconnect(&peripheral).await;
                Err(e)
            }
        }
    }
}

/// Disconnects from `Drop` if `open` is cancelled halfway
struct PendingConnect(Option<Peripheral>);

impl Drop for PendingConnect {
    fn drop(&mut self) {
        if let Some(peripheral) = self.0.take() {
            spawn_disconnect(peripheral);
        }
    }
}

/// A connected peripheral with discovered services
pub struct BleLink {
    peripheral: Peripheral,
}

impl Link for BleLink {
    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn write(&self, characteristic: Uuid, payload: &[u8]) -> Result<(), WriteError> {
        let target = self
            .peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic)
            .ok_or(WriteError::CharacteristicNotFound(characteristic))?;

        self.peripheral
            .write(&target, payload, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    async fn close(&mut self) {
        disconnect(&self.peripheral).await;
    }

    fn release(&mut self) {
        spawn_disconnect(self.peripheral.clone());
    }
}

async fn disconnect(peripheral: &Peripheral) {
    if let Err(e) = peripheral.disconnect().await {
        log::warn!("{}: failed to disconnect: {e}", peripheral.address());
    }
}

fn spawn_disconnect(peripheral: Peripheral) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move { disconnect(&peripheral).await });
        }
        Err(_) => log::warn!(
            "{}: no runtime to disconnect on, link left to the host stack",
            peripheral.address()
        ),
    }
}
