//! LYWSD02 Time Sync
//!
//! Sets the clock, timezone offset, temperature unit and 12/24h mode of
//! LYWSD02-class BLE thermometers.
//!
//! # Example
//!
//! ```ignore
//! use lywsd02_sync::{BleHost, SyncConfig, SyncRequest, Synchronizer};
//! use lywsd02_sync::proto::TemperatureUnit;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::load()?;
//!     let host = BleHost::default_adapter(config.scan_duration()).await?;
//!     let sync = Synchronizer::new(host.clone(), host, config);
//!
//!     let request = SyncRequest::new("E7:2E:00:12:34:56")
//!         .with_timezone("Europe/Paris")
//!         .with_unit(TemperatureUnit::Celsius);
//!     let report = sync.synchronize(&request).await?;
//!     println!("sent epoch {}", report.settings.epoch_seconds);
//!
//!     Ok(())
//! }
//! ```

pub mod ble;
mod config;
mod error;
#[cfg(test)]
mod mock;
pub mod offset;
mod request;
mod sync;
pub mod transport;

pub use ble::{BleHost, BleLink};
pub use config::{ConfigError, SyncConfig, lywsd02_home};
pub use error::{ConnectionError, SyncError, WriteError, WriteStep};
pub use offset::{OffsetError, offset_hours, timezone_names, try_offset_hours};
pub use request::{DEFAULT_TIMEOUT_SECS, OFFSET_RANGE, ResolvedSettings, SyncRequest};
pub use sync::{
    SyncOutcome, SyncReport, Synchronizer, TIME_CHARACTERISTIC, UNITS_CHARACTERISTIC,
    WrittenRecord,
};
pub use transport::{DeviceDiscovery, Link, ScopedLink, Transport};

pub use lywsd02_proto as proto;
