//! Seams to the host BLE stack
//!
//! [`crate::Synchronizer`] only talks to a device through these traits. The
//! btleplug implementation lives in [`crate::ble`].

use std::future::Future;
use std::ops::Deref;
use std::time::Duration;

use uuid::Uuid;

use crate::error::{ConnectionError, WriteError};

/// Turns a hardware address into something the transport can connect to
pub trait DeviceDiscovery {
    type Handle: Send;

    /// A handle the host can open a connection to right now
    fn find_connectable(&self, address: &str) -> impl Future<Output = Option<Self::Handle>> + Send;

    /// Any handle for the address, including advertisement-only sightings
    fn find_any(&self, address: &str) -> impl Future<Output = Option<Self::Handle>> + Send;
}

/// Opens links to discovered devices
pub trait Transport {
    type Handle: Send;
    type Link: Link;

    /// Connect and make the GATT table available, bounded by `timeout`
    ///
    /// On failure nothing may be left connected.
    fn open(
        &self,
        handle: Self::Handle,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Link, ConnectionError>> + Send;
}

/// An open connection to one peripheral
pub trait Link: Send + Sync {
    /// Whether the transport considers the link up
    fn is_connected(&self) -> impl Future<Output = bool> + Send;

    fn write(
        &self,
        characteristic: Uuid,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), WriteError>> + Send;

    /// Disconnect and wait for it
    fn close(&mut self) -> impl Future<Output = ()> + Send;

    /// Start a disconnect without waiting; used when an attempt is dropped
    fn release(&mut self);
}

/// Link that is closed on every exit path
///
/// [`ScopedLink::close`] disconnects gracefully. If the guard is dropped
/// before that completes (early return, panic, or the owning future being
/// cancelled) the link is released from `Drop`.
pub struct ScopedLink<L: Link> {
    link: L,
    open: bool,
}

impl<L: Link> ScopedLink<L> {
    pub fn new(link: L) -> Self {
        Self { link, open: true }
    }

    pub async fn close(mut self) {
        self.link.close().await;
        self.open = false;
    }
}

impl<L: Link> Deref for ScopedLink<L> {
    type Target = L;

    fn deref(&self) -> &L {
        &self.link
    }
}

impl<L: Link> Drop for ScopedLink<L> {
    fn drop(&mut self) {
        if self.open {
            log::debug!("link dropped while open, releasing");
            self.link.release();
        }
    }
}
