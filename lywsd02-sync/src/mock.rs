//! In-memory discovery and transport that record every call

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{ConnectionError, WriteError};
use crate::transport::{DeviceDiscovery, Link, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    FindConnectable(String),
    FindAny(String),
    Open(String, Duration),
    /// An `open` dropped before it finished
    AbandonOpen(String),
    Write {
        address: String,
        characteristic: Uuid,
        payload: Vec<u8>,
    },
    Close(String),
    Release(String),
}

pub struct Behavior {
    pub connectable: bool,
    pub advertising: bool,
    pub connect_error: bool,
    /// `open` never completes
    pub hang_open: bool,
    pub reports_connected: bool,
    /// Index of the write on a link that fails
    pub fail_write: Option<usize>,
    /// Index of the write on a link that never completes
    pub hang_write: Option<usize>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            connectable: true,
            advertising: true,
            connect_error: false,
            hang_open: false,
            reports_connected: true,
            fail_write: None,
            hang_write: None,
        }
    }
}

#[derive(Default)]
struct Recorded {
    events: Vec<Event>,
    write_times: Vec<Instant>,
}

#[derive(Clone)]
pub struct MockHost {
    recorded: Arc<Mutex<Recorded>>,
    behavior: Arc<Behavior>,
}

impl MockHost {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            recorded: Arc::default(),
            behavior: Arc::new(behavior),
        }
    }

    fn record(&self, event: Event) {
        self.recorded.lock().unwrap().events.push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.recorded.lock().unwrap().events.clone()
    }

    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Write {
                    characteristic,
                    payload,
                    ..
                } => Some((characteristic, payload)),
                _ => None,
            })
            .collect()
    }

    pub fn write_times(&self) -> Vec<Instant> {
        self.recorded.lock().unwrap().write_times.clone()
    }

    pub fn opened(&self) -> usize {
        self.events().iter().filter(|e| matches!(e, Event::Open(..))).count()
    }

    /// Links that were closed or released
    pub fn ended(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Close(_) | Event::Release(_)))
            .count()
    }
}

impl DeviceDiscovery for MockHost {
    type Handle = String;

    async fn find_connectable(&self, address: &str) -> Option<String> {
        self.record(Event::FindConnectable(address.to_string()));
        self.behavior.connectable.then(|| address.to_string())
    }

    async fn find_any(&self, address: &str) -> Option<String> {
        self.record(Event::FindAny(address.to_string()));
        self.behavior.advertising.then(|| address.to_string())
    }
}

impl Transport for MockHost {
    type Handle = String;
    type Link = MockLink;

    async fn open(&self, address: String, timeout: Duration) -> Result<MockLink, ConnectionError> {
        self.record(Event::Open(address.clone(), timeout));
        tokio::task::yield_now().await;
        if self.behavior.hang_open {
            let _pending = PendingOpen {
                host: self.clone(),
                address: address.clone(),
            };
            std::future::pending::<()>().await;
        }
        if self.behavior.connect_error {
            return Err(ConnectionError::Other("connection refused".to_string()));
        }
        Ok(MockLink {
            address,
            host: self.clone(),
            writes: AtomicUsize::new(0),
        })
    }
}

struct PendingOpen {
    host: MockHost,
    address: String,
}

impl Drop for PendingOpen {
    fn drop(&mut self) {
        self.host.record(Event::AbandonOpen(self.address.clone()));
    }
}

pub struct MockLink {
    address: String,
    host: MockHost,
    writes: AtomicUsize,
}

impl Link for MockLink {
    async fn is_connected(&self) -> bool {
        self.host.behavior.reports_connected
    }

    async fn write(&self, characteristic: Uuid, payload: &[u8]) -> Result<(), WriteError> {
        let index = self.writes.fetch_add(1, Ordering::SeqCst);
        if self.host.behavior.hang_write == Some(index) {
            std::future::pending::<()>().await;
        }

        {
            let mut recorded = self.host.recorded.lock().unwrap();
            recorded.events.push(Event::Write {
                address: self.address.clone(),
                characteristic,
                payload: payload.to_vec(),
            });
            recorded.write_times.push(Instant::now());
        }
        tokio::task::yield_now().await;

        if self.host.behavior.fail_write == Some(index) {
            return Err(WriteError::Other("write rejected".to_string()));
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.host.record(Event::Close(self.address.clone()));
    }

    fn release(&mut self) {
        self.host.record(Event::Release(self.address.clone()));
    }
}
