//! The sync attempt: resolve, connect, write, release

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lywsd02_proto::ble;
use serde::Serialize;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::{ConnectionError, SyncError, WriteStep};
use crate::request::{ResolvedSettings, SyncRequest};
use crate::transport::{DeviceDiscovery, Link, ScopedLink, Transport};

/// Time characteristic, also carries the clock mode record
pub const TIME_CHARACTERISTIC: Uuid = Uuid::from_u128(ble::TIME_UUID);

/// Temperature unit characteristic
pub const UNITS_CHARACTERISTIC: Uuid = Uuid::from_u128(ble::UNITS_UUID);

pub type SyncOutcome = Result<SyncReport, SyncError>;

/// One payload the device accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenRecord {
    #[serde(serialize_with = "step_name")]
    pub step: WriteStep,
    pub characteristic: Uuid,
    #[serde(serialize_with = "hex")]
    pub payload: Vec<u8>,
}

impl WrittenRecord {
    pub fn hex(&self) -> String {
        data_encoding::HEXLOWER.encode(&self.payload)
    }
}

/// Everything a successful attempt sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub address: String,
    pub settings: ResolvedSettings,
    pub written: Vec<WrittenRecord>,
}

impl SyncReport {
    fn new(address: &str, settings: ResolvedSettings) -> Self {
        Self {
            address: address.to_string(),
            settings,
            written: Vec::with_capacity(3),
        }
    }

    pub fn applied(&self) -> Vec<WriteStep> {
        self.written.iter().map(|w| w.step).collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum SyncState {
    Validating,
    ResolvingSettings,
    ResolvingDevice,
    Connecting,
    WritingTime,
    WritingUnit,
    WritingClockMode,
    Closed,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Validating => "validating",
            SyncState::ResolvingSettings => "resolving settings",
            SyncState::ResolvingDevice => "resolving device",
            SyncState::Connecting => "connecting",
            SyncState::WritingTime => "writing time",
            SyncState::WritingUnit => "writing unit",
            SyncState::WritingClockMode => "writing clock mode",
            SyncState::Closed => "closed",
        };
        f.write_str(name)
    }
}

fn enter(address: &str, state: SyncState) {
    log::debug!("{address}: {state}");
}

/// Pushes time and display settings to LYWSD02 devices
///
/// Holds no per-device state, so attempts for different addresses can run
/// concurrently on one instance. Attempts for the same address must not
/// overlap; [`Synchronizer::synchronize_many`] takes care of that.
pub struct Synchronizer<D, T> {
    discovery: D,
    transport: T,
    config: SyncConfig,
    clock: fn() -> DateTime<Utc>,
}

impl<D, T> Synchronizer<D, T>
where
    D: DeviceDiscovery + Sync,
    T: Transport<Handle = D::Handle> + Sync,
{
    pub fn new(discovery: D, transport: T, config: SyncConfig) -> Self {
        Self {
            discovery,
            transport,
            config,
            clock: Utc::now,
        }
    }

    /// Replace the source of "now", used for the offset and default epoch
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one sync attempt
    ///
    /// The time record is always written; unit and clock mode follow when
    /// resolved. Nothing is retried. Dropping the returned future releases
    /// the connection.
    pub async fn synchronize(&self, request: &SyncRequest) -> SyncOutcome {
        let result = self.attempt(request).await;
        match &result {
            Ok(report) => {
                let settings = &report.settings;
                let bytes: Vec<String> = report.written.iter().map(WrittenRecord::hex).collect();
                log::info!(
                    "Updated {}: time={}, offset={}h ({}), unit={}, clock={}, sent [{}]",
                    report.address,
                    settings.epoch_seconds,
                    settings.utc_offset_hours,
                    settings.timezone.as_deref().unwrap_or("explicit"),
                    display_or_unchanged(settings.temperature_unit),
                    display_or_unchanged(settings.clock_mode),
                    bytes.join(" "),
                );
            }
            Err(e @ SyncError::WriteFailed { applied, .. }) if !applied.is_empty() => {
                let applied: Vec<&str> = applied.iter().map(WriteStep::as_str).collect();
                log::error!("{e} (already applied: {})", applied.join(", "));
            }
            Err(e) => log::error!("{e}"),
        }
        result
    }

    /// Run several attempts: different addresses concurrently, the same
    /// address one after another. Outcomes are in request order.
    pub async fn synchronize_many(&self, requests: &[SyncRequest]) -> Vec<SyncOutcome> {
        let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
        for (index, request) in requests.iter().enumerate() {
            let key = request.address().trim().to_uppercase();
            match groups.iter_mut().find(|(address, _)| *address == key) {
                Some((_, indices)) => indices.push(index),
                None => groups.push((key, vec![index])),
            }
        }

        let runs = groups.into_iter().map(|(_, indices)| async move {
            let mut outcomes = Vec::with_capacity(indices.len());
            for index in indices {
                outcomes.push((index, self.synchronize(&requests[index]).await));
            }
            outcomes
        });

        let mut outcomes: Vec<(usize, SyncOutcome)> =
            futures::future::join_all(runs).await.into_iter().flatten().collect();
        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    async fn attempt(&self, request: &SyncRequest) -> SyncOutcome {
        enter(request.address(), SyncState::Validating);
        let address = request.validate()?;

        enter(&address, SyncState::ResolvingSettings);
        let settings = request.resolve(&self.config, (self.clock)())?;
        log::debug!(
            "{address}: epoch={} offset={}h unit={:?} clock={:?}",
            settings.epoch_seconds,
            settings.utc_offset_hours,
            settings.temperature_unit,
            settings.clock_mode,
        );

        enter(&address, SyncState::ResolvingDevice);
        let handle = self.resolve_device(&address).await?;

        enter(&address, SyncState::Connecting);
        let timeout = Duration::from_secs(request.timeout_secs);
        let open = self.transport.open(handle, timeout);
        let opened = match tokio::time::timeout(timeout, open).await {
            Ok(opened) => opened,
            Err(_) => Err(ConnectionError::Timeout(timeout)),
        };
        let link = opened.map_err(|source| SyncError::ConnectionFailed {
            address: address.clone(),
            source,
        })?;
        let link = ScopedLink::new(link);

        if !link.is_connected().await {
            log::debug!("{address}: link not ready, waiting {:?}", self.config.connect_settle());
            tokio::time::sleep(self.config.connect_settle()).await;
        }

        let result = self.write_all(&link, SyncReport::new(&address, settings)).await;
        link.close().await;
        enter(&address, SyncState::Closed);
        result
    }

    async fn resolve_device(&self, address: &str) -> Result<D::Handle, SyncError> {
        if let Some(handle) = self.discovery.find_connectable(address).await {
            return Ok(handle);
        }

        let advertising_only = self.discovery.find_any(address).await.is_some();
        if advertising_only {
            log::warn!("{address}: seen but not connectable, it may be busy with another host");
        } else {
            log::warn!("{address}: not found, out of range or powered off");
        }
        Err(SyncError::DeviceNotFound {
            address: address.to_string(),
            advertising_only,
        })
    }

    async fn write_all(&self, link: &T::Link, mut report: SyncReport) -> SyncOutcome {
        enter(&report.address, SyncState::WritingTime);
        let time = report.settings.time_record().to_bytes();
        write_step(link, &mut report, WriteStep::Time, TIME_CHARACTERISTIC, &time).await?;

        if let Some(unit) = report.settings.unit_payload() {
            tokio::time::sleep(self.config.write_settle()).await;
            enter(&report.address, SyncState::WritingUnit);
            write_step(link, &mut report, WriteStep::Unit, UNITS_CHARACTERISTIC, &unit).await?;
        }

        if let Some(mode) = report.settings.clock_mode_payload() {
            tokio::time::sleep(self.config.write_settle()).await;
            enter(&report.address, SyncState::WritingClockMode);
            write_step(link, &mut report, WriteStep::ClockMode, TIME_CHARACTERISTIC, &mode).await?;
        }

        Ok(report)
    }
}

async fn write_step<L: Link>(
    link: &L,
    report: &mut SyncReport,
    step: WriteStep,
    characteristic: Uuid,
    payload: &[u8],
) -> Result<(), SyncError> {
    log::debug!(
        "{}: {step} -> {characteristic}: {}",
        report.address,
        data_encoding::HEXLOWER.encode(payload)
    );

    if let Err(source) = link.write(characteristic, payload).await {
        return Err(SyncError::WriteFailed {
            address: report.address.clone(),
            step,
            applied: report.applied(),
            settings: report.settings.clone(),
            source,
        });
    }

    report.written.push(WrittenRecord {
        step,
        characteristic,
        payload: payload.to_vec(),
    });
    Ok(())
}

fn display_or_unchanged<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "unchanged".to_string(), |v| v.to_string())
}

fn step_name<S: serde::Serializer>(step: &WriteStep, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(step.as_str())
}

fn hex<S: serde::Serializer>(payload: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&data_encoding::HEXLOWER.encode(payload))
}
