use std::fmt;
use std::time::Duration;

use uuid::Uuid;

use crate::request::ResolvedSettings;

/// One characteristic write of a sync attempt, in the order they happen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteStep {
    Time,
    Unit,
    ClockMode,
}

impl WriteStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteStep::Time => "time",
            WriteStep::Unit => "unit",
            WriteStep::ClockMode => "clockMode",
        }
    }
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to establish a link with the peripheral
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("bluetooth error: {0}")]
    Ble(#[from] btleplug::Error),
    #[error("{0}")]
    Other(String),
}

/// Failure of a single characteristic write on an open link
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),
    #[error("bluetooth error: {0}")]
    Ble(#[from] btleplug::Error),
    #[error("{0}")]
    Other(String),
}

/// Why a sync attempt ended without applying every requested setting
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("device {address} not found{}", not_found_hint(.advertising_only))]
    DeviceNotFound {
        address: String,
        /// The device is advertising but the host cannot connect to it
        advertising_only: bool,
    },

    #[error("failed to connect to {address}: {source}")]
    ConnectionFailed {
        address: String,
        #[source]
        source: ConnectionError,
    },

    #[error("{step} write to {address} failed: {source}")]
    WriteFailed {
        address: String,
        step: WriteStep,
        /// Writes that completed before the failing one
        applied: Vec<WriteStep>,
        settings: ResolvedSettings,
        #[source]
        source: WriteError,
    },
}

impl SyncError {
    /// Writes the device accepted before the attempt failed
    pub fn applied(&self) -> &[WriteStep] {
        match self {
            SyncError::WriteFailed { applied, .. } => applied,
            _ => &[],
        }
    }

    /// True when some settings reached the device and some did not
    pub fn is_partial(&self) -> bool {
        !self.applied().is_empty()
    }
}

fn not_found_hint(advertising_only: &bool) -> &'static str {
    if *advertising_only {
        " (in range but not connectable)"
    } else {
        ""
    }
}
