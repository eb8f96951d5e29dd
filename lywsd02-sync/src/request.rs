//! Sync request as received from a caller, and the settings derived from it

use chrono::{DateTime, Utc};
use lywsd02_proto::{ClockMode, ClockModeRecord, TemperatureUnit, TimeRecord};
use serde::{Deserialize, Serialize};

use crate::config::{SyncConfig, unit_symbol};
use crate::error::SyncError;
use crate::offset;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Offsets the device can display, in hours
pub const OFFSET_RANGE: std::ops::RangeInclusive<i32> = -12..=14;

/// A request to push time and display settings to one device
///
/// Field aliases accept the `set_time` service call shape (`mac`, `tz_offset`,
/// `temp_mode`, `timestamp`, `timeout`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    #[serde(alias = "mac")]
    address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    #[serde(default, alias = "tz_offset", skip_serializing_if = "Option::is_none")]
    pub offset_hours: Option<i32>,

    #[serde(default, alias = "temp_mode", with = "unit_symbol")]
    pub temperature_unit: Option<TemperatureUnit>,

    #[serde(default, with = "clock_hours")]
    pub clock_mode: Option<ClockMode>,

    #[serde(default, alias = "timestamp", skip_serializing_if = "Option::is_none")]
    pub epoch_override: Option<i64>,

    #[serde(default = "default_timeout", alias = "timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl SyncRequest {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timezone: None,
            offset_hours: None,
            temperature_unit: None,
            clock_mode: None,
            epoch_override: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    pub fn with_offset_hours(mut self, hours: i32) -> Self {
        self.offset_hours = Some(hours);
        self
    }

    pub fn with_unit(mut self, unit: TemperatureUnit) -> Self {
        self.temperature_unit = Some(unit);
        self
    }

    pub fn with_clock_mode(mut self, mode: ClockMode) -> Self {
        self.clock_mode = Some(mode);
        self
    }

    pub fn with_epoch(mut self, epoch_seconds: i64) -> Self {
        self.epoch_override = Some(epoch_seconds);
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Check the request without touching any device, returning the
    /// normalized (trimmed, uppercase) address
    pub fn validate(&self) -> Result<String, SyncError> {
        let address = self.address.trim().to_uppercase();
        if address.is_empty() {
            return Err(SyncError::InvalidRequest("address is empty".to_string()));
        }
        if address.chars().any(char::is_whitespace) {
            return Err(SyncError::InvalidRequest(format!(
                "address {:?} contains whitespace",
                self.address
            )));
        }

        if let Some(hours) = self.offset_hours
            && !OFFSET_RANGE.contains(&hours)
        {
            return Err(SyncError::InvalidRequest(format!(
                "offset {hours}h outside {}..={}",
                OFFSET_RANGE.start(),
                OFFSET_RANGE.end()
            )));
        }

        if let Some(epoch) = self.epoch_override
            && u32::try_from(epoch).is_err()
        {
            return Err(SyncError::InvalidRequest(format!(
                "timestamp {epoch} does not fit in 32 bits"
            )));
        }

        if self.timeout_secs == 0 {
            return Err(SyncError::InvalidRequest("timeout must be positive".to_string()));
        }

        Ok(address)
    }

    /// Turn the request into concrete values, filling gaps from `config`
    ///
    /// `now` is used both for the timezone offset and, without an override,
    /// for the epoch sent to the device.
    pub fn resolve(
        &self,
        config: &SyncConfig,
        now: DateTime<Utc>,
    ) -> Result<ResolvedSettings, SyncError> {
        let (utc_offset_hours, timezone) = match self.offset_hours {
            Some(hours) => (hours, None),
            None => {
                let timezone = self.timezone.as_deref().unwrap_or(&config.timezone);
                let hours = if config.strict_timezone {
                    offset::try_offset_hours(timezone, now)
                        .map_err(|e| SyncError::InvalidRequest(e.to_string()))?
                } else {
                    offset::offset_hours(timezone, now)
                };
                (hours, Some(timezone.to_string()))
            }
        };
        let utc_offset_hours = i8::try_from(utc_offset_hours).map_err(|_| {
            SyncError::InvalidRequest(format!("offset {utc_offset_hours}h out of range"))
        })?;

        let epoch = self.epoch_override.unwrap_or_else(|| now.timestamp());
        let epoch_seconds = u32::try_from(epoch)
            .map_err(|_| SyncError::InvalidRequest(format!("timestamp {epoch} out of range")))?;

        Ok(ResolvedSettings {
            utc_offset_hours,
            epoch_seconds,
            timezone,
            temperature_unit: self.temperature_unit.or(config.temperature_unit),
            clock_mode: self.clock_mode,
        })
    }
}

/// Write-ready values for one attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSettings {
    pub utc_offset_hours: i8,
    pub epoch_seconds: u32,
    /// Timezone the offset came from; `None` for an explicit offset
    pub timezone: Option<String>,
    #[serde(with = "unit_symbol")]
    pub temperature_unit: Option<TemperatureUnit>,
    #[serde(with = "clock_hours")]
    pub clock_mode: Option<ClockMode>,
}

impl ResolvedSettings {
    pub fn time_record(&self) -> TimeRecord {
        TimeRecord::new(self.epoch_seconds, self.utc_offset_hours)
    }

    pub fn unit_payload(&self) -> Option<[u8; 1]> {
        self.temperature_unit.map(TemperatureUnit::to_bytes)
    }

    pub fn clock_mode_payload(&self) -> Option<[u8; ClockModeRecord::LEN]> {
        self.clock_mode.map(|mode| ClockModeRecord::new(mode).to_bytes())
    }
}

/// Clock mode as 12/24 in JSON
mod clock_hours {
    use lywsd02_proto::ClockMode;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(mode: &Option<ClockMode>, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer {
        match mode {
            Some(mode) => serializer.serialize_u8(mode.hours()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<ClockMode>, D::Error>
    where D: Deserializer<'de> {
        match Option::<u8>::deserialize(deserializer)? {
            None => Ok(None),
            Some(hours) => ClockMode::from_hours(hours)
                .map(Some)
                .ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        "invalid clock mode {hours}, expected 12 or 24"
                    ))
                }),
        }
    }
}
