//! Sync defaults - stored as config.json in LYWSD02_HOME

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lywsd02_proto::TemperatureUnit;
use serde::{Deserialize, Serialize};

use crate::offset;

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine home directory, set LYWSD02_HOME")]
    NoHome,
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Timezone(#[from] offset::OffsetError),
}

/// Defaults applied to every sync request, plus protocol timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Timezone used when a request carries neither a timezone nor an offset
    pub timezone: String,

    /// Unit written when a request does not name one; `null` skips the write
    #[serde(with = "unit_symbol")]
    pub temperature_unit: Option<TemperatureUnit>,

    /// Pause after connecting when the link is not reported up yet
    pub connect_settle_ms: u64,

    /// Pause between consecutive characteristic writes
    pub write_settle_ms: u64,

    /// How long the BLE adapter scans for a device it has not seen yet
    pub scan_secs: u64,

    /// Fail the sync on an unknown timezone instead of sending offset 0
    pub strict_timezone: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            temperature_unit: Some(TemperatureUnit::Celsius),
            connect_settle_ms: 1000,
            write_settle_ms: 500,
            scan_secs: 5,
            strict_timezone: false,
        }
    }
}

impl SyncConfig {
    pub fn connect_settle(&self) -> Duration {
        Duration::from_millis(self.connect_settle_ms)
    }

    pub fn write_settle(&self) -> Duration {
        Duration::from_millis(self.write_settle_ms)
    }

    pub fn scan_duration(&self) -> Duration {
        Duration::from_secs(self.scan_secs)
    }

    /// Set the default timezone, rejecting names the database does not know
    pub fn set_timezone(&mut self, name: &str) -> Result<(), ConfigError> {
        let tz = offset::parse_timezone(name)?;
        self.timezone = tz.name().to_string();
        Ok(())
    }

    /// Load from `dir/config.json`; a missing file yields the defaults
    pub fn load_from(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn save_to(&self, dir: &Path) -> Result<PathBuf, ConfigError> {
        fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Load from [`lywsd02_home`]
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&lywsd02_home()?)
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        self.save_to(&lywsd02_home()?)
    }
}

/// LYWSD02_HOME, or ~/.lywsd02 when unset
pub fn lywsd02_home() -> Result<PathBuf, ConfigError> {
    match std::env::var_os("LYWSD02_HOME") {
        Some(home) => Ok(PathBuf::from(home)),
        None => dirs::home_dir()
            .map(|home| home.join(".lywsd02"))
            .ok_or(ConfigError::NoHome),
    }
}

/// Temperature unit as "C"/"F" in JSON
pub(crate) mod unit_symbol {
    use lywsd02_proto::TemperatureUnit;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(unit: &Option<TemperatureUnit>, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer {
        match unit {
            Some(unit) => serializer.serialize_str(unit.symbol()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<TemperatureUnit>, D::Error>
    where D: Deserializer<'de> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        match s.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("lywsd02-config-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = scratch_dir("missing");
        let config = SyncConfig::load_from(&dir).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.connect_settle(), Duration::from_secs(1));
        assert_eq!(config.write_settle(), Duration::from_millis(500));
    }

    #[test]
    fn save_and_load() {
        let dir = scratch_dir("save");
        let mut config = SyncConfig::default();
        config.set_timezone("Europe/Paris").unwrap();
        config.temperature_unit = Some(TemperatureUnit::Fahrenheit);
        config.write_settle_ms = 750;

        let path = config.save_to(&dir).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"temperature_unit\": \"F\""));

        assert_eq!(SyncConfig::load_from(&dir).unwrap(), config);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"timezone": "Asia/Tokyo", "temperature_unit": "f"}"#).unwrap();
        assert_eq!(config.timezone, "Asia/Tokyo");
        assert_eq!(config.temperature_unit, Some(TemperatureUnit::Fahrenheit));
        assert_eq!(config.connect_settle_ms, 1000);
        assert!(!config.strict_timezone);
    }

    #[test]
    fn null_unit_disables_unit_write() {
        let config: SyncConfig = serde_json::from_str(r#"{"temperature_unit": null}"#).unwrap();
        assert_eq!(config.temperature_unit, None);
    }

    #[test]
    fn rejects_bad_unit() {
        assert!(serde_json::from_str::<SyncConfig>(r#"{"temperature_unit": "K"}"#).is_err());
    }

    #[test]
    fn rejects_unknown_timezone() {
        let mut config = SyncConfig::default();
        assert!(matches!(
            config.set_timezone("Europe/Atlantis"),
            Err(ConfigError::Timezone(_))
        ));
        assert_eq!(config.timezone, "UTC");
    }

    #[test]
    fn corrupt_file() {
        let dir = scratch_dir("corrupt");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(CONFIG_FILE), "{not json").unwrap();
        assert!(matches!(SyncConfig::load_from(&dir), Err(ConfigError::Parse { .. })));
        let _ = fs::remove_dir_all(&dir);
    }
}
