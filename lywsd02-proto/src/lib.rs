//! LYWSD02 wire protocol - payload records written over GATT
//!
//! Multi-byte fields are little-endian. There is no framing: each record is
//! the whole value of one characteristic write.

use std::fmt;
use std::io;
use std::str::FromStr;

pub mod ble;

/// Temperature unit shown on the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Single byte written to the units characteristic
    pub fn to_byte(self) -> u8 {
        match self {
            TemperatureUnit::Celsius => ble::units::CELSIUS,
            TemperatureUnit::Fahrenheit => ble::units::FAHRENHEIT,
        }
    }

    pub fn to_bytes(self) -> [u8; 1] {
        [self.to_byte()]
    }

    /// Short symbol, "C" or "F"
    pub fn symbol(self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "C",
            TemperatureUnit::Fahrenheit => "F",
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Error parsing a unit or clock mode from text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSettingError {
    what: &'static str,
    input: String,
}

impl fmt::Display for ParseSettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {:?}", self.what, self.input)
    }
}

impl std::error::Error for ParseSettingError {}

impl FromStr for TemperatureUnit {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "C" | "CELSIUS" => Ok(TemperatureUnit::Celsius),
            "F" | "FAHRENHEIT" => Ok(TemperatureUnit::Fahrenheit),
            _ => Err(ParseSettingError {
                what: "temperature unit",
                input: s.to_string(),
            }),
        }
    }
}

/// 12 or 24 hour clock display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockMode {
    TwelveHour,
    TwentyFourHour,
}

impl ClockMode {
    pub fn hours(self) -> u8 {
        match self {
            ClockMode::TwelveHour => 12,
            ClockMode::TwentyFourHour => 24,
        }
    }

    pub fn from_hours(hours: u8) -> Option<Self> {
        match hours {
            12 => Some(ClockMode::TwelveHour),
            24 => Some(ClockMode::TwentyFourHour),
            _ => None,
        }
    }

    fn sentinel(self) -> u8 {
        match self {
            ClockMode::TwelveHour => ble::clock::TWELVE_HOUR,
            ClockMode::TwentyFourHour => ble::clock::TWENTY_FOUR_HOUR,
        }
    }
}

impl fmt::Display for ClockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h", self.hours())
    }
}

impl FromStr for ClockMode {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches(['h', 'H']);
        trimmed
            .parse::<u8>()
            .ok()
            .and_then(ClockMode::from_hours)
            .ok_or_else(|| ParseSettingError {
                what: "clock mode",
                input: s.to_string(),
            })
    }
}

/// Time record: current UTC epoch plus the timezone offset the display adds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRecord {
    pub epoch_seconds: u32,
    pub offset_hours: i8,
}

impl TimeRecord {
    pub const LEN: usize = 5;

    pub fn new(epoch_seconds: u32, offset_hours: i8) -> Self {
        Self {
            epoch_seconds,
            offset_hours,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        buf[..4].copy_from_slice(&self.epoch_seconds.to_le_bytes());
        buf[4] = self.offset_hours.to_le_bytes()[0];
        buf
    }

    pub fn from_bytes(data: &[u8]) -> io::Result<Self> {
        if data.len() < Self::LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "time record too short"));
        }
        Ok(Self {
            epoch_seconds: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            offset_hours: i8::from_le_bytes([data[4]]),
        })
    }
}

/// Clock mode record, written to the time characteristic
///
/// The device tells the two payloads apart by length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockModeRecord {
    pub mode: ClockMode,
}

impl ClockModeRecord {
    pub const LEN: usize = 7;

    pub fn new(mode: ClockMode) -> Self {
        Self { mode }
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        buf[..4].copy_from_slice(&0u32.to_le_bytes());
        buf[4..6].copy_from_slice(&0u16.to_le_bytes());
        buf[6] = self.mode.sentinel();
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_record_layout() {
        let record = TimeRecord::new(1_718_000_000, 2);
        assert_eq!(record.to_bytes(), [0x80, 0x99, 0x66, 0x66, 0x02]);
    }

    #[test]
    fn time_record_negative_offset() {
        let record = TimeRecord::new(0x0102_0304, -5);
        assert_eq!(record.to_bytes(), [0x04, 0x03, 0x02, 0x01, 0xFB]);
    }

    #[test]
    fn time_record_decodes_whole_offset_range() {
        let epochs = [0, 1, 86_400, 1_718_000_000, i32::MAX as u32, u32::MAX - 1, u32::MAX];
        for offset in -12..=14 {
            for epoch in epochs {
                let bytes = TimeRecord::new(epoch, offset).to_bytes();
                let decoded = TimeRecord::from_bytes(&bytes).unwrap();
                assert_eq!(decoded, TimeRecord::new(epoch, offset), "{epoch} {offset}");
            }
        }
    }

    #[test]
    fn time_record_too_short() {
        let err = TimeRecord::from_bytes(&[1, 2, 3, 4]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn unit_bytes() {
        assert_eq!(TemperatureUnit::Fahrenheit.to_bytes(), [0x01]);
        assert_eq!(TemperatureUnit::Celsius.to_bytes(), [0xFF]);
    }

    #[test]
    fn clock_mode_record() {
        assert_eq!(
            ClockModeRecord::new(ClockMode::TwelveHour).to_bytes(),
            [0, 0, 0, 0, 0, 0, 0xAA]
        );
        assert_eq!(
            ClockModeRecord::new(ClockMode::TwentyFourHour).to_bytes(),
            [0, 0, 0, 0, 0, 0, 0x00]
        );
    }

    #[test]
    fn parse_unit() {
        assert_eq!("f".parse::<TemperatureUnit>().unwrap(), TemperatureUnit::Fahrenheit);
        assert_eq!(" C ".parse::<TemperatureUnit>().unwrap(), TemperatureUnit::Celsius);
        assert_eq!("celsius".parse::<TemperatureUnit>().unwrap(), TemperatureUnit::Celsius);
        assert!("K".parse::<TemperatureUnit>().is_err());
        assert!("".parse::<TemperatureUnit>().is_err());
    }

    #[test]
    fn parse_clock_mode() {
        assert_eq!("12".parse::<ClockMode>().unwrap(), ClockMode::TwelveHour);
        assert_eq!("24h".parse::<ClockMode>().unwrap(), ClockMode::TwentyFourHour);
        assert!("13".parse::<ClockMode>().is_err());
        assert!("abc".parse::<ClockMode>().is_err());
    }
}
