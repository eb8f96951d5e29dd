//! Timezone name to whole-hour UTC offset

use chrono::{DateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

#[derive(Debug, thiserror::Error)]
pub enum OffsetError {
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),
}

/// Parse a timezone database name, e.g. "Europe/Paris"
pub fn parse_timezone(name: &str) -> Result<Tz, OffsetError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| OffsetError::UnknownTimezone(name.to_string()))
}

/// UTC offset of `timezone` at `at`, truncated toward zero to whole hours
///
/// Daylight saving is applied for the given instant, so the same name yields
/// different values in winter and summer.
pub fn try_offset_hours(timezone: &str, at: DateTime<Utc>) -> Result<i32, OffsetError> {
    let tz = parse_timezone(timezone)?;
    let offset = tz.offset_from_utc_datetime(&at.naive_utc()).fix();
    Ok(offset.local_minus_utc() / 3600)
}

/// Like [`try_offset_hours`], but an unknown timezone degrades to offset 0
/// with a warning instead of failing.
pub fn offset_hours(timezone: &str, at: DateTime<Utc>) -> i32 {
    match try_offset_hours(timezone, at) {
        Ok(hours) => {
            log::debug!("resolved timezone {timezone:?} to offset {hours}h");
            hours
        }
        Err(e) => {
            log::warn!("{e}, using offset 0h");
            0
        }
    }
}

/// All timezone names known to the database, sorted
pub fn timezone_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = chrono_tz::TZ_VARIANTS.iter().map(|tz| tz.name()).collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn paris_winter_and_summer() {
        assert_eq!(try_offset_hours("Europe/Paris", at(2024, 1, 15)).unwrap(), 1);
        assert_eq!(try_offset_hours("Europe/Paris", at(2024, 7, 15)).unwrap(), 2);
    }

    #[test]
    fn southern_hemisphere_dst() {
        assert_eq!(try_offset_hours("Australia/Sydney", at(2024, 1, 15)).unwrap(), 11);
        assert_eq!(try_offset_hours("Australia/Sydney", at(2024, 7, 15)).unwrap(), 10);
    }

    #[test]
    fn negative_offsets() {
        assert_eq!(try_offset_hours("America/New_York", at(2024, 1, 15)).unwrap(), -5);
        assert_eq!(try_offset_hours("America/New_York", at(2024, 7, 15)).unwrap(), -4);
    }

    #[test]
    fn half_hour_zones_truncate_toward_zero() {
        assert_eq!(try_offset_hours("Asia/Kolkata", at(2024, 1, 15)).unwrap(), 5);
        // -03:30
        assert_eq!(try_offset_hours("America/St_Johns", at(2024, 1, 15)).unwrap(), -3);
    }

    #[test]
    fn transition_instant() {
        // 2024-03-31 01:00 UTC is when Paris moves to CEST
        let before = Utc.with_ymd_and_hms(2024, 3, 31, 0, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 3, 31, 1, 0, 0).unwrap();
        assert_eq!(try_offset_hours("Europe/Paris", before).unwrap(), 1);
        assert_eq!(try_offset_hours("Europe/Paris", after).unwrap(), 2);
    }

    #[test]
    fn unknown_timezone() {
        assert!(matches!(
            try_offset_hours("Mars/Olympus_Mons", at(2024, 1, 15)),
            Err(OffsetError::UnknownTimezone(_))
        ));
        assert_eq!(offset_hours("Mars/Olympus_Mons", at(2024, 1, 15)), 0);
        assert_eq!(offset_hours("", at(2024, 1, 15)), 0);
    }

    #[test]
    fn utc() {
        assert_eq!(offset_hours("UTC", at(2024, 7, 15)), 0);
    }

    #[test]
    fn names_are_sorted_and_parse() {
        let names = timezone_names();
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
        assert!(names.contains(&"Europe/Paris"));
        assert!(names.iter().all(|n| parse_timezone(n).is_ok()));
    }
}
