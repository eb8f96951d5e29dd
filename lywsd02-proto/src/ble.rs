//! BLE GATT Characteristic Constants for LYWSD02 Clock Sync
//!
//! The device exposes both characteristics on its vendor service. Clock mode
//! has no characteristic of its own: it is written to the time characteristic
//! with a longer payload (see [`crate::ClockModeRecord`]).

/// Time Characteristic UUID (write), as a 128-bit value
///
/// Callers build their own UUID type from it, e.g. `Uuid::from_u128`.
///
/// Accepts the 5-byte time record and the 7-byte clock mode record.
pub const TIME_UUID: u128 = 0xebe0ccb7_7a0a_4b0c_8a1a_6ff2997da3a6;

/// Temperature Unit Characteristic UUID (write)
pub const UNITS_UUID: u128 = 0xebe0ccbe_7a0a_4b0c_8a1a_6ff2997da3a6;

/// Unit bytes written to the units characteristic
pub mod units {
    /// Display temperatures in degrees Celsius
    pub const CELSIUS: u8 = 0xFF;

    /// Display temperatures in degrees Fahrenheit
    pub const FAHRENHEIT: u8 = 0x01;
}

/// Clock mode sentinel, last byte of the clock mode record
pub mod clock {
    pub const TWELVE_HOUR: u8 = 0xAA;
    pub const TWENTY_FOUR_HOUR: u8 = 0x00;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn characteristics_share_vendor_base() {
        assert_eq!(format!("{TIME_UUID:032x}"), "ebe0ccb77a0a4b0c8a1a6ff2997da3a6");
        assert_eq!(TIME_UUID & !(0xffu128 << 96), UNITS_UUID & !(0xffu128 << 96));
    }
}
