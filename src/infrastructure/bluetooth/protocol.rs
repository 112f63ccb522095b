//! Scale Protocol
//!
//! This module contains the protocol definitions for talking to the
//! body-composition scale: GATT identifiers, the broadcast payload layout,
//! and the configuration frames written during reconfiguration.

use crate::domain::error::DecodeError;
use crate::domain::models::{ControlFlags, DeviceDateTime, Measurement, RawPayload, Unit};
use anyhow::Result;
use tracing::trace;

/// Body Composition Service UUID (standard 0x181B)
pub const BODY_COMPOSITION_SERVICE_UUID: &str = "0000181b-0000-1000-8000-00805f9b34fb";

/// Body Composition History Characteristic UUID - vendor extension on the standard service
pub const BODY_COMPOSITION_HISTORY_CHAR_UUID: &str = "00002a2f-0000-3512-2118-0009af100700";

/// Current Time Characteristic UUID (standard 0x2A2B)
pub const CURRENT_TIME_CHAR_UUID: &str = "00002a2b-0000-1000-8000-00805f9b34fb";

/// Vendor configuration service UUID
pub const CONFIGURATION_SERVICE_UUID: &str = "00001530-0000-3512-2118-0009af100700";

/// Scale Configuration Characteristic UUID - where unit changes are written
pub const SCALE_CONFIGURATION_CHAR_UUID: &str = "00001542-0000-3512-2118-0009af100700";

/// Bytes in a complete broadcast payload
pub const PAYLOAD_LEN: usize = 13;

/// Raw weight and impedance are hundredths
const FIELD_SCALE: f64 = 0.01;

/// Configuration commands written to the scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleCommand {
    /// Change the display/report unit
    SetUnit(Unit),
    /// Set the scale's local clock
    SetTime(DeviceDateTime),
}

impl ScaleCommand {
    /// Get the raw bytes for this command
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::SetUnit(unit) => vec![0x06, 0x04, 0x00, unit.code()],
            Self::SetTime(time) => {
                let [year_low, year_high] = time.year.to_le_bytes();
                vec![
                    year_low,
                    year_high,
                    time.month,
                    time.day,
                    time.hour,
                    time.minute,
                    time.second,
                    0x03,
                    0x00,
                    0x00,
                ]
            }
        }
    }
}

/// Decode a broadcast payload
///
/// # Payload Structure (13 bytes)
///
/// ```text
/// [0-1]   : Control flags (u16 big-endian)
///           0x0002: impedance stable
///           0x0020: weight stable
///           0x0040: imperial unit
///           0x0100: catty unit
/// [2-3]   : Year (u16 little-endian)
/// [4]     : Month
/// [5]     : Day
/// [6]     : Hour
/// [7]     : Minute
/// [8]     : Second
/// [9-10]  : Impedance (u16 little-endian, hundredths of an ohm)
/// [11-12] : Weight (u16 little-endian, hundredths; metric reports double)
/// ```
///
/// Trailing bytes beyond the layout are ignored.
pub fn decode(payload: &RawPayload) -> Result<Measurement, DecodeError> {
    let flags = read_flags(payload)?;
    let bytes = payload.as_bytes();

    #[cfg(debug_assertions)]
    trace!("Raw payload: {:02X?}", bytes);

    let timestamp = DeviceDateTime {
        year: u16::from_le_bytes([bytes[2], bytes[3]]),
        month: bytes[4],
        day: bytes[5],
        hour: bytes[6],
        minute: bytes[7],
        second: bytes[8],
    };

    let impedance = u16::from_le_bytes([bytes[9], bytes[10]]) as f64 * FIELD_SCALE;
    let mut weight = u16::from_le_bytes([bytes[11], bytes[12]]) as f64 * FIELD_SCALE;

    let unit = resolve_unit(flags)?;
    if unit == Unit::Metric {
        weight /= 2.0;
    }

    Ok(Measurement {
        flags,
        weight,
        impedance,
        unit,
        timestamp,
    })
}

/// Control flags only, after the same length check as [`decode`]
pub fn read_flags(payload: &RawPayload) -> Result<ControlFlags, DecodeError> {
    let bytes = payload.as_bytes();
    if bytes.len() < PAYLOAD_LEN {
        return Err(DecodeError::MalformedPayload { len: bytes.len() });
    }
    Ok(ControlFlags::new(u16::from_be_bytes([bytes[0], bytes[1]])))
}

/// Work out the reporting unit from the control flags
fn resolve_unit(flags: ControlFlags) -> Result<Unit, DecodeError> {
    match (
        flags.contains(ControlFlags::CATTY),
        flags.contains(ControlFlags::IMPERIAL),
    ) {
        (false, false) => Ok(Unit::Metric),
        (true, false) => Ok(Unit::Catty),
        (false, true) => Ok(Unit::Imperial),
        (true, true) => Err(DecodeError::AmbiguousUnit { flags: flags.bits() }),
    }
}

/// Parse a UUID string into its 128-bit value
pub fn parse_uuid(uuid_str: &str) -> Result<u128> {
    let uuid_str = uuid_str.replace('-', "");

    if uuid_str.len() != 32 {
        return Err(anyhow::anyhow!("Invalid UUID format"));
    }

    Ok(u128::from_str_radix(&uuid_str, 16)?)
}
