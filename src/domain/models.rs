use crate::domain::error::DecodeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Service-data block taken from the scale's advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload(Vec<u8>);

impl RawPayload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Parse a payload written as hex, e.g. `0022E8070C0F0A1E0050C31437`.
    pub fn from_hex(hex: &str) -> Result<Self, DecodeError> {
        let hex = hex.trim();
        if hex.len() % 2 != 0 {
            return Err(DecodeError::InvalidHex(format!(
                "odd number of digits ({})",
                hex.len()
            )));
        }

        let mut bytes = Vec::with_capacity(hex.len() / 2);
        for (i, pair) in hex.as_bytes().chunks(2).enumerate() {
            if !pair.iter().all(u8::is_ascii_hexdigit) {
                return Err(DecodeError::InvalidHex(format!(
                    "non-hex digit at offset {}",
                    i * 2
                )));
            }
            // Both digits are ASCII hex here
            let digits = std::str::from_utf8(pair)
                .map_err(|_| DecodeError::InvalidHex(format!("non-ASCII at offset {}", i * 2)))?;
            let byte = u8::from_str_radix(digits, 16)
                .map_err(|_| DecodeError::InvalidHex(format!("'{}' at offset {}", digits, i * 2)))?;
            bytes.push(byte);
        }

        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase hex rendering, two digits per byte.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// The last delivered payload, as persisted by the durable store.
///
/// Only ever compared for exact equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn of(payload: &RawPayload) -> Self {
        Self(payload.to_hex())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The 16-bit control word leading every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlFlags(u16);

impl ControlFlags {
    pub const IMPEDANCE_STABLE: u16 = 0x0002;
    pub const WEIGHT_STABLE: u16 = 0x0020;
    pub const IMPERIAL: u16 = 0x0040;
    pub const CATTY: u16 = 0x0100;

    pub fn new(bits: u16) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn contains(&self, mask: u16) -> bool {
        self.0 & mask != 0
    }
}

impl fmt::Display for ControlFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06X}", self.0)
    }
}

/// Weighing unit, both as reported in a reading and as configured on the scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Metric,
    Imperial,
    Catty,
}

impl Unit {
    /// Label used in the delivered payload.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Metric => "kg",
            Self::Imperial => "lbs",
            Self::Catty => "jin",
        }
    }

    /// Code written to the scale's configuration characteristic.
    pub fn code(&self) -> u8 {
        match self {
            Self::Metric => 0,
            Self::Imperial => 1,
            Self::Catty => 2,
        }
    }
}

/// Date and time fields as the scale stores them. Not calendar-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl fmt::Display for DeviceDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// A decoded weigh-in.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub flags: ControlFlags,
    /// In `unit`; already halved for metric readings.
    pub weight: f64,
    /// Ohms. Computed even when the flags mark it unstable.
    pub impedance: f64,
    pub unit: Unit,
    pub timestamp: DeviceDateTime,
}

impl Measurement {
    pub fn to_payload(&self) -> DeliveredPayload {
        DeliveredPayload {
            weight: format!("{:.2}", self.weight),
            impedance: format!("{:.2}", self.impedance),
            units: self.unit.label().to_string(),
            timestamp: self.timestamp.to_string(),
        }
    }
}

/// JSON document published on the data channel.
///
/// Field order and string-typed numbers are part of the consumer contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredPayload {
    #[serde(rename = "Weight")]
    pub weight: String,
    #[serde(rename = "Impedance")]
    pub impedance: String,
    #[serde(rename = "Units")]
    pub units: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
}

impl DeliveredPayload {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_parsing() {
        let payload = RawPayload::from_hex("0022E8070C0F0A1E0050C31437").unwrap();
        assert_eq!(payload.len(), 13);
        assert_eq!(payload.as_bytes()[2], 0xE8);
        assert_eq!(payload.to_hex(), "0022e8070c0f0a1e0050c31437");
    }

    #[test]
    fn test_hex_parsing_rejects_garbage() {
        assert!(matches!(
            RawPayload::from_hex("002"),
            Err(DecodeError::InvalidHex(_))
        ));
        assert!(matches!(
            RawPayload::from_hex("zz22"),
            Err(DecodeError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_hex_parsing_rejects_signs() {
        assert!(matches!(
            RawPayload::from_hex("+1+2"),
            Err(DecodeError::InvalidHex(_))
        ));
        assert!(matches!(
            RawPayload::from_hex("00-1"),
            Err(DecodeError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_fingerprint_is_exact_hex() {
        let a = RawPayload::new(vec![0x00, 0x22, 0xAB]);
        assert_eq!(Fingerprint::of(&a).as_str(), "0022ab");
        assert_ne!(Fingerprint::of(&a), Fingerprint::new("0022AB"));
    }

    #[test]
    fn test_payload_json_layout() {
        let payload = DeliveredPayload {
            weight: "70.50".into(),
            impedance: "500.00".into(),
            units: "kg".into(),
            timestamp: "2024 12 15 10 30 0".into(),
        };
        assert_eq!(
            payload.to_json().unwrap(),
            r#"{"Weight":"70.50","Impedance":"500.00","Units":"kg","Timestamp":"2024 12 15 10 30 0"}"#
        );
    }

    #[test]
    fn test_unit_codes() {
        assert_eq!(Unit::Metric.code(), 0);
        assert_eq!(Unit::Imperial.code(), 1);
        assert_eq!(Unit::Catty.code(), 2);
        assert_eq!(Unit::Catty.label(), "jin");
    }
}
