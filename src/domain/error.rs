//! Error types shared across the bridge.
//!
//! Collaborator failures (radio, pub/sub, storage, network) are opaque
//! strings: the transports behind them are external and only their message
//! is useful in a log line. Run-level outcomes are typed so callers can tell
//! a misconfiguration from a scale that simply had nothing new to report.

use std::time::Duration;
use thiserror::Error;

/// Failure to turn a broadcast payload into a [`Measurement`](super::models::Measurement).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed payload: {len} bytes, expected at least 13")]
    MalformedPayload { len: usize },
    #[error("ambiguous unit: both catty and imperial bits set in flags {flags:#06X}")]
    AmbiguousUnit { flags: u16 },
    #[error("invalid hex payload: {0}")]
    InvalidHex(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("radio: {0}")]
pub struct RadioError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("pub/sub: {0}")]
pub struct PubSubError(pub String);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage format: {0}")]
    Format(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("network: {0}")]
pub struct NetworkError(pub String);

/// Errors raised while locating or connecting to the scale.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("no scale advertisement matched within {window:?}")]
    ScaleNotFound { window: Duration },
    /// Misconfiguration, never retried.
    #[error("required characteristic not found: {name}")]
    MissingCharacteristic { name: &'static str },
    #[error("no scale session is open")]
    NotConnected,
    #[error(transparent)]
    Radio(#[from] RadioError),
}

/// Fatal outcomes of the acquisition loop.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("no stabilised weight after {attempts} attempts")]
    NoStableWeight { attempts: u32 },
    #[error("no fresh measurement after {attempts} attempts")]
    NoFreshMeasurement { attempts: u32 },
    #[error("unusable payload after {attempts} attempts: {source}")]
    UnusablePayload {
        attempts: u32,
        #[source]
        source: DecodeError,
    },
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Fatal outcomes of the publish/acknowledge handshake.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("no acknowledgment within {window:?} ({publishes} publishes)")]
    AckTimeout { window: Duration, publishes: u32 },
    #[error("pub/sub session closed before acknowledgment")]
    SessionClosed,
    #[error("cannot encode measurement: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    PubSub(#[from] PubSubError),
    /// Acknowledged, but the fingerprint could not be recorded.
    #[error("acknowledged but not recorded: {0}")]
    Storage(#[from] StorageError),
}

/// Everything that ends a wake cycle without success.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("network association exceeded {0:?}")]
    NetworkTimeout(Duration),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    PubSub(#[from] PubSubError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Radio(#[from] RadioError),
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
