//! BLE Connection Module
//!
//! Opens a session to the located scale, checks the characteristics the run
//! needs, and performs full disconnect-and-rediscover cycles. A bare link
//! re-establishment never yields a fresh advertisement, so every reconnect
//! goes back through the scanner.

use crate::domain::error::{ConnectionError, RadioError};
use crate::domain::models::RawPayload;
use crate::domain::settings::DiscoverySettings;
use crate::infrastructure::bluetooth::protocol::{self, ScaleCommand};
use crate::infrastructure::bluetooth::scanner::BleScanner;
use crate::infrastructure::bluetooth::transport::{Advertisement, BleRadio, CharacteristicRef};
use anyhow::Result;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// GATT characteristics the scale exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleProfile {
    pub history: CharacteristicRef,
    pub current_time: CharacteristicRef,
    pub scale_configuration: CharacteristicRef,
}

impl ScaleProfile {
    pub fn from_settings(settings: &DiscoverySettings) -> Result<Self> {
        let body_service = protocol::parse_uuid(&settings.body_composition_service_uuid)?;
        let config_service = protocol::parse_uuid(&settings.configuration_service_uuid)?;

        Ok(Self {
            history: CharacteristicRef {
                name: "body composition history",
                service: body_service,
                characteristic: protocol::parse_uuid(&settings.history_char_uuid)?,
            },
            current_time: CharacteristicRef {
                name: "current time",
                service: body_service,
                characteristic: protocol::parse_uuid(&settings.current_time_char_uuid)?,
            },
            scale_configuration: CharacteristicRef {
                name: "scale configuration",
                service: config_service,
                characteristic: protocol::parse_uuid(&settings.scale_configuration_char_uuid)?,
            },
        })
    }

    /// Characteristics that must be present for a run
    pub fn required(&self, reconfigure: bool) -> Vec<CharacteristicRef> {
        if reconfigure {
            vec![self.history, self.current_time, self.scale_configuration]
        } else {
            vec![self.history]
        }
    }
}

/// Configuration for connection behavior
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Characteristics checked on every connect
    pub required: Vec<CharacteristicRef>,
    /// Delay between disconnect-state polls
    pub poll_delay: Duration,
    /// Upper bound on waiting for a disconnect to be confirmed
    pub disconnect_timeout: Duration,
}

/// Owns the radio session to the scale
pub struct ConnectionManager<R: BleRadio> {
    radio: R,
    scanner: BleScanner,
    config: ConnectionConfig,
    peer: Option<Advertisement>,
}

impl<R: BleRadio> ConnectionManager<R> {
    /// Create a new connection manager
    pub fn new(radio: R, scanner: BleScanner, config: ConnectionConfig) -> Self {
        Self {
            radio,
            scanner,
            config,
            peer: None,
        }
    }

    /// Locate the scale and connect to it
    pub async fn open(&mut self) -> Result<(), ConnectionError> {
        let peer = self.locate().await?;
        self.connect(peer).await
    }

    /// Scan for the scale; absence within the window is fatal
    pub async fn locate(&mut self) -> Result<Advertisement, ConnectionError> {
        self.scanner
            .locate(&mut self.radio)
            .await?
            .ok_or(ConnectionError::ScaleNotFound {
                window: self.scanner.window(),
            })
    }

    /// Connect to `peer` and check the required characteristics
    pub async fn connect(&mut self, peer: Advertisement) -> Result<(), ConnectionError> {
        info!("Connecting to scale {}", peer.address);
        self.radio.connect(&peer.address).await?;

        let required = self.config.required.clone();
        for target in &required {
            if !self.radio.has_characteristic(target).await? {
                error!("Characteristic '{}' not found, ending run", target.name);
                if let Err(e) = self.disconnect().await {
                    warn!("Disconnect after failed connect also failed: {}", e);
                }
                return Err(ConnectionError::MissingCharacteristic { name: target.name });
            }
            info!("Found {} characteristic", target.name);
        }

        self.peer = Some(peer);
        Ok(())
    }

    /// Disconnect, forget the peer, and locate + connect from scratch
    pub async fn reconnect(&mut self) -> Result<(), ConnectionError> {
        info!("Reconnecting to scale for a fresh advertisement");
        self.disconnect().await?;
        self.peer = None;
        self.open().await
    }

    /// Disconnect and wait until the radio confirms it
    pub async fn disconnect(&mut self) -> Result<(), RadioError> {
        if !self.radio.is_connected() {
            return Ok(());
        }

        self.radio.disconnect().await?;

        let deadline = Instant::now() + self.config.disconnect_timeout;
        while self.radio.is_connected() {
            if Instant::now() >= deadline {
                warn!(
                    "Disconnect not confirmed within {:?}, continuing",
                    self.config.disconnect_timeout
                );
                break;
            }
            tokio::time::sleep(self.config.poll_delay).await;
        }

        info!("Disconnected from scale");
        Ok(())
    }

    /// The latest broadcast payload of the connected peer
    ///
    /// An advertisement without service data yields an empty payload, which
    /// the decoder rejects as malformed.
    pub fn latest_payload(&self) -> Result<RawPayload, ConnectionError> {
        let peer = self.peer.as_ref().ok_or(ConnectionError::NotConnected)?;
        Ok(RawPayload::new(
            peer.latest_service_data().unwrap_or_default().to_vec(),
        ))
    }

    /// Write a configuration command, waiting for the write response
    pub async fn send_command(
        &mut self,
        target: &CharacteristicRef,
        command: ScaleCommand,
    ) -> Result<(), ConnectionError> {
        if self.peer.is_none() {
            return Err(ConnectionError::NotConnected);
        }
        info!("Writing {:?} to {}", command, target.name);
        self.radio
            .write_characteristic(target, &command.to_bytes(), true)
            .await?;
        Ok(())
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }
}
