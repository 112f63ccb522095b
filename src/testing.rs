//! Scripted collaborators for unit tests.

use crate::domain::error::{NetworkError, PubSubError, RadioError, StorageError};
use crate::domain::models::{DeviceDateTime, Fingerprint};
use crate::infrastructure::bluetooth::transport::{Advertisement, BleRadio, CharacteristicRef};
use crate::infrastructure::messaging::transport::{InboundMessage, PubSubClient};
use crate::infrastructure::platform::{BlinkPattern, Indicator, LocalClock, NetworkLink};
use crate::infrastructure::storage::FingerprintStore;
use std::cell::Cell;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

pub fn advert(address: &str, services: &[u128], data: &[&[u8]]) -> Advertisement {
    Advertisement {
        address: address.to_string(),
        local_name: Some("MIBCS".to_string()),
        rssi: Some(-60),
        service_uuids: services.to_vec(),
        service_data: data.iter().map(|d| d.to_vec()).collect(),
    }
}

/// Radio replaying one scripted advertisement batch per scan.
/// The last batch repeats for every further scan.
#[derive(Default)]
pub struct FakeRadio {
    scans: VecDeque<Vec<Advertisement>>,
    open_scans: Vec<mpsc::UnboundedSender<Advertisement>>,
    /// Leave scan channels open so the scanner runs into its window
    pub keep_scans_open: bool,
    pub scans_started: u32,
    pub scans_stopped: u32,
    pub connected: bool,
    pub connects: Vec<String>,
    /// Names of characteristics the peer lacks
    pub missing: Vec<&'static str>,
    pub writes: Vec<(&'static str, Vec<u8>)>,
    pub disconnects: u32,
    /// `is_connected` polls that still report connected after a disconnect
    pub disconnect_lag: u32,
    lag_remaining: Cell<u32>,
}

impl FakeRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_scan(&mut self, adverts: Vec<Advertisement>) {
        self.scans.push_back(adverts);
    }
}

impl BleRadio for FakeRadio {
    async fn start_scan(&mut self) -> Result<mpsc::UnboundedReceiver<Advertisement>, RadioError> {
        self.scans_started += 1;
        let batch = if self.scans.len() > 1 {
            self.scans.pop_front().unwrap_or_default()
        } else {
            self.scans.front().cloned().unwrap_or_default()
        };

        let (tx, rx) = mpsc::unbounded_channel();
        for adv in batch {
            let _ = tx.send(adv);
        }
        if self.keep_scans_open {
            self.open_scans.push(tx);
        }
        Ok(rx)
    }

    async fn stop_scan(&mut self) -> Result<(), RadioError> {
        self.scans_stopped += 1;
        self.open_scans.clear();
        Ok(())
    }

    async fn connect(&mut self, address: &str) -> Result<(), RadioError> {
        self.connects.push(address.to_string());
        self.connected = true;
        Ok(())
    }

    async fn has_characteristic(&mut self, target: &CharacteristicRef) -> Result<bool, RadioError> {
        Ok(!self.missing.contains(&target.name))
    }

    async fn write_characteristic(
        &mut self,
        target: &CharacteristicRef,
        value: &[u8],
        _with_response: bool,
    ) -> Result<(), RadioError> {
        self.writes.push((target.name, value.to_vec()));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), RadioError> {
        self.disconnects += 1;
        self.connected = false;
        self.lag_remaining.set(self.disconnect_lag);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        if self.connected {
            return true;
        }
        let lag = self.lag_remaining.get();
        if lag > 0 {
            self.lag_remaining.set(lag - 1);
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRecord {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retained: bool,
    /// Time since the broker was created
    pub offset: Duration,
}

/// Broker recording publishes, replaying retained messages on subscribe,
/// and optionally acknowledging the n-th publish.
pub struct FakeBroker {
    created: Instant,
    sender: Option<mpsc::UnboundedSender<InboundMessage>>,
    pub retained: Vec<(String, Vec<u8>)>,
    pub subscriptions: Vec<String>,
    pub published: Vec<PublishRecord>,
    pub connects: u32,
    pub disconnects: u32,
    /// Topic the acknowledgment is sent on
    pub ack_topic: String,
    /// Send `X` on `ack_topic` after this many publishes
    pub ack_on_publish: Option<usize>,
    /// Send an unrelated message after this many publishes
    pub noise_on_publish: Option<usize>,
}

impl FakeBroker {
    pub fn new() -> Self {
        Self {
            created: Instant::now(),
            sender: None,
            retained: Vec::new(),
            subscriptions: Vec::new(),
            published: Vec::new(),
            connects: 0,
            disconnects: 0,
            ack_topic: "scale_ack".to_string(),
            ack_on_publish: None,
            noise_on_publish: None,
        }
    }

    /// Open a session without going through the async trait
    pub fn connect_now(&mut self) -> mpsc::UnboundedReceiver<InboundMessage> {
        self.connects += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.sender = Some(tx);
        rx
    }

    pub fn close_inbound(&mut self) {
        self.sender = None;
    }

    fn inject(&self, topic: &str, payload: &[u8]) {
        if let Some(tx) = &self.sender {
            let _ = tx.send(InboundMessage {
                topic: topic.to_string(),
                payload: payload.to_vec(),
            });
        }
    }

    pub fn data_publishes(&self, topic: &str) -> usize {
        self.published.iter().filter(|p| p.topic == topic).count()
    }
}

impl PubSubClient for FakeBroker {
    async fn connect(&mut self) -> Result<mpsc::UnboundedReceiver<InboundMessage>, PubSubError> {
        Ok(self.connect_now())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), PubSubError> {
        self.subscriptions.push(topic.to_string());
        for (retained_topic, payload) in &self.retained {
            if retained_topic == topic {
                self.inject(retained_topic, payload);
            }
        }
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retained: bool,
    ) -> Result<(), PubSubError> {
        self.published.push(PublishRecord {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            retained,
            offset: self.created.elapsed(),
        });

        let count = self.published.len();
        if self.noise_on_publish == Some(count) {
            self.inject("scaleSettings", b"1");
            self.inject("scale_ack", b"nope");
        }
        if self.ack_on_publish == Some(count) {
            self.inject(&self.ack_topic, b"X");
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), PubSubError> {
        self.disconnects += 1;
        self.sender = None;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    pub value: Option<Fingerprint>,
    pub writes: u32,
    /// Fail every load as a corrupt state file would
    pub fail_load: bool,
}

impl FingerprintStore for MemoryStore {
    fn load(&self) -> Result<Option<Fingerprint>, StorageError> {
        if self.fail_load {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "corrupt",
            )));
        }
        Ok(self.value.clone())
    }

    fn store(&mut self, fingerprint: &Fingerprint) -> Result<(), StorageError> {
        self.value = Some(fingerprint.clone());
        self.writes += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeNetwork {
    /// Never complete association
    pub hang: bool,
    pub associations: u32,
    pub disassociations: u32,
}

impl NetworkLink for FakeNetwork {
    async fn associate(&mut self) -> Result<(), NetworkError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.associations += 1;
        Ok(())
    }

    async fn disassociate(&mut self) -> Result<(), NetworkError> {
        self.disassociations += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FixedClock {
    pub time: DeviceDateTime,
    pub synchronized: bool,
}

impl LocalClock for FixedClock {
    async fn synchronize(&mut self) -> Result<(), NetworkError> {
        self.synchronized = true;
        Ok(())
    }

    fn now(&self) -> DeviceDateTime {
        self.time
    }
}

#[derive(Debug, Default)]
pub struct RecordingIndicator {
    pub patterns: Vec<BlinkPattern>,
    pub suspended: bool,
}

impl Indicator for RecordingIndicator {
    async fn blink(&mut self, pattern: BlinkPattern) {
        self.patterns.push(pattern);
    }

    fn suspend(&mut self) {
        self.suspended = true;
    }
}
