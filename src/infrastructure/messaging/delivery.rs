//! Delivery protocol
//!
//! Publishes an accepted reading as a retained message and waits for the
//! consumer's acknowledgment, republishing every `resend_interval` until the
//! ack arrives or `window` runs out. The fingerprint is recorded only after
//! the ack; a timed-out delivery leaves the store untouched so the reading
//! is seen again (as a duplicate) on the next run.

use crate::domain::acquisition::AcceptedReading;
use crate::domain::error::DeliveryError;
use crate::infrastructure::messaging::transport::{
    InboundMessage, PubSubClient, Signal, SignalMatcher,
};
use crate::infrastructure::storage::FingerprintStore;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub data_topic: String,
    /// Total time allowed for an acknowledgment
    pub window: Duration,
    /// Republish after this long without an acknowledgment
    pub resend_interval: Duration,
}

/// Successful handshake summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivered {
    /// Initial publish plus resends
    pub publishes: u32,
    pub elapsed: Duration,
}

/// State of one publish/acknowledge exchange
struct DeliverySession {
    body: Vec<u8>,
    started: Instant,
    last_publish: Instant,
    publishes: u32,
    acknowledged: bool,
}

impl DeliverySession {
    fn new(body: Vec<u8>) -> Self {
        let now = Instant::now();
        Self {
            body,
            started: now,
            last_publish: now,
            publishes: 0,
            acknowledged: false,
        }
    }

    async fn publish<P: PubSubClient>(
        &mut self,
        client: &mut P,
        topic: &str,
    ) -> Result<(), DeliveryError> {
        client.publish(topic, &self.body, true).await?;
        self.last_publish = Instant::now();
        self.publishes += 1;
        Ok(())
    }
}

pub struct DeliveryProtocol {
    config: DeliveryConfig,
    matcher: SignalMatcher,
}

impl DeliveryProtocol {
    pub fn new(config: DeliveryConfig, matcher: SignalMatcher) -> Self {
        Self { config, matcher }
    }

    /// Publish `reading` and wait for its acknowledgment
    ///
    /// `inbound` is the receiver returned by the client's `connect`.
    pub async fn deliver<P, S>(
        &self,
        client: &mut P,
        inbound: &mut mpsc::UnboundedReceiver<InboundMessage>,
        reading: &AcceptedReading,
        store: &mut S,
    ) -> Result<Delivered, DeliveryError>
    where
        P: PubSubClient,
        S: FingerprintStore,
    {
        let body = reading.measurement.to_payload().to_json()?;

        let ack_topic = &self.matcher.ack_topic;
        client.subscribe(ack_topic).await?;
        info!("Subscribed to ack topic {}", ack_topic);

        let mut session = DeliverySession::new(body.into_bytes());
        let deadline = session.started + self.config.window;

        info!("Publishing to {}", self.config.data_topic);
        session.publish(client, &self.config.data_topic).await?;

        while !session.acknowledged {
            let resend_at = session.last_publish + self.config.resend_interval;
            let wake = resend_at.min(deadline);

            match timeout_at(wake, inbound.recv()).await {
                Ok(Some(message)) => match self.matcher.classify(&message) {
                    Some(Signal::Acknowledged) => {
                        info!("Ack received");
                        session.acknowledged = true;
                    }
                    _ => debug!("Ignoring message on {}", message.topic),
                },
                Ok(None) => return Err(DeliveryError::SessionClosed),
                Err(_) if Instant::now() >= deadline => {
                    warn!(
                        "No ack within {:?} after {} publishes",
                        self.config.window, session.publishes
                    );
                    return Err(DeliveryError::AckTimeout {
                        window: self.config.window,
                        publishes: session.publishes,
                    });
                }
                Err(_) => {
                    info!("No ack received, publishing again");
                    session.publish(client, &self.config.data_topic).await?;
                }
            }
        }

        store.store(&reading.fingerprint())?;

        Ok(Delivered {
            publishes: session.publishes,
            elapsed: session.started.elapsed(),
        })
    }
}
