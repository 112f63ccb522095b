//! Pub/Sub Transport
//!
//! The broker client is an external collaborator. Inbound messages are
//! handed over on a single-consumer channel and turned into [`Signal`]s by
//! whichever polling loop currently owns the receiver.

use crate::domain::error::PubSubError;
use crate::domain::settings::BrokerSettings;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Black-box broker operations
#[allow(async_fn_in_trait)]
pub trait PubSubClient {
    /// Open a session. Messages for every later subscription arrive on the
    /// returned channel until [`disconnect`](Self::disconnect).
    async fn connect(&mut self) -> Result<mpsc::UnboundedReceiver<InboundMessage>, PubSubError>;

    async fn subscribe(&mut self, topic: &str) -> Result<(), PubSubError>;

    async fn publish(&mut self, topic: &str, payload: &[u8], retained: bool)
        -> Result<(), PubSubError>;

    async fn disconnect(&mut self) -> Result<(), PubSubError>;
}

/// Control signals carried by inbound messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    ReconfigureRequested,
    Acknowledged,
}

/// Topic and literal payloads that carry signals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalMatcher {
    pub settings_topic: String,
    pub reconfigure_trigger: String,
    pub ack_topic: String,
    pub ack_signal: String,
}

impl SignalMatcher {
    pub fn from_settings(broker: &BrokerSettings) -> Self {
        Self {
            settings_topic: broker.settings_topic.clone(),
            reconfigure_trigger: broker.reconfigure_trigger.clone(),
            ack_topic: broker.ack_topic.clone(),
            ack_signal: broker.ack_signal.clone(),
        }
    }

    /// Exact topic and payload match; everything else is ignored
    pub fn classify(&self, message: &InboundMessage) -> Option<Signal> {
        if message.payload.is_empty() {
            return None;
        }

        if message.topic == self.settings_topic
            && message.payload == self.reconfigure_trigger.as_bytes()
        {
            Some(Signal::ReconfigureRequested)
        } else if message.topic == self.ack_topic && message.payload == self.ack_signal.as_bytes() {
            Some(Signal::Acknowledged)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(topic: &str, payload: &str) -> InboundMessage {
        InboundMessage {
            topic: topic.into(),
            payload: payload.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_classify() {
        let matcher = SignalMatcher::from_settings(&BrokerSettings::default());

        assert_eq!(
            matcher.classify(&msg("scaleSettings", "1")),
            Some(Signal::ReconfigureRequested)
        );
        assert_eq!(
            matcher.classify(&msg("scale_ack", "X")),
            Some(Signal::Acknowledged)
        );
        assert_eq!(matcher.classify(&msg("scale_ack", "1")), None);
        assert_eq!(matcher.classify(&msg("scaleSettings", "X")), None);
        assert_eq!(matcher.classify(&msg("scale_ack", "XX")), None);
        assert_eq!(matcher.classify(&msg("scale_ack", "")), None);
    }
}
