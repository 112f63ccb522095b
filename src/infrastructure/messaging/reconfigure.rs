//! Reconfiguration request probe
//!
//! Before touching the scale, the node listens briefly on the settings
//! topic. A retained trigger there switches the run to writing unit and
//! clock settings instead of taking a measurement.

use crate::domain::error::PubSubError;
use crate::infrastructure::messaging::transport::{PubSubClient, Signal, SignalMatcher};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

pub struct ReconfigureProbe {
    matcher: SignalMatcher,
    poll_window: Duration,
}

impl ReconfigureProbe {
    pub fn new(matcher: SignalMatcher, poll_window: Duration) -> Self {
        Self {
            matcher,
            poll_window,
        }
    }

    /// Connect, listen for the trigger, and disconnect
    ///
    /// A seen trigger is cleared by publishing an empty retained message so
    /// the next wake does not reconfigure again.
    pub async fn check<P: PubSubClient>(&self, client: &mut P) -> Result<bool, PubSubError> {
        let mut inbound = client.connect().await?;
        info!("Broker connected");

        client.subscribe(&self.matcher.settings_topic).await?;
        info!("Settings topic {} subscribed", self.matcher.settings_topic);

        let deadline = Instant::now() + self.poll_window;
        let mut requested = false;

        while let Ok(Some(message)) = timeout_at(deadline, inbound.recv()).await {
            if self.matcher.classify(&message) == Some(Signal::ReconfigureRequested) {
                requested = true;
                client
                    .publish(&self.matcher.settings_topic, &[], true)
                    .await?;
                break;
            }
            debug!("Ignoring message on {}", message.topic);
        }

        if requested {
            info!("Reconfig requested");
        } else {
            info!("Reconfig not requested");
        }

        client.disconnect().await?;
        info!("Broker disconnected");
        Ok(requested)
    }
}
