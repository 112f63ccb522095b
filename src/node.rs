//! Wake cycle
//!
//! One run of the node, from network association to either a reconfigured
//! scale or an acknowledged delivery:
//!
//! ```text
//! associate ─▶ reconfigure probe ─▶ disassociate ─▶ locate + connect scale
//!                                                        │
//!                        ┌───────────────────────────────┴──────────┐
//!                        ▼ (trigger seen)                           ▼
//!                 write unit + time                         acquisition loop
//!                        │                                          │
//!                        ▼                                          ▼
//!                   Reconfigured              associate ─▶ publish / await ack ─▶ Delivered
//! ```
//!
//! Every failure along the way is fatal for the run; [`finish`] turns the
//! result into a status pattern and requests suspension.

use crate::domain::acquisition::AcquisitionLoop;
use crate::domain::error::{ConnectionError, NodeError};
use crate::domain::models::{DeviceDateTime, Unit};
use crate::domain::settings::{DiscoveryMethod, Settings};
use crate::infrastructure::bluetooth::connection::{
    ConnectionConfig, ConnectionManager, ScaleProfile,
};
use crate::infrastructure::bluetooth::protocol::ScaleCommand;
use crate::infrastructure::bluetooth::scanner::{BleScanner, DiscoveryFilter};
use crate::infrastructure::bluetooth::transport::BleRadio;
use crate::infrastructure::messaging::delivery::{Delivered, DeliveryConfig, DeliveryProtocol};
use crate::infrastructure::messaging::reconfigure::ReconfigureProbe;
use crate::infrastructure::messaging::transport::{PubSubClient, SignalMatcher};
use crate::infrastructure::platform::{BlinkPattern, Indicator, LocalClock, NetworkLink};
use crate::infrastructure::storage::FingerprintStore;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Unit and clock written; no measurement taken
    Reconfigured,
    Delivered {
        delivered: Delivered,
        /// Impedance never stabilised
        degraded: bool,
    },
}

/// The node and its collaborators
pub struct Node<R, P, S, N, C> {
    settings: Settings,
    profile: ScaleProfile,
    pub(crate) radio: R,
    pub(crate) broker: P,
    pub(crate) store: S,
    pub(crate) network: N,
    pub(crate) clock: C,
}

impl<R, P, S, N, C> Node<R, P, S, N, C>
where
    R: BleRadio,
    P: PubSubClient,
    S: FingerprintStore,
    N: NetworkLink,
    C: LocalClock,
{
    pub fn new(
        settings: Settings,
        radio: R,
        broker: P,
        store: S,
        network: N,
        clock: C,
    ) -> anyhow::Result<Self> {
        settings.validate()?;
        let profile = ScaleProfile::from_settings(&settings.discovery)?;

        Ok(Self {
            settings,
            profile,
            radio,
            broker,
            store,
            network,
            clock,
        })
    }

    /// Run one wake cycle
    pub async fn run(&mut self) -> Result<RunOutcome, NodeError> {
        let timing = self.settings.timing.clone();
        let matcher = SignalMatcher::from_settings(&self.settings.broker);

        info!("Connecting to network");
        associate(&mut self.network, timing.network_attempt()).await?;

        let reconfigure = ReconfigureProbe::new(matcher.clone(), timing.reconfigure_poll())
            .check(&mut self.broker)
            .await?;

        if reconfigure {
            info!("Getting time for reconfiguration");
            self.clock.synchronize().await?;
            info!("Local time: {}", self.clock.now());
        }

        self.network.disassociate().await?;
        info!("Network disconnected");

        let last = if reconfigure { None } else { self.store.load()? };

        let filter = match self.settings.discovery.method {
            DiscoveryMethod::Address => {
                DiscoveryFilter::Address(self.settings.discovery.scale_address.clone())
            }
            DiscoveryMethod::Service => DiscoveryFilter::Service(self.profile.history.service),
        };
        let mut scale = ConnectionManager::new(
            &mut self.radio,
            BleScanner::new(filter, timing.scan_window()),
            ConnectionConfig {
                required: self.profile.required(reconfigure),
                poll_delay: timing.poll_delay(),
                disconnect_timeout: timing.scan_window(),
            },
        );
        scale.open().await?;

        if reconfigure {
            let written =
                configure_scale(&mut scale, &self.profile, self.settings.scale_unit, self.clock.now())
                    .await;
            scale.disconnect().await?;
            written?;
            info!("Reconfig done");
            return Ok(RunOutcome::Reconfigured);
        }

        let acquired = AcquisitionLoop::new(self.settings.acquisition_attempts, timing.retry_delay())
            .run(&mut scale, last.as_ref())
            .await;
        if let Err(e) = scale.disconnect().await {
            warn!("Scale disconnect failed: {}", e);
        }
        let reading = acquired?;
        info!(
            "Reading (weight stable): {:?}",
            reading.measurement.to_payload()
        );

        info!("Connecting to network and broker");
        associate(&mut self.network, timing.network_attempt()).await?;
        let mut inbound = self.broker.connect().await?;

        let delivery = DeliveryProtocol::new(
            DeliveryConfig {
                data_topic: self.settings.broker.data_topic.clone(),
                window: timing.ack_window(),
                resend_interval: timing.resend_interval(),
            },
            matcher,
        )
        .deliver(&mut self.broker, &mut inbound, &reading, &mut self.store)
        .await;

        if let Err(e) = self.broker.disconnect().await {
            warn!("Broker disconnect failed: {}", e);
        }
        if let Err(e) = self.network.disassociate().await {
            warn!("Network disconnect failed: {}", e);
        }

        let delivered = delivery?;
        info!("Transfer successful after {} publishes", delivered.publishes);

        Ok(RunOutcome::Delivered {
            delivered,
            degraded: reading.degraded,
        })
    }
}

/// Associate within `bound`; stands in for the hardware watchdog
async fn associate<N: NetworkLink>(network: &mut N, bound: Duration) -> Result<(), NodeError> {
    match tokio::time::timeout(bound, network.associate()).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(NodeError::NetworkTimeout(bound)),
    }
}

/// Write the configured unit, then the current local time
async fn configure_scale<R: BleRadio>(
    scale: &mut ConnectionManager<R>,
    profile: &ScaleProfile,
    unit: Unit,
    now: DeviceDateTime,
) -> Result<(), ConnectionError> {
    info!("Configuring scale");
    scale
        .send_command(&profile.scale_configuration, ScaleCommand::SetUnit(unit))
        .await?;
    scale
        .send_command(&profile.current_time, ScaleCommand::SetTime(now))
        .await
}

/// Signal the outcome and suspend
pub async fn finish<I: Indicator>(result: &Result<RunOutcome, NodeError>, indicator: &mut I) {
    match result {
        Ok(outcome) => {
            info!("Run finished: {:?}", outcome);
            indicator.blink(BlinkPattern::SUCCESS).await;
        }
        Err(e) => {
            error!("{}, ending program", e);
            indicator.blink(BlinkPattern::FAILURE).await;
        }
    }
    indicator.suspend();
}
