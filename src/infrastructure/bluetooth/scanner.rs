//! BLE Scanner Module
//!
//! Finds the scale among nearby advertisers within a bounded scan window.

use crate::domain::error::RadioError;
use crate::infrastructure::bluetooth::transport::{Advertisement, BleRadio};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// How the scale is recognised among advertisers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryFilter {
    /// Exact hardware address, compared case-insensitively
    Address(String),
    /// First peer advertising this service
    Service(u128),
}

impl DiscoveryFilter {
    pub fn matches(&self, adv: &Advertisement) -> bool {
        match self {
            Self::Address(address) => adv.address.eq_ignore_ascii_case(address),
            Self::Service(uuid) => adv.advertises(*uuid),
        }
    }
}

/// BLE Scanner for locating the paired scale
pub struct BleScanner {
    filter: DiscoveryFilter,
    window: Duration,
}

impl BleScanner {
    /// Create a new scanner
    pub fn new(filter: DiscoveryFilter, window: Duration) -> Self {
        Self { filter, window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Scan until the filter matches or the window elapses
    ///
    /// The scan is stopped as soon as a match is seen. Returns `None` when
    /// the window closes, or the stack ends the scan, without a match.
    pub async fn locate<R: BleRadio>(
        &self,
        radio: &mut R,
    ) -> Result<Option<Advertisement>, RadioError> {
        info!(
            "Starting BLE scan ({:?}, window {:?})",
            self.filter, self.window
        );

        let deadline = Instant::now() + self.window;
        let mut adverts = radio.start_scan().await?;
        let mut seen = 0u32;

        let found = loop {
            match timeout_at(deadline, adverts.recv()).await {
                Ok(Some(adv)) => {
                    seen += 1;
                    if self.filter.matches(&adv) {
                        break Some(adv);
                    }
                    debug!("Ignoring advertiser {}", adv.address);
                }
                Ok(None) => {
                    warn!("Scan ended by the radio stack");
                    break None;
                }
                Err(_) => break None,
            }
        };

        info!("Stopping BLE scan after {} advertisements", seen);
        radio.stop_scan().await?;

        match &found {
            Some(adv) => info!(
                "Scale found at {} (rssi {:?})",
                adv.address, adv.rssi
            ),
            None => warn!("No matching scale within {:?}", self.window),
        }

        Ok(found)
    }
}
