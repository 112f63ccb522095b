//! Radio Transport
//!
//! The short-range radio stack is an external collaborator. This trait is
//! the surface the scanner and connection code drive; a board support crate
//! or a host BLE library implements it.

use crate::domain::error::RadioError;
use tokio::sync::mpsc;

/// A GATT characteristic addressed by its service and characteristic UUIDs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicRef {
    pub name: &'static str,
    pub service: u128,
    pub characteristic: u128,
}

/// One observed advertisement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Advertisement {
    /// Lowercase `aa:bb:cc:dd:ee:ff`
    pub address: String,
    pub local_name: Option<String>,
    pub rssi: Option<i16>,
    pub service_uuids: Vec<u128>,
    /// Service-data entries in the order the stack exposes them
    pub service_data: Vec<Vec<u8>>,
}

impl Advertisement {
    pub fn advertises(&self, service: u128) -> bool {
        self.service_uuids.contains(&service)
    }

    /// The most recent service-data entry
    pub fn latest_service_data(&self) -> Option<&[u8]> {
        self.service_data.last().map(Vec::as_slice)
    }
}

/// Black-box radio operations
#[allow(async_fn_in_trait)]
pub trait BleRadio {
    /// Start an active scan. Advertisements arrive on the returned channel
    /// until [`stop_scan`](Self::stop_scan); a closed channel means the stack
    /// ended the scan on its own.
    async fn start_scan(&mut self) -> Result<mpsc::UnboundedReceiver<Advertisement>, RadioError>;

    async fn stop_scan(&mut self) -> Result<(), RadioError>;

    /// Open a client session to the advertiser at `address`.
    async fn connect(&mut self, address: &str) -> Result<(), RadioError>;

    /// Whether the open session exposes `target`.
    async fn has_characteristic(&mut self, target: &CharacteristicRef) -> Result<bool, RadioError>;

    async fn write_characteristic(
        &mut self,
        target: &CharacteristicRef,
        value: &[u8],
        with_response: bool,
    ) -> Result<(), RadioError>;

    /// Request a disconnect. Completion is observed through
    /// [`is_connected`](Self::is_connected).
    async fn disconnect(&mut self) -> Result<(), RadioError>;

    fn is_connected(&self) -> bool;
}

impl<T: BleRadio> BleRadio for &mut T {
    async fn start_scan(&mut self) -> Result<mpsc::UnboundedReceiver<Advertisement>, RadioError> {
        (**self).start_scan().await
    }

    async fn stop_scan(&mut self) -> Result<(), RadioError> {
        (**self).stop_scan().await
    }

    async fn connect(&mut self, address: &str) -> Result<(), RadioError> {
        (**self).connect(address).await
    }

    async fn has_characteristic(&mut self, target: &CharacteristicRef) -> Result<bool, RadioError> {
        (**self).has_characteristic(target).await
    }

    async fn write_characteristic(
        &mut self,
        target: &CharacteristicRef,
        value: &[u8],
        with_response: bool,
    ) -> Result<(), RadioError> {
        (**self)
            .write_characteristic(target, value, with_response)
            .await
    }

    async fn disconnect(&mut self) -> Result<(), RadioError> {
        (**self).disconnect().await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}
