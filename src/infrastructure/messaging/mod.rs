//! Broker messaging: the reconfiguration probe and the
//! publish/acknowledge handshake.

pub mod delivery;
pub mod reconfigure;
pub mod transport;
