//! Bluetooth Module
//!
//! Locates the scale by its advertisements, holds the GATT session, and
//! decodes the body-composition broadcast.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   ConnectionManager                      │
//! │  (locate, connect, reconnect, disconnect, write)         │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌───────────┐
//! │  Scanner  │  │ Transport  │  │ Protocol  │
//! │           │  │            │  │           │
//! │ - Filter  │  │ - BleRadio │  │ - UUIDs   │
//! │ - Window  │  │   trait    │  │ - Commands│
//! │           │  │            │  │ - Decode  │
//! └───────────┘  └────────────┘  └───────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Scale UUIDs, configuration commands, and payload decoding
//! - [`scanner`] - Advertisement filtering within a bounded scan window
//! - [`connection`] - Session handling and characteristic checks
//! - [`transport`] - The radio operations the rest of the module drives

pub mod connection;
pub mod protocol;
pub mod scanner;
pub mod transport;
