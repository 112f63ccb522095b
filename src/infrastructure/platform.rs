//! Platform collaborators
//!
//! Network association, wall-clock time, status signalling and low-power
//! suspension are provided by the board. Only the clock has a host adapter.

use crate::domain::error::NetworkError;
use crate::domain::models::DeviceDateTime;
use chrono::{Datelike, Local, Timelike};
use std::time::Duration;
use tracing::debug;

/// Network association (the pub/sub client rides on top of it)
#[allow(async_fn_in_trait)]
pub trait NetworkLink {
    async fn associate(&mut self) -> Result<(), NetworkError>;

    async fn disassociate(&mut self) -> Result<(), NetworkError>;
}

/// Local wall-clock time, as written to the scale
#[allow(async_fn_in_trait)]
pub trait LocalClock {
    /// Wait for time synchronisation. Only needed before reconfiguring.
    async fn synchronize(&mut self) -> Result<(), NetworkError>;

    fn now(&self) -> DeviceDateTime;
}

/// Blink timing for the end-of-run indication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkPattern {
    pub total: Duration,
    pub on: Duration,
    pub off: Duration,
}

impl BlinkPattern {
    pub const SUCCESS: Self = Self {
        total: Duration::from_millis(8000),
        on: Duration::from_millis(900),
        off: Duration::from_millis(100),
    };

    pub const FAILURE: Self = Self {
        total: Duration::from_millis(8000),
        on: Duration::from_millis(100),
        off: Duration::from_millis(100),
    };
}

/// Status light and power control
#[allow(async_fn_in_trait)]
pub trait Indicator {
    async fn blink(&mut self, pattern: BlinkPattern);

    /// Enter low-power suspension. On hardware this does not return.
    fn suspend(&mut self);
}

/// Clock backed by the host's local time zone
///
/// The host keeps its own time in sync, so `synchronize` only reports the
/// time the scale would be given.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl LocalClock for SystemClock {
    async fn synchronize(&mut self) -> Result<(), NetworkError> {
        debug!("Using host time {}", self.now());
        Ok(())
    }

    fn now(&self) -> DeviceDateTime {
        let now = Local::now();
        DeviceDateTime {
            year: u16::try_from(now.year()).unwrap_or(0),
            month: now.month() as u8,
            day: now.day() as u8,
            hour: now.hour() as u8,
            minute: now.minute() as u8,
            second: now.second() as u8,
        }
    }
}
