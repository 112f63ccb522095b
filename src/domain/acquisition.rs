//! Acquisition loop
//!
//! Reads the scale's broadcast payload up to `max_attempts` times, retrying
//! through a full reconnect until a reading is usable. Each attempt ends in
//! a [`Verdict`] computed by the pure [`evaluate`] function, so every branch
//! of the policy can be checked without a radio.

use crate::domain::error::{AcquisitionError, ConnectionError, DecodeError};
use crate::domain::models::{Fingerprint, Measurement, RawPayload};
use crate::domain::stability;
use crate::infrastructure::bluetooth::connection::ConnectionManager;
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::transport::BleRadio;
use std::time::Duration;
use tracing::{info, warn};

/// Where payloads come from between reconnects
#[allow(async_fn_in_trait)]
pub trait PayloadSource {
    fn latest_payload(&self) -> Result<RawPayload, ConnectionError>;

    /// Drop the session and observe a fresh advertisement.
    async fn reconnect(&mut self) -> Result<(), ConnectionError>;
}

impl<R: BleRadio> PayloadSource for ConnectionManager<R> {
    fn latest_payload(&self) -> Result<RawPayload, ConnectionError> {
        ConnectionManager::latest_payload(self)
    }

    async fn reconnect(&mut self) -> Result<(), ConnectionError> {
        ConnectionManager::reconnect(self).await
    }
}

/// Why an attempt did not produce an accepted reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    UnstableWeight,
    Duplicate,
    UnstableImpedance,
    Undecodable(DecodeError),
}

/// Terminal failure reached on the last attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exhaustion {
    NoStableWeight,
    NoFreshMeasurement,
    Unusable(DecodeError),
}

/// Outcome of evaluating one reading
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// `degraded` marks an impedance that never stabilised.
    Accepted {
        measurement: Measurement,
        degraded: bool,
    },
    Retrying(Rejection),
    Exhausted(Exhaustion),
}

/// A reading cleared for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedReading {
    pub payload: RawPayload,
    pub measurement: Measurement,
    /// Impedance is not trustworthy
    pub degraded: bool,
    /// Zero-based attempt that produced it
    pub attempt: u32,
}

impl AcceptedReading {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.payload)
    }
}

/// Classify one payload
///
/// `last_attempt` turns retryable rejections into their final form: fatal
/// for weight, duplicate and undecodable readings, a degraded accept for
/// impedance.
pub fn evaluate(payload: &RawPayload, last: Option<&Fingerprint>, last_attempt: bool) -> Verdict {
    let settle = |rejection, exhaustion| {
        if last_attempt {
            Verdict::Exhausted(exhaustion)
        } else {
            Verdict::Retrying(rejection)
        }
    };

    let undecodable =
        |e: DecodeError| settle(Rejection::Undecodable(e.clone()), Exhaustion::Unusable(e));

    let flags = match protocol::read_flags(payload) {
        Ok(flags) => flags,
        Err(e) => return undecodable(e),
    };

    if !stability::is_weight_stable(flags) {
        return settle(Rejection::UnstableWeight, Exhaustion::NoStableWeight);
    }

    if stability::is_duplicate(payload, last) {
        return settle(Rejection::Duplicate, Exhaustion::NoFreshMeasurement);
    }

    let measurement = match protocol::decode(payload) {
        Ok(measurement) => measurement,
        Err(e) => return undecodable(e),
    };

    if !stability::is_impedance_stable(measurement.flags, measurement.impedance) {
        return if last_attempt {
            Verdict::Accepted {
                measurement,
                degraded: true,
            }
        } else {
            Verdict::Retrying(Rejection::UnstableImpedance)
        };
    }

    Verdict::Accepted {
        measurement,
        degraded: false,
    }
}

/// Bounded read/evaluate/reconnect loop
pub struct AcquisitionLoop {
    max_attempts: u32,
    retry_delay: Duration,
}

impl AcquisitionLoop {
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    /// Run until a reading is accepted or attempts run out
    ///
    /// `source` must already hold a connected peer.
    pub async fn run<S: PayloadSource>(
        &self,
        source: &mut S,
        last: Option<&Fingerprint>,
    ) -> Result<AcceptedReading, AcquisitionError> {
        for attempt in 0..self.max_attempts {
            let payload = source.latest_payload()?;
            let last_attempt = attempt + 1 == self.max_attempts;

            match evaluate(&payload, last, last_attempt) {
                Verdict::Accepted {
                    measurement,
                    degraded,
                } => {
                    if degraded {
                        warn!(
                            "Got a stable weight but no stable impedance, proceeding with impedance marked unreliable"
                        );
                    }
                    info!(
                        "Accepted reading on attempt {}/{}: {:?}",
                        attempt + 1,
                        self.max_attempts,
                        measurement
                    );
                    return Ok(AcceptedReading {
                        payload,
                        measurement,
                        degraded,
                        attempt,
                    });
                }
                Verdict::Retrying(reason) => {
                    info!(
                        "Attempt {}/{} rejected ({:?}), reconnecting in {:?}",
                        attempt + 1,
                        self.max_attempts,
                        reason,
                        self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    source.reconnect().await?;
                }
                Verdict::Exhausted(exhaustion) => {
                    warn!("Attempts exhausted: {:?}", exhaustion);
                    let attempts = self.max_attempts;
                    return Err(match exhaustion {
                        Exhaustion::NoStableWeight => AcquisitionError::NoStableWeight { attempts },
                        Exhaustion::NoFreshMeasurement => {
                            AcquisitionError::NoFreshMeasurement { attempts }
                        }
                        Exhaustion::Unusable(source) => {
                            AcquisitionError::UnusablePayload { attempts, source }
                        }
                    });
                }
            }
        }

        // max_attempts >= 1 and the last attempt never retries
        Err(AcquisitionError::NoStableWeight {
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    // flags 0x0022: weight + impedance stable, metric
    const STABLE: &str = "0022E8070C0F0A1E0050C31437";
    // flags 0x0020: weight stable, impedance not
    const NO_IMPEDANCE: &str = "0020E8070C0F0A1E0050C31437";
    // flags 0x0002: weight not stable
    const UNSTABLE: &str = "0002E8070C0F0A1E0050C31437";
    // flags 0x0022 but zero impedance
    const ZERO_IMPEDANCE: &str = "0022E8070C0F0A1E0000001437";

    fn payload(hex: &str) -> RawPayload {
        RawPayload::from_hex(hex).unwrap()
    }

    /// Serves one scripted payload per connection
    struct ScriptedSource {
        payloads: VecDeque<RawPayload>,
        current: RawPayload,
        reconnects: u32,
    }

    impl ScriptedSource {
        fn new(hexes: &[&str]) -> Self {
            let mut payloads: VecDeque<RawPayload> = hexes.iter().map(|h| payload(h)).collect();
            let current = payloads.pop_front().unwrap();
            Self {
                payloads,
                current,
                reconnects: 0,
            }
        }
    }

    impl PayloadSource for ScriptedSource {
        fn latest_payload(&self) -> Result<RawPayload, ConnectionError> {
            Ok(self.current.clone())
        }

        async fn reconnect(&mut self) -> Result<(), ConnectionError> {
            self.reconnects += 1;
            if let Some(next) = self.payloads.pop_front() {
                self.current = next;
            }
            Ok(())
        }
    }

    #[test]
    fn test_evaluate_branches() {
        assert!(matches!(
            evaluate(&payload(UNSTABLE), None, false),
            Verdict::Retrying(Rejection::UnstableWeight)
        ));
        assert!(matches!(
            evaluate(&payload(UNSTABLE), None, true),
            Verdict::Exhausted(Exhaustion::NoStableWeight)
        ));
        assert!(matches!(
            evaluate(&payload(NO_IMPEDANCE), None, false),
            Verdict::Retrying(Rejection::UnstableImpedance)
        ));
        assert!(matches!(
            evaluate(&payload(NO_IMPEDANCE), None, true),
            Verdict::Accepted { degraded: true, .. }
        ));
        assert!(matches!(
            evaluate(&payload(STABLE), None, false),
            Verdict::Accepted {
                degraded: false,
                ..
            }
        ));
    }

    #[test]
    fn test_zero_impedance_is_unstable() {
        assert!(matches!(
            evaluate(&payload(ZERO_IMPEDANCE), None, false),
            Verdict::Retrying(Rejection::UnstableImpedance)
        ));
    }

    #[test]
    fn test_truncated_payload_is_retried() {
        let truncated = payload("0022E8070C0F0A1E0050C314");
        assert!(matches!(
            evaluate(&truncated, None, false),
            Verdict::Retrying(Rejection::Undecodable(DecodeError::MalformedPayload { len: 12 }))
        ));
    }

    #[test]
    fn test_duplicate_never_accepted() {
        for flags in ["0022", "0020", "0002", "0000", "0162"] {
            let hex = format!("{}E8070C0F0A1E0050C31437", flags);
            let p = payload(&hex);
            let stored = Fingerprint::of(&p);
            for last_attempt in [false, true] {
                assert!(
                    !matches!(
                        evaluate(&p, Some(&stored), last_attempt),
                        Verdict::Accepted { .. }
                    ),
                    "flags {} accepted as fresh",
                    flags
                );
            }
        }
    }

    #[test]
    fn test_ambiguous_unit_is_rejected() {
        assert!(matches!(
            evaluate(&payload("0162E8070C0F0A1E0050C31437"), None, true),
            Verdict::Exhausted(Exhaustion::Unusable(DecodeError::AmbiguousUnit { .. }))
        ));
    }

    #[test]
    fn test_unit_resolved_after_weight_and_duplicate_gates() {
        // both unit bits, weight not stable
        let unstable = payload("0142E8070C0F0A1E0050C31437");
        assert!(matches!(
            evaluate(&unstable, None, true),
            Verdict::Exhausted(Exhaustion::NoStableWeight)
        ));

        let stable = payload("0162E8070C0F0A1E0050C31437");
        let stored = Fingerprint::of(&stable);
        assert!(matches!(
            evaluate(&stable, Some(&stored), true),
            Verdict::Exhausted(Exhaustion::NoFreshMeasurement)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepts_first_stable_reading() {
        let mut source = ScriptedSource::new(&[UNSTABLE, STABLE]);
        let acquisition = AcquisitionLoop::new(5, Duration::from_secs(5));

        let start = Instant::now();
        let reading = acquisition.run(&mut source, None).await.unwrap();

        assert_eq!(reading.attempt, 1);
        assert!(!reading.degraded);
        assert_eq!(source.reconnects, 1);
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert_eq!(reading.fingerprint().as_str(), STABLE.to_lowercase());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unstable_weight_exhausts_after_n_attempts() {
        let mut source = ScriptedSource::new(&[UNSTABLE]);
        let acquisition = AcquisitionLoop::new(5, Duration::from_secs(5));

        let err = acquisition.run(&mut source, None).await.unwrap_err();

        assert!(matches!(err, AcquisitionError::NoStableWeight { attempts: 5 }));
        assert_eq!(source.reconnects, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_duplicate_exhausts() {
        let mut source = ScriptedSource::new(&[STABLE]);
        let stored = Fingerprint::of(&payload(STABLE));
        let acquisition = AcquisitionLoop::new(3, Duration::from_millis(10));

        let err = acquisition.run(&mut source, Some(&stored)).await.unwrap_err();

        assert!(matches!(
            err,
            AcquisitionError::NoFreshMeasurement { attempts: 3 }
        ));
        assert_eq!(source.reconnects, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_impedance_never_stable_degrades_on_last_attempt() {
        let mut source = ScriptedSource::new(&[UNSTABLE, NO_IMPEDANCE]);
        let acquisition = AcquisitionLoop::new(5, Duration::from_secs(5));

        let reading = acquisition.run(&mut source, None).await.unwrap();

        assert!(reading.degraded);
        assert_eq!(reading.attempt, 4);
        assert_eq!(source.reconnects, 4);
        assert_eq!(reading.measurement.to_payload().impedance, "500.00");
    }
}
