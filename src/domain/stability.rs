//! Stability gate
//!
//! Pure predicates deciding whether a reading is usable.

use crate::domain::models::{ControlFlags, Fingerprint, RawPayload};

/// The scale has converged on a weight.
pub fn is_weight_stable(flags: ControlFlags) -> bool {
    flags.contains(ControlFlags::WEIGHT_STABLE)
}

/// Impedance is flagged stable and physically meaningful.
pub fn is_impedance_stable(flags: ControlFlags, impedance: f64) -> bool {
    flags.contains(ControlFlags::IMPEDANCE_STABLE) && impedance > 0.0
}

/// Byte-for-byte match against the last delivered payload.
pub fn is_duplicate(payload: &RawPayload, last: Option<&Fingerprint>) -> bool {
    last.is_some_and(|fingerprint| Fingerprint::of(payload) == *fingerprint)
}
