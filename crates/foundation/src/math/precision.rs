//! Deterministic float handling.
//!
//! Coordinates are used as grouping keys and sort keys, so equal values must
//! compare and format identically regardless of sign-of-zero or NaN payload.

use core::cmp::Ordering;

/// Canonicalize a floating-point value for deterministic ordering.
///
/// Rules:
/// - `-0.0` becomes `0.0`
/// - all NaNs become a single canonical NaN
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Deterministic total ordering for floats.
///
/// Prefer this any time you sort floats or use them in ordered keys.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}

/// Exact-coordinate grouping key, `"lat,lng"`.
///
/// Uses the shortest round-trip float formatting, so two keys are equal iff
/// the canonicalized values are bit-identical.
pub fn coordinate_key(lat: f64, lng: f64) -> String {
    format!("{},{}", canonical_f64(lat), canonical_f64(lng))
}
