//! Safe-numeric combinators.
//!
//! Every number entering the engine (item rating/popularity/cost, computed
//! scores) passes through one of these helpers, so NaN and division by zero are
//! handled in one place:
//! - `ingest` / `ingest_count`: external fields. Absent → 0, non-finite → error.
//! - `finite_or`, `ratio`, `clamp_to`: computed values. Undefined → neutral default.

use thiserror::Error;

/// A numeric item field that cannot be used for scoring.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed `{field}` value: {value}")]
pub struct NumericError {
    pub field: &'static str,
    pub value: f64,
}

/// Read an optional float field. Missing fields default to 0.
pub fn ingest(field: &'static str, raw: Option<f64>) -> Result<f64, NumericError> {
    match raw {
        None => Ok(0.0),
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(NumericError { field, value: v }),
    }
}

/// Read an optional count field (popularity). Counts are always representable.
pub fn ingest_count(raw: Option<u64>) -> f64 {
    raw.map(|v| v as f64).unwrap_or(0.0)
}

/// Replace a non-finite value by `default`.
#[inline]
pub fn finite_or(x: f64, default: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        default
    }
}

/// `num / den`, or 0 when the quotient is undefined.
#[inline]
pub fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        return 0.0;
    }
    finite_or(num / den, 0.0)
}

/// Clamp into `[lo, hi]`; non-finite input maps to `lo`.
#[inline]
pub fn clamp_to(x: f64, lo: f64, hi: f64) -> f64 {
    finite_or(x, lo).clamp(lo, hi)
}
