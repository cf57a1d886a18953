//! Numeric utilities: safe and centralized integer conversions.
//!
//! Declared configuration uses signed integers so that a negative value can
//! stand for "not set"; these helpers turn those into `Option`s at one place.

use std::time::Duration;

#[inline]
pub fn usize_to_u64(v: usize) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}

#[inline]
pub fn u64_to_usize(v: u64) -> usize {
    usize::try_from(v).unwrap_or(usize::MAX)
}

/// Negative values mean "unset".
#[inline]
pub fn non_negative_usize(v: i64) -> Option<usize> {
    usize::try_from(v).ok()
}

/// Negative values mean "unset".
#[inline]
pub fn non_negative_secs(v: i64) -> Option<Duration> {
    u64::try_from(v).ok().map(Duration::from_secs)
}
