//! Compression ratio arithmetic.

use crate::ExtractionError;
use crate::QuotaResource;
use crate::Result;

/// Returns `uncompressed / compressed`, or `None` when nothing has been
/// decompressed yet.
///
/// Zero compressed bytes producing output is an infinite ratio.
///
/// # Examples
///
/// ```
/// use arcsafe_core::security::compression_ratio;
///
/// assert_eq!(compression_ratio(1000, 10), Some(100.0));
/// assert_eq!(compression_ratio(0, 0), None);
/// assert_eq!(compression_ratio(10, 0), Some(f64::INFINITY));
/// ```
#[must_use]
pub fn compression_ratio(uncompressed: u64, compressed: u64) -> Option<f64> {
    if uncompressed == 0 {
        return None;
    }
    if compressed == 0 {
        return Some(f64::INFINITY);
    }
    Some(uncompressed as f64 / compressed as f64)
}

/// Checks a ratio against `max`.
///
/// # Errors
///
/// Returns `QuotaExceeded` with [`QuotaResource::CompressionRatio`] if the
/// ratio is strictly greater than `max`.
pub fn check_compression_ratio(uncompressed: u64, compressed: u64, max: f64) -> Result<()> {
    match compression_ratio(uncompressed, compressed) {
        Some(ratio) if ratio > max => Err(ExtractionError::QuotaExceeded {
            resource: QuotaResource::CompressionRatio {
                ratio,
                max,
                uncompressed,
                compressed,
            },
        }),
        _ => Ok(()),
    }
}
