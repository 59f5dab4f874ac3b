//! Validation and extraction reporting.

use std::time::Duration;

use crate::security::RunningTotals;

/// Report of a successful validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// Detected container format, e.g. `"zip"` or `"tar.gz"`.
    pub format: &'static str,

    /// Number of entries of any kind.
    pub entries: u64,

    /// Total uncompressed bytes.
    pub uncompressed_bytes: u64,

    /// Compressed bytes the ratio was computed against.
    pub compressed_bytes: u64,
}

impl ValidationReport {
    pub(crate) const fn new(format: &'static str, totals: RunningTotals, compressed: u64) -> Self {
        Self {
            format,
            entries: totals.objects,
            uncompressed_bytes: totals.uncompressed,
            compressed_bytes: compressed,
        }
    }

    /// Cumulative compression ratio, or `None` if nothing was decompressed.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcsafe_core::ValidationReport;
    ///
    /// let report = ValidationReport {
    ///     format: "zip",
    ///     entries: 3,
    ///     uncompressed_bytes: 5000,
    ///     compressed_bytes: 500,
    /// };
    /// assert_eq!(report.compression_ratio(), Some(10.0));
    /// ```
    #[must_use]
    pub fn compression_ratio(&self) -> Option<f64> {
        crate::security::compression_ratio(self.uncompressed_bytes, self.compressed_bytes)
    }
}

/// Report of an archive extraction operation.
///
/// Contains statistics about what was written under the destination.
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// Number of files successfully extracted.
    pub files_extracted: usize,

    /// Number of directory entries materialized.
    pub directories_created: usize,

    /// Number of symlinks created.
    pub symlinks_created: usize,

    /// Total bytes written to disk.
    pub bytes_written: u64,

    /// Duration of the extraction operation.
    pub duration: Duration,
}

impl ExtractionReport {
    /// Creates a new empty extraction report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns total number of entries materialized.
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.files_extracted + self.directories_created + self.symlinks_created
    }
}
