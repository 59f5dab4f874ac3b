//! Threshold enforcement.
//!
//! A [`ThresholdEnforcer`] lives for exactly one validate or extract call.
//! Each entry goes through three stages:
//!
//! 1. [`admit`](ThresholdEnforcer::admit) before any byte is decompressed,
//!    using the declared size;
//! 2. [`check_progress`](ThresholdEnforcer::check_progress) after every
//!    chunk while the entry streams, using the bytes actually produced;
//! 3. [`commit`](ThresholdEnforcer::commit) once the entry is fully read.
//!
//! Only `commit` mutates the running totals, so the totals never include an
//! entry that failed a check.

use std::path::Path;

use crate::ExtractionError;
use crate::QuotaResource;
use crate::Result;
use crate::ThresholdConfig;
use crate::security::zipbomb::check_compression_ratio;
use crate::types::EntryDescriptor;

/// Bytes an entry may produce beyond its declared size before it is
/// treated as lying about its size.
pub const SIZE_TOLERANCE: u64 = 1024;

/// How compression ratios are measured for one archive.
///
/// The cumulative ratio is always taken against the archive's size on disk.
/// Compressed sizes recorded inside the archive can be inflated or shared
/// between overlapping members, so they never feed the cumulative ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatioBasis {
    /// Archive size only (tar family, where entries carry no compressed
    /// size).
    Container(u64),
    /// Archive size, and every member is also held to the limit against
    /// its own declared compressed size (zip).
    PerMember(u64),
}

impl RatioBasis {
    /// Size of the archive on disk.
    #[must_use]
    pub const fn archive_size(self) -> u64 {
        match self {
            Self::Container(size) | Self::PerMember(size) => size,
        }
    }
}

/// Counters for the entries accepted so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningTotals {
    /// Entries of any kind.
    pub objects: u64,
    /// Uncompressed bytes.
    pub uncompressed: u64,
    /// Declared compressed bytes of zip members. Informational only.
    pub compressed: u64,
}

impl RunningTotals {
    fn plus_uncompressed(self, bytes: u64) -> Result<Self> {
        Ok(Self {
            uncompressed: checked(self.uncompressed.checked_add(bytes))?,
            ..self
        })
    }
}

/// Provisional acceptance of one entry, handed back to the enforcer while
/// the entry streams and when it completes.
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct Admission {
    base: RunningTotals,
    declared: u64,
    member_compressed: Option<u64>,
}

impl Admission {
    /// Declared uncompressed size of the admitted entry.
    pub const fn declared(&self) -> u64 {
        self.declared
    }
}

/// Per-call quota state.
///
/// # Examples
///
/// ```
/// use arcsafe_core::ThresholdConfig;
/// use arcsafe_core::security::{RatioBasis, ThresholdEnforcer};
/// use arcsafe_core::types::EntryDescriptor;
/// use std::path::Path;
///
/// let config = ThresholdConfig::unlimited().with_max_objects(Some(1));
/// let mut enforcer = ThresholdEnforcer::new(config, RatioBasis::PerMember(1024));
///
/// let entry = EntryDescriptor::file("a.txt", 5).with_compressed_size(5);
/// let admission = enforcer.admit(&entry).unwrap();
/// enforcer.commit(admission, 5, Path::new("a.txt")).unwrap();
///
/// let second = EntryDescriptor::file("b.txt", 5).with_compressed_size(5);
/// assert!(enforcer.admit(&second).is_err());
/// ```
#[derive(Debug)]
pub struct ThresholdEnforcer {
    config: ThresholdConfig,
    basis: RatioBasis,
    totals: RunningTotals,
}

impl ThresholdEnforcer {
    /// Creates an enforcer with zeroed totals.
    #[must_use]
    pub fn new(config: ThresholdConfig, basis: RatioBasis) -> Self {
        Self {
            config,
            basis,
            totals: RunningTotals::default(),
        }
    }

    /// Totals of all committed entries.
    #[must_use]
    pub const fn totals(&self) -> RunningTotals {
        self.totals
    }

    /// Compressed byte count the cumulative ratio is computed against.
    #[must_use]
    pub const fn compressed_basis(&self) -> u64 {
        self.basis.archive_size()
    }

    /// Checks an entry against every limit using its declared sizes.
    ///
    /// # Errors
    ///
    /// Returns the first breach, in the order object count, size,
    /// cumulative ratio, member ratio.
    pub fn admit(&self, entry: &EntryDescriptor) -> Result<Admission> {
        let base = RunningTotals {
            objects: checked(self.totals.objects.checked_add(1))?,
            uncompressed: self.totals.uncompressed,
            compressed: checked(
                self.totals
                    .compressed
                    .checked_add(entry.compressed_size.unwrap_or(0)),
            )?,
        };
        let admission = Admission {
            base,
            declared: entry.uncompressed_size,
            member_compressed: entry.compressed_size,
        };
        self.evaluate(&admission, entry.uncompressed_size)?;
        Ok(admission)
    }

    /// Checks an entry that has produced `produced` bytes so far.
    ///
    /// # Errors
    ///
    /// - `SizeMismatch` if `produced` exceeds the declared size by more than
    ///   [`SIZE_TOLERANCE`]
    /// - the first quota breach computed with `produced` in place of the
    ///   declared size
    pub fn check_progress(
        &self,
        admission: &Admission,
        produced: u64,
        path: &Path,
    ) -> Result<()> {
        if produced > admission.declared.saturating_add(SIZE_TOLERANCE) {
            return Err(ExtractionError::SizeMismatch {
                path: path.to_path_buf(),
                declared: admission.declared,
                actual: produced,
            });
        }
        self.evaluate(admission, produced)
    }

    /// Re-checks a fully read entry with its actual size and adds it to the
    /// running totals.
    ///
    /// # Errors
    ///
    /// Same as [`check_progress`](Self::check_progress); totals are left
    /// untouched on error.
    pub fn commit(&mut self, admission: Admission, actual: u64, path: &Path) -> Result<()> {
        self.check_progress(&admission, actual, path)?;
        self.totals = admission.base.plus_uncompressed(actual)?;
        Ok(())
    }

    fn evaluate(&self, admission: &Admission, produced: u64) -> Result<()> {
        let candidate = admission.base.plus_uncompressed(produced)?;

        if let Some(max) = self.config.max_objects
            && candidate.objects > max
        {
            return Err(ExtractionError::QuotaExceeded {
                resource: QuotaResource::ObjectCount {
                    current: candidate.objects,
                    max,
                },
            });
        }

        if let Some(max) = self.config.max_size
            && candidate.uncompressed > max
        {
            return Err(ExtractionError::QuotaExceeded {
                resource: QuotaResource::TotalSize {
                    current: candidate.uncompressed,
                    max,
                },
            });
        }

        if let Some(max) = self.config.max_ratio {
            check_compression_ratio(candidate.uncompressed, self.basis.archive_size(), max)?;

            // A member that records no compressed size is covered by the
            // cumulative check alone.
            if let RatioBasis::PerMember(_) = self.basis
                && let Some(compressed) = admission.member_compressed
                && compressed > 0
            {
                check_compression_ratio(produced, compressed, max)?;
            }
        }

        Ok(())
    }
}

fn checked(value: Option<u64>) -> Result<u64> {
    value.ok_or(ExtractionError::QuotaExceeded {
        resource: QuotaResource::IntegerOverflow,
    })
}
