//! Entry validation orchestrator.
//!
//! [`EntryValidator`] runs every check an entry must pass before a single
//! byte of it is decompressed, and keeps the per-call state those checks
//! depend on: the path resolver with its overlay of earlier entries, and the
//! threshold enforcer with its running totals. Validation and extraction
//! share it, which is what makes a successful validation a promise that
//! extraction into the same destination succeeds.

use std::path::PathBuf;

use crate::ExtractOptions;
use crate::ExtractionError;
use crate::Result;
use crate::security::path::Node;
use crate::security::path::PathResolver;
use crate::security::permissions::sanitize_permissions;
use crate::security::quota::Admission;
use crate::security::quota::RunningTotals;
use crate::security::quota::ThresholdEnforcer;
use crate::security::symlink::validate_symlink;
use crate::security::symlink::verify_recorded_symlinks;
use crate::types::EntryDescriptor;
use crate::types::EntryKind;
use crate::types::SafePath;
use crate::types::SafeSymlink;

/// Result of entry validation.
///
/// Contains the confined target path and everything needed to materialize
/// the entry.
#[derive(Debug)]
pub struct ValidatedEntry {
    /// Validated path within the destination.
    pub safe_path: SafePath,

    /// Validated entry type.
    pub entry_type: ValidatedEntryType,

    /// Sanitized permission bits, if the archive recorded any.
    pub mode: Option<u32>,

    admission: Admission,
}

impl ValidatedEntry {
    /// Declared uncompressed size.
    #[must_use]
    pub const fn declared_size(&self) -> u64 {
        self.admission.declared()
    }
}

/// Validated entry type variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedEntryType {
    /// Regular file.
    File,

    /// Directory.
    Directory,

    /// Symlink whose target stays inside the root.
    Symlink(SafeSymlink),
}

/// Orchestrates security validation for archive entries.
///
/// # Lifecycle
///
/// 1. Create with [`EntryValidator::new`]
/// 2. For each entry, call [`validate_entry`](Self::validate_entry), stream
///    its contents through [`check_progress`](Self::check_progress) and
///    finish it with [`commit`](Self::commit)
/// 3. After the last entry, call [`finish`](Self::finish)
///
/// # Examples
///
/// ```
/// use arcsafe_core::{ExtractOptions, ThresholdConfig};
/// use arcsafe_core::security::{EntryValidator, PathResolver, RatioBasis, ThresholdEnforcer};
/// use arcsafe_core::types::EntryDescriptor;
///
/// let mut validator = EntryValidator::new(
///     PathResolver::new(None),
///     ThresholdEnforcer::new(ThresholdConfig::unlimited(), RatioBasis::PerMember(1024)),
///     &ExtractOptions::default(),
/// );
///
/// let entry = EntryDescriptor::file("docs/readme.md", 5).with_compressed_size(5);
/// let validated = validator.validate_entry(&entry)?;
/// validator.commit(validated, 5)?;
///
/// let duplicate = EntryDescriptor::file("docs/readme.md", 5).with_compressed_size(5);
/// assert!(validator.validate_entry(&duplicate).is_err());
///
/// let totals = validator.finish()?;
/// assert_eq!(totals.objects, 1);
/// # Ok::<(), arcsafe_core::ExtractionError>(())
/// ```
#[derive(Debug)]
pub struct EntryValidator {
    resolver: PathResolver,
    enforcer: ThresholdEnforcer,
    allow_overwrite: bool,
}

impl EntryValidator {
    /// Creates a validator for one validate or extract call.
    #[must_use]
    pub fn new(
        resolver: PathResolver,
        enforcer: ThresholdEnforcer,
        options: &ExtractOptions,
    ) -> Self {
        Self {
            resolver,
            enforcer,
            allow_overwrite: options.allow_overwrite,
        }
    }

    /// The path resolver, including everything recorded so far.
    #[must_use]
    pub const fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Totals of all committed entries.
    #[must_use]
    pub const fn totals(&self) -> RunningTotals {
        self.enforcer.totals()
    }

    /// Compressed byte count the cumulative ratio is computed against.
    #[must_use]
    pub const fn compressed_basis(&self) -> u64 {
        self.enforcer.compressed_basis()
    }

    /// Validates an archive entry from its metadata alone.
    ///
    /// Checks run in this order:
    /// 1. name normalization and symlink-aware path resolution
    /// 2. entry kind (only files, directories and symlinks are supported)
    /// 3. root and collision rules
    /// 4. provisional quota check with the declared sizes
    /// 5. symlink target confinement
    ///
    /// Nothing is recorded; the entry only becomes part of the running
    /// state once it is [committed](Self::commit).
    ///
    /// # Errors
    ///
    /// - `InvalidEntryName`, `PathTraversal` for bad names
    /// - `UnsupportedEntryType` for hardlinks, devices, FIFOs and the like
    /// - `FileExists` on a collision
    /// - `QuotaExceeded` if the declared sizes already breach a limit
    /// - `SymlinkEscape` for a symlink pointing outside the root
    pub fn validate_entry(&self, entry: &EntryDescriptor) -> Result<ValidatedEntry> {
        let (safe_path, admission) = self.check_metadata(entry)?;

        let entry_type = match &entry.kind {
            EntryKind::Symlink { target } => {
                let link = validate_symlink(&self.resolver, &safe_path, target)?;
                ValidatedEntryType::Symlink(link)
            }
            EntryKind::Directory => ValidatedEntryType::Directory,
            EntryKind::File | EntryKind::Other { .. } => ValidatedEntryType::File,
        };

        let mode = match &entry_type {
            ValidatedEntryType::Symlink(_) => None,
            _ => entry.mode.map(sanitize_permissions),
        };

        Ok(ValidatedEntry {
            safe_path,
            entry_type,
            mode,
            admission,
        })
    }

    /// Runs steps 1 to 4 of [`validate_entry`](Self::validate_entry).
    ///
    /// Readers that must decompress something before the entry is complete,
    /// like the target of a zip symlink, call this first. A symlink target
    /// in `entry` is ignored.
    ///
    /// # Errors
    ///
    /// Same as [`validate_entry`](Self::validate_entry), except
    /// `SymlinkEscape`.
    pub fn screen(&self, entry: &EntryDescriptor) -> Result<()> {
        self.check_metadata(entry).map(|_| ())
    }

    fn check_metadata(&self, entry: &EntryDescriptor) -> Result<(SafePath, Admission)> {
        let safe_path = self.resolver.resolve(&entry.name)?;

        if let EntryKind::Other { description } = &entry.kind {
            return Err(ExtractionError::UnsupportedEntryType {
                path: PathBuf::from(&entry.name),
                kind: description.clone(),
            });
        }

        if safe_path.is_root() && !entry.kind.is_directory() {
            return Err(ExtractionError::InvalidEntryName {
                name: entry.name.clone(),
                reason: "only a directory may resolve to the destination root",
            });
        }

        self.check_collision(&safe_path, &entry.kind)?;

        let admission = self.enforcer.admit(entry)?;
        Ok((safe_path, admission))
    }

    /// Re-checks limits while an entry has produced `produced` bytes.
    ///
    /// # Errors
    ///
    /// `SizeMismatch` or `QuotaExceeded`, see
    /// [`ThresholdEnforcer::check_progress`].
    pub fn check_progress(&self, entry: &ValidatedEntry, produced: u64) -> Result<()> {
        self.enforcer
            .check_progress(&entry.admission, produced, entry.safe_path.as_path())
    }

    /// Accepts a fully read entry that produced `actual` bytes.
    ///
    /// Adds it to the running totals and records it so later entries are
    /// resolved and collision-checked against it.
    ///
    /// # Errors
    ///
    /// Same as [`check_progress`](Self::check_progress); nothing is recorded
    /// on error.
    pub fn commit(&mut self, entry: ValidatedEntry, actual: u64) -> Result<()> {
        self.enforcer
            .commit(entry.admission, actual, entry.safe_path.as_path())?;

        let node = match entry.entry_type {
            ValidatedEntryType::File => Node::File,
            ValidatedEntryType::Directory => Node::Directory,
            ValidatedEntryType::Symlink(link) => Node::Symlink(link.target().to_path_buf()),
        };
        if !entry.safe_path.is_root() {
            self.resolver.record(&entry.safe_path, node);
        }
        Ok(())
    }

    /// Runs the checks that need the whole archive and returns the totals.
    ///
    /// # Errors
    ///
    /// `SymlinkEscape` if a recorded symlink escapes the root through links
    /// added after it.
    pub fn finish(self) -> Result<RunningTotals> {
        verify_recorded_symlinks(&self.resolver)?;
        Ok(self.enforcer.totals())
    }

    fn check_collision(&self, path: &SafePath, kind: &EntryKind) -> Result<()> {
        let conflict = || ExtractionError::FileExists {
            path: path.as_path().to_path_buf(),
        };

        match (self.resolver.existing(path)?, kind.is_directory()) {
            (None, _) | (Some(Node::Directory), true) => Ok(()),
            // Kinds never replace each other, even with overwriting allowed.
            (Some(Node::Directory), false) | (Some(_), true) => Err(conflict()),
            (Some(_), false) if self.allow_overwrite => Ok(()),
            (Some(_), false) => Err(conflict()),
        }
    }
}
