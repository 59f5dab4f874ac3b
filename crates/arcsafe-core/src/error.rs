//! Error types for archive validation and extraction.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `ExtractionError`.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// A threshold that an archive would have crossed.
///
/// Every variant carries both the configured limit and the value the
/// archive would have reached, so callers can report the breach precisely.
#[derive(Debug, Clone, PartialEq)]
pub enum QuotaResource {
    /// Too many archive entries.
    ObjectCount {
        /// Entry count that would have been reached.
        current: u64,
        /// Configured maximum.
        max: u64,
    },
    /// Too many cumulative uncompressed bytes.
    TotalSize {
        /// Cumulative uncompressed size that would have been reached.
        current: u64,
        /// Configured maximum.
        max: u64,
    },
    /// Cumulative compression ratio too high.
    CompressionRatio {
        /// Ratio that would have been reached.
        ratio: f64,
        /// Configured maximum.
        max: f64,
        /// Cumulative uncompressed bytes used for the ratio.
        uncompressed: u64,
        /// Cumulative compressed bytes used for the ratio.
        compressed: u64,
    },
    /// Accounting arithmetic overflowed `u64`.
    IntegerOverflow,
}

impl std::fmt::Display for QuotaResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ObjectCount { current, max } => {
                write!(f, "object count exceeded ({current} > {max})")
            }
            Self::TotalSize { current, max } => {
                write!(f, "uncompressed size exceeded ({current} > {max} bytes)")
            }
            Self::CompressionRatio {
                ratio,
                max,
                uncompressed,
                compressed,
            } => write!(
                f,
                "compression ratio exceeded ({ratio:.2} > {max:.2}; \
                 {uncompressed} bytes from {compressed})"
            ),
            Self::IntegerOverflow => write!(f, "size accounting overflowed"),
        }
    }
}

/// Broad classification of an [`ExtractionError`].
///
/// Callers typically branch on this rather than on individual variants:
/// a quota breach means "reject the archive", an I/O error means
/// "something is wrong with the environment".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The archive cannot be opened, is not a supported container, or is corrupt.
    Format,
    /// An entry name or symlink target would escape the destination root.
    PathViolation,
    /// The archive holds an entry type that is never materialized.
    UnsupportedEntry,
    /// An entry collides with something already on disk or earlier in the archive.
    Conflict,
    /// Entry count limit breached.
    ObjectCountExceeded,
    /// Cumulative size limit breached, or an entry produced more bytes than declared.
    SizeExceeded,
    /// Cumulative compression ratio limit breached.
    RatioExceeded,
    /// Filesystem failure.
    Io,
}

/// Errors that can occur while validating or extracting an archive.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive format is unsupported or unrecognized.
    #[error("unsupported archive format")]
    UnsupportedFormat,

    /// Archive is corrupted or invalid.
    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    /// Entry name is empty, contains a NUL byte or is otherwise unusable.
    #[error("invalid entry name {name:?}: {reason}")]
    InvalidEntryName {
        /// Raw name as stored in the archive.
        name: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Entry name would resolve outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending entry path.
        path: PathBuf,
    },

    /// Symlink target would resolve outside the destination.
    #[error("symlink {path} escapes destination via {target}")]
    SymlinkEscape {
        /// The symlink entry path.
        path: PathBuf,
        /// The raw link target.
        target: PathBuf,
    },

    /// Entry type is never materialized (device, FIFO, hardlink, ...).
    #[error("unsupported entry type for {path}: {kind}")]
    UnsupportedEntryType {
        /// The entry path.
        path: PathBuf,
        /// Description of the entry type.
        kind: String,
    },

    /// Target already exists and overwriting is not allowed.
    #[error("refusing to overwrite existing path: {path}")]
    FileExists {
        /// The conflicting path.
        path: PathBuf,
    },

    /// Entry produced more bytes than its header declared.
    #[error("entry {path} produced {actual} bytes but declared {declared}")]
    SizeMismatch {
        /// The entry path.
        path: PathBuf,
        /// Size declared in the archive metadata.
        declared: u64,
        /// Bytes actually produced so far.
        actual: u64,
    },

    /// A configured threshold was crossed.
    #[error("quota exceeded: {resource}")]
    QuotaExceeded {
        /// The exceeded resource.
        resource: QuotaResource,
    },

    /// Extraction failed and removing partial output also failed.
    #[error("{source} (cleanup also failed: {cleanup})")]
    RollbackFailed {
        /// The error that aborted extraction.
        source: Box<ExtractionError>,
        /// The first error hit while removing partial output.
        cleanup: std::io::Error,
    },
}

impl ExtractionError {
    /// Classifies this error into one of the coarse [`ErrorKind`]s.
    ///
    /// A [`RollbackFailed`](Self::RollbackFailed) error reports the kind of
    /// the failure that caused the rollback, so a cleanup problem never hides
    /// what actually went wrong.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcsafe_core::{ErrorKind, ExtractionError, QuotaResource};
    ///
    /// let err = ExtractionError::QuotaExceeded {
    ///     resource: QuotaResource::ObjectCount { current: 11, max: 10 },
    /// };
    /// assert_eq!(err.kind(), ErrorKind::ObjectCountExceeded);
    /// ```
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::UnsupportedFormat | Self::InvalidArchive(_) => ErrorKind::Format,
            Self::InvalidEntryName { .. }
            | Self::PathTraversal { .. }
            | Self::SymlinkEscape { .. } => ErrorKind::PathViolation,
            Self::UnsupportedEntryType { .. } => ErrorKind::UnsupportedEntry,
            Self::FileExists { .. } => ErrorKind::Conflict,
            Self::SizeMismatch { .. } => ErrorKind::SizeExceeded,
            Self::QuotaExceeded { resource } => match resource {
                QuotaResource::ObjectCount { .. } => ErrorKind::ObjectCountExceeded,
                QuotaResource::TotalSize { .. } | QuotaResource::IntegerOverflow => {
                    ErrorKind::SizeExceeded
                }
                QuotaResource::CompressionRatio { .. } => ErrorKind::RatioExceeded,
            },
            Self::RollbackFailed { source, .. } => source.kind(),
        }
    }

    /// Returns `true` if the archive itself was rejected as hostile.
    ///
    /// Format and I/O problems are not security violations.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcsafe_core::ExtractionError;
    /// use std::path::PathBuf;
    ///
    /// let err = ExtractionError::PathTraversal {
    ///     path: PathBuf::from("../etc/passwd"),
    /// };
    /// assert!(err.is_security_violation());
    ///
    /// let err = ExtractionError::UnsupportedFormat;
    /// assert!(!err.is_security_violation());
    /// ```
    #[must_use]
    pub fn is_security_violation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::PathViolation
                | ErrorKind::UnsupportedEntry
                | ErrorKind::ObjectCountExceeded
                | ErrorKind::SizeExceeded
                | ErrorKind::RatioExceeded
        )
    }

    /// Returns a context string for this error, if available.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcsafe_core::ExtractionError;
    ///
    /// let err = ExtractionError::InvalidArchive("bad header".to_string());
    /// assert_eq!(err.context(), Some("bad header"));
    ///
    /// let err = ExtractionError::UnsupportedFormat;
    /// assert_eq!(err.context(), None);
    /// ```
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        match self {
            Self::InvalidArchive(msg) => Some(msg),
            Self::InvalidEntryName { reason, .. } => Some(reason),
            Self::RollbackFailed { source, .. } => source.context(),
            _ => None,
        }
    }

    /// Returns the quota resource that was exceeded, if applicable.
    #[must_use]
    pub fn quota_resource(&self) -> Option<&QuotaResource> {
        match self {
            Self::QuotaExceeded { resource } => Some(resource),
            Self::RollbackFailed { source, .. } => source.quota_resource(),
            _ => None,
        }
    }

    /// Wraps an I/O error raised while reading the archive stream.
    ///
    /// Decoders and the tar/zip parsers report corrupt input as I/O errors;
    /// those become [`InvalidArchive`](Self::InvalidArchive) so that a
    /// malformed archive is not mistaken for an environment failure.
    pub(crate) fn from_archive_io(err: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;
        match err.kind() {
            Io::InvalidData | Io::InvalidInput | Io::UnexpectedEof | Io::Other => {
                Self::InvalidArchive(err.to_string())
            }
            _ => Self::Io(err),
        }
    }
}

impl From<zip::result::ZipError> for ExtractionError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Self::from_archive_io(e),
            other => Self::InvalidArchive(other.to_string()),
        }
    }
}
