//! Archive entry metadata as reported by a format reader.

use std::path::PathBuf;

/// Kind of an archive member.
///
/// # Examples
///
/// ```
/// use arcsafe_core::types::EntryKind;
/// use std::path::PathBuf;
///
/// let link = EntryKind::Symlink {
///     target: PathBuf::from("../lib/libfoo.so.1"),
/// };
/// assert!(link.is_symlink());
/// assert!(!EntryKind::Directory.is_file());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file.
    File,

    /// Directory.
    Directory,

    /// Symbolic link.
    ///
    /// The target is exactly what the archive stores and has NOT been
    /// validated.
    Symlink {
        /// Raw link target.
        target: PathBuf,
    },

    /// Anything else: hardlinks, devices, FIFOs, sockets, sparse files.
    ///
    /// These are never materialized.
    Other {
        /// Human-readable type name, e.g. `"hardlink"` or `"fifo"`.
        description: String,
    },
}

impl EntryKind {
    /// Returns `true` if this is a regular file.
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self, Self::File)
    }

    /// Returns `true` if this is a directory.
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        matches!(self, Self::Directory)
    }

    /// Returns `true` if this is a symlink.
    #[must_use]
    pub const fn is_symlink(&self) -> bool {
        matches!(self, Self::Symlink { .. })
    }

    /// Short name used in log lines and errors.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Symlink { .. } => "symlink",
            Self::Other { description } => description,
        }
    }
}

/// One archive member, before any validation.
///
/// Everything in here comes from archive metadata and may be a lie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDescriptor {
    /// Name exactly as stored in the archive.
    pub name: String,

    /// Declared uncompressed size in bytes.
    pub uncompressed_size: u64,

    /// Declared compressed size, when the format records one per entry.
    ///
    /// Zip does; tar members are stored raw inside an optionally
    /// compressed stream and have none.
    pub compressed_size: Option<u64>,

    /// Entry kind.
    pub kind: EntryKind,

    /// Unix permission bits, when recorded.
    pub mode: Option<u32>,
}

impl EntryDescriptor {
    /// Creates a descriptor for a regular file with no mode.
    #[must_use]
    pub fn file(name: impl Into<String>, uncompressed_size: u64) -> Self {
        Self {
            name: name.into(),
            uncompressed_size,
            compressed_size: None,
            kind: EntryKind::File,
            mode: None,
        }
    }

    /// Sets the declared compressed size.
    #[must_use]
    pub const fn with_compressed_size(mut self, compressed: u64) -> Self {
        self.compressed_size = Some(compressed);
        self
    }

    /// Sets the entry kind.
    #[must_use]
    pub fn with_kind(mut self, kind: EntryKind) -> Self {
        self.kind = kind;
        self
    }
}
