//! ZIP archive reader.
//!
//! Compressed sizes in the central directory are untrusted: members can
//! claim padding or share one payload. The cumulative ratio therefore uses
//! the archive's size on disk, and the recorded sizes only feed the
//! per-member ratio.

use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;
use std::path::PathBuf;

use super::path_from_bytes;
use super::traits::ArchiveFormat;
use super::traits::EntryVisitor;
use crate::ExtractionError;
use crate::Result;
use crate::security::RatioBasis;
use crate::types::EntryDescriptor;
use crate::types::EntryKind;

/// Longest symlink target read from a zip member.
pub const MAX_LINK_TARGET: u64 = 4096;

const S_IFMT: u32 = 0o170_000;
const S_IFIFO: u32 = 0o010_000;
const S_IFCHR: u32 = 0o020_000;
const S_IFDIR: u32 = 0o040_000;
const S_IFBLK: u32 = 0o060_000;
const S_IFLNK: u32 = 0o120_000;
const S_IFSOCK: u32 = 0o140_000;

/// ZIP archive reader.
pub struct ZipArchive<R: Read + Seek = BufReader<File>> {
    archive: zip::ZipArchive<R>,
    archive_size: u64,
}

impl ZipArchive {
    /// Opens a zip file and reads its central directory.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArchive` if the file cannot be opened or has no valid
    /// central directory.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            ExtractionError::InvalidArchive(format!("cannot open {}: {e}", path.display()))
        })?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> ZipArchive<R> {
    /// Wraps any seekable zip source.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArchive` if no valid central directory is found.
    pub fn new(mut source: R) -> Result<Self> {
        let archive_size = source
            .seek(SeekFrom::End(0))
            .map_err(ExtractionError::from_archive_io)?;
        let archive = zip::ZipArchive::new(source)?;
        Ok(Self {
            archive,
            archive_size,
        })
    }

    /// Number of members listed in the central directory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    /// Returns `true` if the central directory lists no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }
}

impl<R: Read + Seek> ArchiveFormat for ZipArchive<R> {
    fn walk(&mut self, visitor: &mut dyn EntryVisitor) -> Result<u64> {
        let mut count = 0u64;
        for index in 0..self.archive.len() {
            let mut file = self.archive.by_index(index)?;
            let mut descriptor = describe(&file);
            if descriptor.kind.is_symlink() {
                visitor.screen(&descriptor)?;
                descriptor.kind = EntryKind::Symlink {
                    target: read_link_target(&mut file, &descriptor.name)?,
                };
            }
            tracing::debug!(
                name = %descriptor.name,
                kind = descriptor.kind.label(),
                size = descriptor.uncompressed_size,
                compressed = file.compressed_size(),
                "zip entry"
            );
            visitor.visit(&descriptor, &mut file)?;
            count += 1;
        }
        Ok(count)
    }

    fn format_name(&self) -> &'static str {
        "zip"
    }

    fn ratio_basis(&self) -> RatioBasis {
        RatioBasis::PerMember(self.archive_size)
    }
}

/// Builds a descriptor from central-directory metadata. A symlink's target
/// is left empty until the entry has been screened.
fn describe<R: Read>(file: &zip::read::ZipFile<'_, R>) -> EntryDescriptor {
    let name = file.name().to_string();
    let unix_mode = file.unix_mode();

    let kind = match unix_mode.map(|mode| mode & S_IFMT) {
        Some(S_IFLNK) => EntryKind::Symlink {
            target: PathBuf::new(),
        },
        Some(S_IFDIR) => EntryKind::Directory,
        Some(S_IFIFO) => other("fifo"),
        Some(S_IFCHR) => other("character device"),
        Some(S_IFBLK) => other("block device"),
        Some(S_IFSOCK) => other("socket"),
        _ if file.is_dir() => EntryKind::Directory,
        _ => EntryKind::File,
    };

    // A type-only mode carries no permissions worth applying.
    let mode = unix_mode
        .map(|mode| mode & 0o7777)
        .filter(|mode| mode & 0o777 != 0);

    EntryDescriptor {
        name,
        uncompressed_size: file.size(),
        compressed_size: Some(file.compressed_size()),
        kind,
        mode,
    }
}

/// Reads the target stored as the content of a zip symlink member.
fn read_link_target<R: Read>(file: &mut R, name: &str) -> Result<PathBuf> {
    let mut target = Vec::new();
    file.take(MAX_LINK_TARGET + 1)
        .read_to_end(&mut target)
        .map_err(ExtractionError::from_archive_io)?;
    if target.len() as u64 > MAX_LINK_TARGET {
        return Err(ExtractionError::InvalidArchive(format!(
            "symlink {name:?} has a target longer than {MAX_LINK_TARGET} bytes"
        )));
    }
    Ok(path_from_bytes(&target))
}

fn other(description: &str) -> EntryKind {
    EntryKind::Other {
        description: description.to_string(),
    }
}
