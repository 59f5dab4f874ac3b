//! TAR archive reader.
//!
//! Handles plain tar and tar wrapped in any [`CompressionCodec`]. Members of
//! a tar have no compressed size of their own, so the compression ratio is
//! measured against the archive file's size on disk.

use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;

use tar::EntryType as TarEntryType;

use super::compression::CompressionCodec;
use super::path_from_bytes;
use super::traits::ArchiveFormat;
use super::traits::EntryVisitor;
use crate::ExtractionError;
use crate::Result;
use crate::security::RatioBasis;
use crate::types::EntryDescriptor;
use crate::types::EntryKind;

/// TAR archive reader.
///
/// # Examples
///
/// ```no_run
/// use arcsafe_core::formats::TarArchive;
/// use arcsafe_core::formats::compression::CompressionCodec;
/// use arcsafe_core::formats::traits::ArchiveFormat;
/// use std::path::Path;
///
/// let archive = TarArchive::open(Path::new("backup.tar.gz"), Some(CompressionCodec::Gzip))?;
/// assert_eq!(archive.format_name(), "tar.gz");
/// # Ok::<(), arcsafe_core::ExtractionError>(())
/// ```
pub struct TarArchive {
    archive: tar::Archive<Box<dyn Read>>,
    archive_size: u64,
    codec: Option<CompressionCodec>,
}

impl TarArchive {
    /// Opens a tar file, decoding it with `codec` if given.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArchive` if the file cannot be opened.
    pub fn open(path: &Path, codec: Option<CompressionCodec>) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            ExtractionError::InvalidArchive(format!("cannot open {}: {e}", path.display()))
        })?;
        let archive_size = file.metadata()?.len();
        let reader = BufReader::new(file);
        let stream: Box<dyn Read> = match codec {
            Some(codec) => codec.decoder(reader)?,
            None => Box::new(reader),
        };
        Ok(Self::from_reader(stream, archive_size, codec))
    }

    /// Wraps an already decoded tar stream.
    ///
    /// `archive_size` is the compressed size the ratio is computed against.
    #[must_use]
    pub fn from_reader(
        stream: Box<dyn Read>,
        archive_size: u64,
        codec: Option<CompressionCodec>,
    ) -> Self {
        Self {
            archive: tar::Archive::new(stream),
            archive_size,
            codec,
        }
    }
}

impl ArchiveFormat for TarArchive {
    fn walk(&mut self, visitor: &mut dyn EntryVisitor) -> Result<u64> {
        let entries = self
            .archive
            .entries()
            .map_err(ExtractionError::from_archive_io)?;

        let mut count = 0u64;
        for entry in entries {
            let mut entry = entry.map_err(ExtractionError::from_archive_io)?;
            let Some(descriptor) = describe(&entry)? else {
                continue;
            };
            tracing::debug!(
                name = %descriptor.name,
                kind = descriptor.kind.label(),
                size = descriptor.uncompressed_size,
                "tar entry"
            );
            visitor.visit(&descriptor, &mut entry)?;
            count += 1;
        }

        // An empty stream or a lone end-of-archive marker is not an archive
        // anyone meant to ship.
        if count == 0 {
            return Err(ExtractionError::InvalidArchive(
                "tar archive has no entries".into(),
            ));
        }
        Ok(count)
    }

    fn format_name(&self) -> &'static str {
        match self.codec {
            None => "tar",
            Some(CompressionCodec::Gzip) => "tar.gz",
            Some(CompressionCodec::Bzip2) => "tar.bz2",
            Some(CompressionCodec::Xz) => "tar.xz",
            Some(CompressionCodec::Zstd) => "tar.zst",
        }
    }

    fn ratio_basis(&self) -> RatioBasis {
        RatioBasis::Container(self.archive_size)
    }
}

/// Builds a descriptor from a tar header, or `None` for metadata records the
/// tar crate folds into the following entry.
fn describe<R: Read>(entry: &tar::Entry<'_, R>) -> Result<Option<EntryDescriptor>> {
    let header = entry.header();
    let name = String::from_utf8(entry.path_bytes().into_owned()).map_err(|err| {
        ExtractionError::InvalidEntryName {
            name: String::from_utf8_lossy(err.as_bytes()).into_owned(),
            reason: "entry name is not valid UTF-8",
        }
    })?;
    let size = entry.size();

    let kind = match header.entry_type() {
        TarEntryType::XGlobalHeader
        | TarEntryType::XHeader
        | TarEntryType::GNULongName
        | TarEntryType::GNULongLink => return Ok(None),
        // Old-style archives mark directories with a trailing slash only.
        TarEntryType::Regular if name.ends_with('/') => EntryKind::Directory,
        TarEntryType::Regular | TarEntryType::Continuous => EntryKind::File,
        TarEntryType::Directory => EntryKind::Directory,
        TarEntryType::Symlink => {
            let target = entry.link_name_bytes().ok_or_else(|| {
                ExtractionError::InvalidArchive(format!("symlink {name:?} has no target"))
            })?;
            EntryKind::Symlink {
                target: path_from_bytes(&target),
            }
        }
        TarEntryType::Link => other("hardlink"),
        TarEntryType::Char => other("character device"),
        TarEntryType::Block => other("block device"),
        TarEntryType::Fifo => other("fifo"),
        TarEntryType::GNUSparse => other("sparse file"),
        unknown => EntryKind::Other {
            description: format!("tar type {:#04x}", unknown.as_byte()),
        },
    };

    Ok(Some(EntryDescriptor {
        name,
        uncompressed_size: size,
        compressed_size: None,
        kind,
        mode: header.mode().ok(),
    }))
}

fn other(description: &str) -> EntryKind {
    EntryKind::Other {
        description: description.to_string(),
    }
}
