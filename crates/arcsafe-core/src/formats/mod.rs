//! Archive format readers.
//!
//! [`open_archive`] sniffs the file and returns the matching reader behind
//! the [`ArchiveFormat`] trait.

pub mod compression;
pub mod detect;
pub mod tar;
pub mod traits;
pub mod zip;

use std::path::Path;
use std::path::PathBuf;

pub use detect::ArchiveType;
pub use detect::detect_format;
pub use tar::TarArchive;
pub use traits::ArchiveFormat;
pub use traits::EntryVisitor;
pub use zip::ZipArchive;

use crate::Result;

/// Opens `path` with the reader for its detected container format.
///
/// The file extension is never consulted.
///
/// # Errors
///
/// - `UnsupportedFormat` if the container is not recognized
/// - `InvalidArchive` if the file cannot be opened or its headers are corrupt
pub fn open_archive(path: &Path) -> Result<Box<dyn ArchiveFormat>> {
    let archive_type = detect_format(path)?;
    tracing::debug!(
        path = %path.display(),
        format = archive_type.name(),
        "detected archive format"
    );
    Ok(match archive_type {
        ArchiveType::Zip => Box::new(ZipArchive::open(path)?),
        other => Box::new(TarArchive::open(path, other.codec())?),
    })
}

/// Converts raw link bytes stored in an archive to a path.
#[cfg(unix)]
pub(crate) fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

/// Converts raw link bytes stored in an archive to a path.
#[cfg(not(unix))]
pub(crate) fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::TarTestBuilder;
    use crate::test_utils::ZipTestBuilder;
    use crate::test_utils::compress;
    use compression::CompressionCodec;
    use tempfile::TempDir;

    #[test]
    fn test_open_archive_selects_reader() {
        let temp = TempDir::new().unwrap();
        let tar = TarTestBuilder::new().add_file("a", b"a").build();

        let cases = [
            ("plain", tar.clone(), "tar"),
            ("gz", compress(&tar, CompressionCodec::Gzip), "tar.gz"),
            ("xz", compress(&tar, CompressionCodec::Xz), "tar.xz"),
            ("zip", ZipTestBuilder::new().add_file("a", b"a").build(), "zip"),
        ];
        for (name, data, expected) in cases {
            let path = temp.path().join(name);
            std::fs::write(&path, data).unwrap();
            assert_eq!(open_archive(&path).unwrap().format_name(), expected);
        }
    }

    #[test]
    fn test_path_from_bytes() {
        assert_eq!(path_from_bytes(b"a/b"), PathBuf::from("a/b"));
    }
}
