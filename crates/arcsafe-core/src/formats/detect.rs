//! Archive format detection by content.
//!
//! The file extension is ignored. Detection looks at, in order:
//!
//! 1. zip local-header or empty-archive signatures at offset 0;
//! 2. gzip / bzip2 / xz / zstd magic, confirmed by decoding the first
//!    block and checking it is a tar header;
//! 3. a tar header at offset 0 (`ustar` magic or a valid header checksum);
//! 4. a zip end-of-central-directory record near the end of the file, which
//!    covers zips with a prepended stub.

use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;

use super::compression::CompressionCodec;
use crate::ExtractionError;
use crate::Result;

const TAR_BLOCK: usize = 512;

/// Largest distance of the zip end-of-central-directory record from the end
/// of the file: 22-byte record plus a maximal 65535-byte comment.
const ZIP_EOCD_SEARCH: u64 = 22 + 65_535;

const ZIP_LOCAL_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";
const ZIP_SPANNED_MAGIC: &[u8] = b"PK\x07\x08";

/// Supported archive containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    /// Tar archive (uncompressed).
    Tar,
    /// Gzip-compressed tar archive.
    TarGz,
    /// Bzip2-compressed tar archive.
    TarBz2,
    /// XZ-compressed tar archive.
    TarXz,
    /// Zstd-compressed tar archive.
    TarZst,
    /// ZIP archive.
    Zip,
}

impl ArchiveType {
    /// Stream codec wrapping the tar data, if any.
    #[must_use]
    pub const fn codec(self) -> Option<CompressionCodec> {
        match self {
            Self::TarGz => Some(CompressionCodec::Gzip),
            Self::TarBz2 => Some(CompressionCodec::Bzip2),
            Self::TarXz => Some(CompressionCodec::Xz),
            Self::TarZst => Some(CompressionCodec::Zstd),
            Self::Tar | Self::Zip => None,
        }
    }

    /// Short name used in logs and reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
            Self::TarBz2 => "tar.bz2",
            Self::TarXz => "tar.xz",
            Self::TarZst => "tar.zst",
            Self::Zip => "zip",
        }
    }

    const fn from_codec(codec: CompressionCodec) -> Self {
        match codec {
            CompressionCodec::Gzip => Self::TarGz,
            CompressionCodec::Bzip2 => Self::TarBz2,
            CompressionCodec::Xz => Self::TarXz,
            CompressionCodec::Zstd => Self::TarZst,
        }
    }
}

/// Detects the container format of the file at `path`.
///
/// # Errors
///
/// - `InvalidArchive` if the file cannot be opened or read
/// - `UnsupportedFormat` if no supported container is recognized
pub fn detect_format(path: &Path) -> Result<ArchiveType> {
    let file = File::open(path).map_err(|e| {
        ExtractionError::InvalidArchive(format!("cannot open {}: {e}", path.display()))
    })?;
    let mut reader = BufReader::new(file);

    let mut header = [0u8; TAR_BLOCK];
    let filled = read_up_to(&mut reader, &mut header).map_err(ExtractionError::from_archive_io)?;
    let header = &header[..filled];

    if header.is_empty() {
        return Err(ExtractionError::UnsupportedFormat);
    }

    if [ZIP_LOCAL_MAGIC, ZIP_EMPTY_MAGIC, ZIP_SPANNED_MAGIC]
        .iter()
        .any(|magic| header.starts_with(magic))
    {
        return Ok(ArchiveType::Zip);
    }

    if let Some(codec) = CompressionCodec::from_magic(header) {
        reader.seek(SeekFrom::Start(0))?;
        let mut decoder = codec.decoder(reader)?;
        let mut block = [0u8; TAR_BLOCK];
        // A codec stream that does not hold a tar is not an archive we handle.
        let decoded = read_up_to(&mut decoder, &mut block).unwrap_or(0);
        if decoded == TAR_BLOCK && (is_tar_header(&block) || is_zero_block(&block)) {
            return Ok(ArchiveType::from_codec(codec));
        }
        return Err(ExtractionError::UnsupportedFormat);
    }

    if header.len() == TAR_BLOCK && is_tar_header(header) {
        return Ok(ArchiveType::Tar);
    }

    if has_zip_end_record(&mut reader)? {
        return Ok(ArchiveType::Zip);
    }

    Err(ExtractionError::UnsupportedFormat)
}

/// Returns `true` if `block` is a plausible tar header.
///
/// The header checksum must match; `ustar` magic alone is not enough.
#[must_use]
pub fn is_tar_header(block: &[u8]) -> bool {
    if block.len() < TAR_BLOCK {
        return false;
    }
    let Some(stored) = parse_octal(&block[148..156]) else {
        return false;
    };
    let computed: u64 = block[..TAR_BLOCK]
        .iter()
        .enumerate()
        .map(|(i, &b)| {
            if (148..156).contains(&i) {
                u64::from(b' ')
            } else {
                u64::from(b)
            }
        })
        .sum();
    stored == computed
}

fn is_zero_block(block: &[u8]) -> bool {
    block.iter().all(|&b| b == 0)
}

fn parse_octal(field: &[u8]) -> Option<u64> {
    let digits: Vec<u8> = field
        .iter()
        .copied()
        .skip_while(|&b| b == b' ')
        .take_while(|&b| (b'0'..=b'7').contains(&b))
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits
        .iter()
        .try_fold(0u64, |acc, &d| acc.checked_mul(8)?.checked_add(u64::from(d - b'0')))
}

fn has_zip_end_record<R: Read + Seek>(reader: &mut R) -> Result<bool> {
    let len = reader.seek(SeekFrom::End(0))?;
    let start = len.saturating_sub(ZIP_EOCD_SEARCH);
    reader.seek(SeekFrom::Start(start))?;
    let mut tail = Vec::new();
    reader
        .take(ZIP_EOCD_SEARCH)
        .read_to_end(&mut tail)
        .map_err(ExtractionError::from_archive_io)?;
    Ok(tail.windows(ZIP_EMPTY_MAGIC.len()).any(|w| w == ZIP_EMPTY_MAGIC))
}

fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
