//! Test utilities for archive creation.
//!
//! Builders here produce in-memory archives, including hostile ones: names
//! with `..`, absolute names and escaping symlink targets are written to the
//! headers verbatim.
//!
//! # Panics
//!
//! All functions in this module may panic on I/O errors since they are
//! designed for test use only where panics are acceptable.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::io::Cursor;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::formats::compression::CompressionCodec;

/// Longest name that fits a tar header's name or link field.
const TAR_NAME_FIELD: usize = 100;

/// Builder for creating TAR test archives with various entry types.
///
/// # Examples
///
/// ```
/// use arcsafe_core::test_utils::TarTestBuilder;
///
/// let tar_data = TarTestBuilder::new()
///     .add_file("file.txt", b"content")
///     .add_directory("dir/")
///     .add_symlink("link", "file.txt")
///     .add_file("../outside.txt", b"hostile")
///     .build();
/// assert_eq!(tar_data.len() % 512, 0);
/// ```
pub struct TarTestBuilder {
    builder: tar::Builder<Vec<u8>>,
}

impl TarTestBuilder {
    /// Creates a new TAR test builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            builder: tar::Builder::new(Vec::new()),
        }
    }

    /// Adds a regular file to the archive.
    #[must_use]
    pub fn add_file(self, path: &str, data: &[u8]) -> Self {
        self.add_file_with_mode(path, data, 0o644)
    }

    /// Adds a regular file with custom mode.
    #[must_use]
    pub fn add_file_with_mode(self, path: &str, data: &[u8], mode: u32) -> Self {
        self.append(path.as_bytes(), tar::EntryType::Regular, mode, None, data)
    }

    /// Adds a regular file whose name is stored byte for byte, whether or
    /// not it is valid UTF-8.
    #[must_use]
    pub fn add_file_raw_name(self, name: &[u8], data: &[u8]) -> Self {
        self.append(name, tar::EntryType::Regular, 0o644, None, data)
    }

    /// Adds a directory to the archive.
    #[must_use]
    pub fn add_directory(self, path: &str) -> Self {
        self.add_directory_with_mode(path, 0o755)
    }

    /// Adds a directory with custom mode.
    #[must_use]
    pub fn add_directory_with_mode(self, path: &str, mode: u32) -> Self {
        self.append(path.as_bytes(), tar::EntryType::Directory, mode, None, &[])
    }

    /// Adds a symlink to the archive.
    #[must_use]
    pub fn add_symlink(self, path: &str, target: &str) -> Self {
        self.append(path.as_bytes(), tar::EntryType::Symlink, 0o777, Some(target), &[])
    }

    /// Adds a hardlink to the archive.
    #[must_use]
    pub fn add_hardlink(self, path: &str, target: &str) -> Self {
        self.append(path.as_bytes(), tar::EntryType::Link, 0o644, Some(target), &[])
    }

    /// Adds a FIFO to the archive.
    #[must_use]
    pub fn add_fifo(self, path: &str) -> Self {
        self.append(path.as_bytes(), tar::EntryType::Fifo, 0o644, None, &[])
    }

    /// Adds a character device to the archive.
    #[must_use]
    pub fn add_char_device(self, path: &str) -> Self {
        self.append(path.as_bytes(), tar::EntryType::Char, 0o644, None, &[])
    }

    /// Builds and returns the TAR archive data.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.builder.into_inner().unwrap()
    }

    fn append(
        mut self,
        path: &[u8],
        entry_type: tar::EntryType,
        mode: u32,
        link: Option<&str>,
        data: &[u8],
    ) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(mode);
        header.set_entry_type(entry_type);

        if let Some(target) = link {
            assert!(target.len() <= TAR_NAME_FIELD, "link target too long");
            header.as_old_mut().linkname[..target.len()].copy_from_slice(target.as_bytes());
        }

        if path.len() <= TAR_NAME_FIELD {
            // Raw copy: the tar crate refuses to write hostile names.
            header.as_old_mut().name[..path.len()].copy_from_slice(path);
            header.set_cksum();
            self.builder.append(&header, data).unwrap();
        } else {
            let path = std::str::from_utf8(path).unwrap();
            header.set_cksum();
            self.builder.append_data(&mut header, path, data).unwrap();
        }
        self
    }
}

impl Default for TarTestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating ZIP test archives with various entry types.
///
/// # Examples
///
/// ```
/// use arcsafe_core::test_utils::ZipTestBuilder;
///
/// let zip_data = ZipTestBuilder::new()
///     .add_file("file.txt", b"content")
///     .add_directory("dir/")
///     .build();
/// assert!(zip_data.starts_with(b"PK"));
/// ```
pub struct ZipTestBuilder {
    zip: zip::ZipWriter<Cursor<Vec<u8>>>,
}

impl ZipTestBuilder {
    /// Creates a new ZIP test builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            zip: zip::ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    /// Adds a stored (uncompressed) regular file.
    #[must_use]
    pub fn add_file(self, path: &str, data: &[u8]) -> Self {
        self.add_file_with_mode(path, data, 0o644)
    }

    /// Adds a stored regular file with custom mode.
    #[must_use]
    pub fn add_file_with_mode(mut self, path: &str, data: &[u8], mode: u32) -> Self {
        use zip::write::SimpleFileOptions;

        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .unix_permissions(mode);

        self.zip.start_file(path, options).unwrap();
        self.zip.write_all(data).unwrap();
        self
    }

    /// Adds a deflate-compressed regular file.
    #[must_use]
    pub fn add_file_deflated(mut self, path: &str, data: &[u8]) -> Self {
        use zip::write::SimpleFileOptions;

        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(0o644);

        self.zip.start_file(path, options).unwrap();
        self.zip.write_all(data).unwrap();
        self
    }

    /// Adds a directory to the archive.
    #[must_use]
    pub fn add_directory(mut self, path: &str) -> Self {
        use zip::write::SimpleFileOptions;

        let options = SimpleFileOptions::default().unix_permissions(0o755);
        self.zip.add_directory(path, options).unwrap();
        self
    }

    /// Adds a symlink; zip stores the target as the entry's contents.
    #[must_use]
    pub fn add_symlink(mut self, path: &str, target: &str) -> Self {
        use zip::write::SimpleFileOptions;

        let options = SimpleFileOptions::default().unix_permissions(0o777);
        self.zip.add_symlink(path, target, options).unwrap();
        self
    }

    /// Builds and returns the ZIP archive data.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.zip.finish().unwrap().into_inner()
    }
}

impl Default for ZipTestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Compresses `data` as a single stream with `codec`.
///
/// # Examples
///
/// ```
/// use arcsafe_core::formats::compression::CompressionCodec;
/// use arcsafe_core::test_utils::compress;
///
/// let gz = compress(b"hello", CompressionCodec::Gzip);
/// assert_eq!(&gz[..2], &[0x1f, 0x8b]);
/// ```
#[must_use]
pub fn compress(data: &[u8], codec: CompressionCodec) -> Vec<u8> {
    match codec {
        CompressionCodec::Gzip => {
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::best());
            encoder.write_all(data).unwrap();
            encoder.finish().unwrap()
        }
        CompressionCodec::Bzip2 => {
            let mut encoder =
                bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::best());
            encoder.write_all(data).unwrap();
            encoder.finish().unwrap()
        }
        CompressionCodec::Xz => {
            let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
            encoder.write_all(data).unwrap();
            encoder.finish().unwrap()
        }
        CompressionCodec::Zstd => zstd::encode_all(data, 19).unwrap(),
    }
}

/// Writes `data` to `dir/name` and returns the path.
pub fn write_archive(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

/// Size of an end-of-central-directory record without comment.
const ZIP_EOCD_LEN: usize = 22;

/// Builds a zip whose central directory lists `members` entries named
/// `m0000.bin`, `m0001.bin`, ... that all point at one stored `payload`.
///
/// Every member declares the payload's size as its compressed size, so the
/// declared compressed sizes add up to `members` times the payload.
///
/// # Examples
///
/// ```
/// use arcsafe_core::test_utils::overlapping_zip;
///
/// let data = overlapping_zip(&[1u8; 1000], 50);
/// assert!(data.len() < 50 * 1000);
/// ```
#[must_use]
pub fn overlapping_zip(payload: &[u8], members: u16) -> Vec<u8> {
    let mut data = ZipTestBuilder::new().add_file("m0000.bin", payload).build();
    let eocd = data.len() - ZIP_EOCD_LEN;
    assert_eq!(&data[eocd..eocd + 4], b"PK\x05\x06");
    let cd_start = read_u32(&data, eocd + 16) as usize;
    let record = data[cd_start..eocd].to_vec();

    let mut directory = Vec::with_capacity(record.len() * usize::from(members));
    for index in 0..members {
        let mut copy = record.clone();
        copy[46..55].copy_from_slice(format!("m{index:04}.bin").as_bytes());
        directory.extend_from_slice(&copy);
    }

    let mut end = data[eocd..].to_vec();
    end[8..10].copy_from_slice(&members.to_le_bytes());
    end[10..12].copy_from_slice(&members.to_le_bytes());
    end[12..16].copy_from_slice(&u32::try_from(directory.len()).unwrap().to_le_bytes());

    data.truncate(cd_start);
    data.extend_from_slice(&directory);
    data.extend_from_slice(&end);
    data
}

/// Builds a single-member zip whose member is LZMA-compressed (method 14).
///
/// The member is written stored first, then its contents and header fields
/// are swapped for the LZMA form.
#[must_use]
pub fn lzma_zip(name: &str, data: &[u8]) -> Vec<u8> {
    let options = xz2::stream::LzmaOptions::new_preset(6).unwrap();
    let stream = xz2::stream::Stream::new_lzma_encoder(&options).unwrap();
    let mut encoder = xz2::write::XzEncoder::new_stream(Vec::new(), stream);
    encoder.write_all(data).unwrap();
    let alone = encoder.finish().unwrap();

    // LZMA-alone carries 5 property bytes and an 8-byte size; zip wants a
    // version, the property length and the properties.
    let mut member = vec![0x10, 0x02, 0x05, 0x00];
    member.extend_from_slice(&alone[..5]);
    member.extend_from_slice(&alone[13..]);

    let mut crc = flate2::Crc::new();
    crc.update(data);
    let crc = crc.sum();
    let size = u32::try_from(data.len()).unwrap();

    let mut archive = ZipTestBuilder::new().add_file(name, &member).build();
    let eocd = archive.len() - ZIP_EOCD_LEN;
    let cd_start = read_u32(&archive, eocd + 16) as usize;

    // Local header, then the central directory record. Both lay out method,
    // CRC and uncompressed size at the same distance from the flags field.
    // Flag bit 1 marks the end-of-stream marker the encoder wrote.
    for flags_at in [6, cd_start + 8] {
        let flags = u16::from_le_bytes([archive[flags_at], archive[flags_at + 1]]) | 0x0002;
        archive[flags_at..flags_at + 2].copy_from_slice(&flags.to_le_bytes());
        archive[flags_at + 2..flags_at + 4].copy_from_slice(&14u16.to_le_bytes());
        archive[flags_at + 8..flags_at + 12].copy_from_slice(&crc.to_le_bytes());
        archive[flags_at + 16..flags_at + 20].copy_from_slice(&size.to_le_bytes());
    }
    archive
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}
