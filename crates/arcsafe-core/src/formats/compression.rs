//! Compression codecs wrapping tar streams.
//!
//! # Supported Codecs
//!
//! - **Gzip** (.tar.gz, .tgz)
//! - **Bzip2** (.tar.bz2, .tbz2)
//! - **Xz** (.tar.xz, .txz)
//! - **Zstd** (.tar.zst, .tzst)
//!
//! Codecs are recognized by their magic bytes, never by file extension.

use std::io::Read;

use crate::ExtractionError;
use crate::Result;

/// Compression codec applied to a whole tar stream.
///
/// # Examples
///
/// ```
/// use arcsafe_core::formats::compression::CompressionCodec;
///
/// assert_eq!(
///     CompressionCodec::from_magic(&[0x1f, 0x8b, 0x08, 0x00]),
///     Some(CompressionCodec::Gzip)
/// );
/// assert_eq!(CompressionCodec::from_magic(b"plain text"), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionCodec {
    /// Gzip (deflate). Concatenated members are decoded as one stream.
    Gzip,

    /// Bzip2. Concatenated streams are decoded as one stream.
    Bzip2,

    /// Xz (LZMA2).
    Xz,

    /// Zstandard.
    Zstd,
}

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const BZIP2_MAGIC: &[u8] = b"BZh";
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];

impl CompressionCodec {
    /// Recognizes a codec from the first bytes of a file.
    #[must_use]
    pub fn from_magic(header: &[u8]) -> Option<Self> {
        [
            (GZIP_MAGIC, Self::Gzip),
            (BZIP2_MAGIC, Self::Bzip2),
            (XZ_MAGIC, Self::Xz),
            (ZSTD_MAGIC, Self::Zstd),
        ]
        .into_iter()
        .find_map(|(magic, codec)| header.starts_with(magic).then_some(codec))
    }

    /// Returns a human-readable name for this codec.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcsafe_core::formats::compression::CompressionCodec;
    ///
    /// assert_eq!(CompressionCodec::Gzip.name(), "gzip");
    /// assert_eq!(CompressionCodec::Zstd.name(), "zstd");
    /// ```
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }

    /// Wraps `reader` in a streaming decoder for this codec.
    ///
    /// Nothing is decompressed until the returned reader is read.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArchive` if the decoder cannot be initialized.
    pub fn decoder<R: Read + 'static>(self, reader: R) -> Result<Box<dyn Read>> {
        Ok(match self {
            Self::Gzip => Box::new(flate2::read::MultiGzDecoder::new(reader)),
            Self::Bzip2 => Box::new(bzip2::read::MultiBzDecoder::new(reader)),
            Self::Xz => Box::new(xz2::read::XzDecoder::new_multi_decoder(reader)),
            Self::Zstd => Box::new(
                zstd::stream::read::Decoder::new(reader).map_err(ExtractionError::from_archive_io)?,
            ),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_magic_detection() {
        assert_eq!(
            CompressionCodec::from_magic(b"BZh91AY&SY"),
            Some(CompressionCodec::Bzip2)
        );
        assert_eq!(
            CompressionCodec::from_magic(&[0xfd, b'7', b'z', b'X', b'Z', 0x00, 0x00]),
            Some(CompressionCodec::Xz)
        );
        assert_eq!(
            CompressionCodec::from_magic(&[0x28, 0xb5, 0x2f, 0xfd, 0x00]),
            Some(CompressionCodec::Zstd)
        );
        assert_eq!(CompressionCodec::from_magic(&[0x1f]), None);
        assert_eq!(CompressionCodec::from_magic(&[]), None);
    }

    #[test]
    fn test_codec_name() {
        assert_eq!(CompressionCodec::Bzip2.name(), "bzip2");
        assert_eq!(CompressionCodec::Xz.name(), "xz");
    }

    #[test]
    fn test_gzip_decoder_roundtrip() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"payload").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut decoder = CompressionCodec::Gzip
            .decoder(std::io::Cursor::new(compressed))
            .unwrap();
        let mut out = String::new();
        decoder.read_to_string(&mut out).unwrap();
        assert_eq!(out, "payload");
    }
}
