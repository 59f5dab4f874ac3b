//! Streaming entry contents under quota control.

use std::io::Read;
use std::io::Write;

use crate::Result;
use crate::copy::CopyBuffer;
use crate::copy::copy_with_buffer;
use crate::security::EntryValidator;
use crate::security::ValidatedEntry;

/// Copies an entry's decompressed bytes into `writer`.
///
/// Limits are re-checked against the bytes actually produced after every
/// chunk, before that chunk is written. A bomb is therefore stopped while
/// it is still inflating, however large it claims to be.
///
/// # Errors
///
/// - `SizeMismatch` if the entry produces more than it declared
/// - `QuotaExceeded` as soon as a limit is crossed
/// - `InvalidArchive` for corrupt compressed data, `Io` for write failures
pub fn stream_entry<W: Write + ?Sized>(
    contents: &mut dyn Read,
    writer: &mut W,
    validator: &EntryValidator,
    entry: &ValidatedEntry,
    buffer: &mut CopyBuffer,
) -> Result<u64> {
    copy_with_buffer(contents, writer, buffer, |produced| {
        tracing::trace!(path = %entry.safe_path.as_path().display(), produced, "entry progress");
        validator.check_progress(entry, produced)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::ExtractOptions;
    use crate::ThresholdConfig;
    use crate::security::PathResolver;
    use crate::security::RatioBasis;
    use crate::security::ThresholdEnforcer;
    use crate::types::EntryDescriptor;

    fn validator(config: ThresholdConfig) -> EntryValidator {
        EntryValidator::new(
            PathResolver::new(None),
            ThresholdEnforcer::new(config, RatioBasis::Container(1024)),
            &ExtractOptions::default(),
        )
    }

    /// Endless stream of zeros.
    struct Zeros;

    impl Read for Zeros {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            buf.fill(0);
            Ok(buf.len())
        }
    }

    #[test]
    fn test_stream_within_limits() {
        let validator = validator(ThresholdConfig::unlimited());
        let entry = validator
            .validate_entry(&EntryDescriptor::file("f", 5))
            .unwrap();
        let mut out = Vec::new();
        let written = stream_entry(
            &mut &b"hello"[..],
            &mut out,
            &validator,
            &entry,
            &mut CopyBuffer::new(),
        )
        .unwrap();
        assert_eq!(written, 5);
        assert_eq!(out, b"hello");
    }

    #[test]
    fn test_lying_entry_stopped_mid_stream() {
        let validator = validator(ThresholdConfig::unlimited());
        let entry = validator
            .validate_entry(&EntryDescriptor::file("liar", 10))
            .unwrap();
        let mut out = Vec::new();
        let mut buffer = CopyBuffer::new();
        let err = stream_entry(&mut Zeros, &mut out, &validator, &entry, &mut buffer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SizeExceeded);
        // The offending chunk never reached the writer.
        assert!(out.is_empty());
    }

    #[test]
    fn test_ratio_stopped_before_full_inflation() {
        let validator = validator(ThresholdConfig::unlimited().with_max_ratio(Some(100.0)));
        // Declared small enough to pass admission, so only progress checks
        // can catch it.
        let entry = validator
            .validate_entry(&EntryDescriptor::file("bomb", 100 * 1024))
            .unwrap();
        let mut written = 0u64;
        let mut sink = std::io::sink();
        let result = stream_entry(
            &mut Zeros.take(1 << 30),
            &mut CountingWriter(&mut sink, &mut written),
            &validator,
            &entry,
            &mut CopyBuffer::new(),
        );
        assert!(result.is_err());
        assert!(written <= 100 * 1024);
    }

    struct CountingWriter<'a, W>(&'a mut W, &'a mut u64);

    impl<W: std::io::Write> std::io::Write for CountingWriter<'_, W> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let n = self.0.write(buf)?;
            *self.1 += n as u64;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.0.flush()
        }
    }
}
