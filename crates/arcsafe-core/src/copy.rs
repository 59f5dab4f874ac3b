//! Buffered copy with per-chunk checkpoints.
//!
//! Entry contents are copied through a reusable stack buffer. After each
//! chunk is read, and before it is written, the caller's checkpoint sees the
//! running byte count and may abort. That is how quotas are enforced while an
//! entry is still streaming.

use std::io::Read;
use std::io::Write;
use std::io::{self};

use crate::ExtractionError;
use crate::QuotaResource;
use crate::Result;

/// Buffer size for entry copies (64KB).
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Stack-allocated buffer reused across every entry of one call.
///
/// # Examples
///
/// ```
/// use arcsafe_core::copy::{CopyBuffer, copy_with_buffer};
///
/// let mut buffer = CopyBuffer::new();
/// let mut input: &[u8] = b"hello";
/// let mut output = Vec::new();
/// let copied = copy_with_buffer(&mut input, &mut output, &mut buffer, |_| Ok(())).unwrap();
/// assert_eq!(copied, 5);
/// ```
#[derive(Debug)]
pub struct CopyBuffer {
    #[allow(clippy::large_stack_arrays)]
    buf: [u8; COPY_BUFFER_SIZE],
}

impl CopyBuffer {
    /// Creates a zeroed copy buffer.
    #[inline]
    #[must_use]
    #[allow(clippy::large_stack_arrays)]
    pub fn new() -> Self {
        Self {
            buf: [0u8; COPY_BUFFER_SIZE],
        }
    }

    /// Returns the buffer size in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        COPY_BUFFER_SIZE
    }
}

impl Default for CopyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies `reader` into `writer`, consulting `checkpoint` before each write.
///
/// `checkpoint` receives the total number of bytes read so far, including
/// the chunk about to be written. If it returns an error the chunk is not
/// written and the error is returned, so a limit breach never reaches the
/// writer.
///
/// # Errors
///
/// - whatever `checkpoint` returns
/// - `InvalidArchive` or `Io` if reading fails (corrupt compressed data is
///   reported as an invalid archive)
/// - `Io` if writing fails
/// - `QuotaExceeded` with `IntegerOverflow` if the byte count overflows
#[inline]
pub fn copy_with_buffer<R, W, F>(
    reader: &mut R,
    writer: &mut W,
    buffer: &mut CopyBuffer,
    mut checkpoint: F,
) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    F: FnMut(u64) -> Result<()>,
{
    let mut total: u64 = 0;

    loop {
        let bytes_read = match reader.read(&mut buffer.buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ExtractionError::from_archive_io(e)),
        };

        total = total
            .checked_add(bytes_read as u64)
            .ok_or(ExtractionError::QuotaExceeded {
                resource: QuotaResource::IntegerOverflow,
            })?;
        checkpoint(total)?;

        writer
            .write_all(&buffer.buf[..bytes_read])
            .map_err(ExtractionError::Io)?;
    }

    Ok(total)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_copy_empty_source() {
        let mut buffer = CopyBuffer::new();
        let mut output = Vec::new();
        let mut empty = Cursor::new(Vec::new());
        let copied = copy_with_buffer(&mut empty, &mut output, &mut buffer, |_| Ok(())).unwrap();
        assert_eq!(copied, 0);
        assert!(output.is_empty());
    }

    #[test]
    fn test_copy_spanning_several_chunks() {
        let mut buffer = CopyBuffer::new();
        let input = vec![0x55u8; COPY_BUFFER_SIZE * 3 + 1000];
        let mut output = Vec::new();
        let mut checkpoints = Vec::new();

        let copied = copy_with_buffer(&mut Cursor::new(&input), &mut output, &mut buffer, |n| {
            checkpoints.push(n);
            Ok(())
        })
        .unwrap();

        assert_eq!(copied, input.len() as u64);
        assert_eq!(output, input);
        assert_eq!(checkpoints.last().copied(), Some(input.len() as u64));
        assert!(checkpoints.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_checkpoint_abort_skips_write() {
        let mut buffer = CopyBuffer::new();
        let input = vec![1u8; COPY_BUFFER_SIZE * 4];
        let mut output = Vec::new();

        let result = copy_with_buffer(&mut Cursor::new(&input), &mut output, &mut buffer, |n| {
            if n > COPY_BUFFER_SIZE as u64 {
                Err(ExtractionError::QuotaExceeded {
                    resource: QuotaResource::TotalSize {
                        current: n,
                        max: COPY_BUFFER_SIZE as u64,
                    },
                })
            } else {
                Ok(())
            }
        });

        assert!(matches!(result, Err(ExtractionError::QuotaExceeded { .. })));
        assert!(output.len() <= COPY_BUFFER_SIZE);
    }

    #[test]
    fn test_copy_retries_interrupted_reads() {
        struct Flaky {
            data: Cursor<Vec<u8>>,
            interrupted: bool,
        }

        impl Read for Flaky {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                self.interrupted = !self.interrupted;
                if self.interrupted {
                    return Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"));
                }
                self.data.read(buf)
            }
        }

        let mut reader = Flaky {
            data: Cursor::new(vec![0x42u8; 1000]),
            interrupted: false,
        };
        let mut output = Vec::new();
        let mut buffer = CopyBuffer::new();
        let copied = copy_with_buffer(&mut reader, &mut output, &mut buffer, |_| Ok(())).unwrap();
        assert_eq!(copied, 1000);
        assert_eq!(output, vec![0x42u8; 1000]);
    }

    #[test]
    fn test_corrupt_input_is_invalid_archive() {
        struct Corrupt;

        impl Read for Corrupt {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::InvalidData, "corrupt deflate stream"))
            }
        }

        let result = copy_with_buffer(&mut Corrupt, &mut Vec::new(), &mut CopyBuffer::new(), |_| {
            Ok(())
        });
        assert!(matches!(result, Err(ExtractionError::InvalidArchive(_))));
    }

    #[test]
    fn test_write_failure_is_io() {
        struct Full;

        impl Write for Full {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("disk full"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let result = copy_with_buffer(
            &mut Cursor::new(vec![0u8; 10]),
            &mut Full,
            &mut CopyBuffer::new(),
            |_| Ok(()),
        );
        assert!(matches!(result, Err(ExtractionError::Io(_))));
    }
}
