//! Reader contracts shared by every container format.
//!
//! A reader never decides anything about safety. It turns container
//! metadata into [`EntryDescriptor`]s and hands each one, together with a
//! lazy reader over its contents, to an [`EntryVisitor`]. Nothing is
//! decompressed unless the visitor reads from that stream.

use std::io::Read;

use crate::Result;
use crate::security::RatioBasis;
use crate::types::EntryDescriptor;

/// Receives archive entries one at a time.
pub trait EntryVisitor {
    /// Handles one entry.
    ///
    /// `contents` yields the decompressed bytes of the entry and is only
    /// valid for the duration of the call. Bytes left unread are skipped.
    ///
    /// # Errors
    ///
    /// Returning an error stops the walk immediately; the reader does not
    /// look at any further entry.
    fn visit(&mut self, entry: &EntryDescriptor, contents: &mut dyn Read) -> Result<()>;

    /// Judges an entry from its metadata before the reader decompresses
    /// anything needed to complete its descriptor.
    ///
    /// Zip stores a symlink's target as the member's contents. The reader
    /// calls this with the target still empty, and only reads the target
    /// and calls [`visit`](Self::visit) if it succeeds.
    ///
    /// # Errors
    ///
    /// Returning an error stops the walk before the contents are read.
    fn screen(&mut self, entry: &EntryDescriptor) -> Result<()> {
        let _ = entry;
        Ok(())
    }
}

impl<F> EntryVisitor for F
where
    F: FnMut(&EntryDescriptor, &mut dyn Read) -> Result<()>,
{
    fn visit(&mut self, entry: &EntryDescriptor, contents: &mut dyn Read) -> Result<()> {
        self(entry, contents)
    }
}

/// An opened archive of a known container format.
///
/// The underlying file is owned by the implementor and released when it is
/// dropped, whichever way the walk ended.
pub trait ArchiveFormat {
    /// Feeds every entry to `visitor` in archive order.
    ///
    /// The walk is single-pass: an archive cannot be walked twice.
    ///
    /// # Errors
    ///
    /// Returns the visitor's first error, or `InvalidArchive` if the
    /// container is corrupt.
    fn walk(&mut self, visitor: &mut dyn EntryVisitor) -> Result<u64>;

    /// Returns the archive format name.
    fn format_name(&self) -> &'static str;

    /// What compression ratios are measured against for this archive.
    fn ratio_basis(&self) -> RatioBasis;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct FixedFormat {
        entries: Vec<(EntryDescriptor, Vec<u8>)>,
    }

    impl ArchiveFormat for FixedFormat {
        fn walk(&mut self, visitor: &mut dyn EntryVisitor) -> Result<u64> {
            let mut count = 0;
            for (entry, data) in self.entries.drain(..) {
                visitor.visit(&entry, &mut Cursor::new(data))?;
                count += 1;
            }
            Ok(count)
        }

        fn format_name(&self) -> &'static str {
            "fixed"
        }

        fn ratio_basis(&self) -> RatioBasis {
            RatioBasis::Container(0)
        }
    }

    #[test]
    fn test_closure_visitor() {
        let mut format = FixedFormat {
            entries: vec![
                (EntryDescriptor::file("a", 1), b"a".to_vec()),
                (EntryDescriptor::file("b", 2), b"bb".to_vec()),
            ],
        };
        let mut names = Vec::new();
        let mut visitor = |entry: &EntryDescriptor, contents: &mut dyn Read| -> Result<()> {
            let mut data = Vec::new();
            contents.read_to_end(&mut data)?;
            names.push((entry.name.clone(), data.len()));
            Ok(())
        };
        assert_eq!(format.walk(&mut visitor).unwrap(), 2);
        assert_eq!(names, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
        assert_eq!(format.format_name(), "fixed");
    }

    #[test]
    fn test_visitor_error_stops_walk() {
        let mut format = FixedFormat {
            entries: vec![
                (EntryDescriptor::file("a", 1), Vec::new()),
                (EntryDescriptor::file("b", 1), Vec::new()),
            ],
        };
        let mut seen = 0;
        let mut visitor = |_: &EntryDescriptor, _: &mut dyn Read| -> Result<()> {
            seen += 1;
            Err(crate::ExtractionError::UnsupportedFormat)
        };
        assert!(format.walk(&mut visitor).is_err());
        assert_eq!(seen, 1);
    }
}
