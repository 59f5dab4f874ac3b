//! Core extraction engine.
//!
//! [`ExtractionEngine`] is the drive loop shared by validation and
//! extraction. It pulls entries from an [`ArchiveFormat`], runs each through
//! the [`EntryValidator`], streams file contents under quota control, and
//! hands the result to an [`EntrySink`]. Validation uses [`DiscardSink`];
//! extraction uses [`DiskSink`].
//!
//! One engine performs exactly one walk:
//!
//! ```text
//! OPENED -> WALKING -> SUCCEEDED
//!                   \-> FAILED (sink rolled back)
//! ```

use std::fs;
use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::PathBuf;

use crate::ExtractionError;
use crate::Result;
use crate::copy::CopyBuffer;
use crate::extraction::atomic::ExtractionJournal;
use crate::extraction::atomic::TempFileGuard;
use crate::extraction::atomic::temp_path_for;
use crate::extraction::stream::stream_entry;
use crate::formats::ArchiveFormat;
use crate::formats::EntryVisitor;
use crate::security::EntryValidator;
use crate::security::RunningTotals;
use crate::security::ValidatedEntryType;
use crate::types::DestDir;
use crate::types::EntryDescriptor;
use crate::types::SafePath;
use crate::types::SafeSymlink;

/// Where validated entries end up.
pub trait EntrySink {
    /// Writer a file's contents are streamed into before it is published.
    type Staged: Write;

    /// Prepares to receive the contents of the file at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the staging area cannot be created.
    fn stage_file(&mut self, target: &SafePath) -> Result<Self::Staged>;

    /// Moves a fully streamed and accepted file into place.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be finalized.
    fn publish_file(
        &mut self,
        target: &SafePath,
        mode: Option<u32>,
        staged: Self::Staged,
    ) -> Result<()>;

    /// Materializes a directory entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    fn create_directory(&mut self, target: &SafePath, mode: Option<u32>) -> Result<()>;

    /// Materializes a validated symlink.
    ///
    /// # Errors
    ///
    /// Returns an error if the link cannot be created.
    fn create_symlink(&mut self, link: &SafeSymlink) -> Result<()>;

    /// Called once after every entry has been accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if deferred work fails.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    /// Undoes everything done so far.
    ///
    /// # Errors
    ///
    /// Returns the first cleanup failure.
    fn rollback(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink that materializes nothing; file contents are read and dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl EntrySink for DiscardSink {
    type Staged = io::Sink;

    fn stage_file(&mut self, _target: &SafePath) -> Result<Self::Staged> {
        Ok(io::sink())
    }

    fn publish_file(&mut self, _: &SafePath, _: Option<u32>, _: Self::Staged) -> Result<()> {
        Ok(())
    }

    fn create_directory(&mut self, _: &SafePath, _: Option<u32>) -> Result<()> {
        Ok(())
    }

    fn create_symlink(&mut self, _: &SafeSymlink) -> Result<()> {
        Ok(())
    }
}

/// A file being written to its temporary staging path.
#[derive(Debug)]
pub struct StagedFile {
    writer: BufWriter<File>,
    guard: TempFileGuard,
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Sink that writes entries under a destination directory.
///
/// Every object it creates is journaled and removed again on rollback.
/// Directory permissions are applied in [`finish`](EntrySink::finish),
/// deepest first, so a read-only directory does not block its own
/// children.
#[derive(Debug)]
pub struct DiskSink {
    dest: DestDir,
    journal: ExtractionJournal,
    dir_modes: Vec<(PathBuf, u32)>,
}

impl DiskSink {
    /// Creates a sink writing under `dest`, continuing `journal`.
    #[must_use]
    pub fn new(dest: DestDir, journal: ExtractionJournal) -> Self {
        Self {
            dest,
            journal,
            dir_modes: Vec::new(),
        }
    }

    /// The destination root.
    #[must_use]
    pub const fn dest(&self) -> &DestDir {
        &self.dest
    }

    fn ensure_parent(&mut self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.journal.create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl EntrySink for DiskSink {
    type Staged = StagedFile;

    fn stage_file(&mut self, target: &SafePath) -> Result<StagedFile> {
        let final_path = self.dest.join(target);
        self.ensure_parent(&final_path)?;

        let temp_path = temp_path_for(&final_path);
        let file = File::create_new(&temp_path)?;
        Ok(StagedFile {
            writer: BufWriter::with_capacity(64 * 1024, file),
            guard: TempFileGuard::new(temp_path),
        })
    }

    fn publish_file(
        &mut self,
        target: &SafePath,
        mode: Option<u32>,
        staged: StagedFile,
    ) -> Result<()> {
        let StagedFile { writer, guard } = staged;
        let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;

        #[cfg(unix)]
        if let Some(mode) = mode {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(mode))?;
        }
        #[cfg(not(unix))]
        let _ = mode;
        drop(file);

        let final_path = self.dest.join(target);
        let existed = fs::symlink_metadata(&final_path).is_ok();
        fs::rename(guard.path(), &final_path)?;
        guard.persist();
        if !existed {
            self.journal.record_file(final_path);
        }
        Ok(())
    }

    fn create_directory(&mut self, target: &SafePath, mode: Option<u32>) -> Result<()> {
        let path = self.dest.join(target);
        let created = self.journal.create_dir_all(&path)?;
        // Pre-existing directories, the root included, keep their permissions.
        if created && let Some(mode) = mode {
            self.dir_modes.push((path, mode));
        }
        Ok(())
    }

    fn create_symlink(&mut self, link: &SafeSymlink) -> Result<()> {
        let path = self.dest.join(link.link());
        self.ensure_parent(&path)?;

        // Only reachable with overwriting allowed; directories never get here.
        if let Ok(meta) = fs::symlink_metadata(&path)
            && !meta.is_dir()
        {
            fs::remove_file(&path)?;
        }

        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(link.target(), &path)?;
            self.journal.record_symlink(path);
            Ok(())
        }

        #[cfg(not(unix))]
        {
            Err(ExtractionError::UnsupportedEntryType {
                path: link.link().as_path().to_path_buf(),
                kind: "symlink".into(),
            })
        }
    }

    fn finish(&mut self) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            self.dir_modes
                .sort_by_key(|(path, _)| std::cmp::Reverse(path.components().count()));
            for (path, mode) in self.dir_modes.drain(..) {
                fs::set_permissions(&path, fs::Permissions::from_mode(mode))?;
            }
        }
        self.journal.commit();
        Ok(())
    }

    fn rollback(&mut self) -> io::Result<()> {
        self.dir_modes.clear();
        self.journal.rollback()
    }
}

/// Walk lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Archive open, nothing read yet.
    Opened,
    /// Entries are being processed.
    Walking,
    /// Every entry was accepted and materialized.
    Succeeded,
    /// The walk stopped on an error; the sink has been rolled back.
    Failed,
}

/// What a successful walk saw and produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Totals of all accepted entries.
    pub totals: RunningTotals,
    /// Compressed bytes the ratio was computed against.
    pub compressed_basis: u64,
    /// Regular files.
    pub files: usize,
    /// Directory entries.
    pub directories: usize,
    /// Symlinks.
    pub symlinks: usize,
    /// File content bytes streamed into the sink.
    pub bytes_written: u64,
}

/// Drives one archive walk.
///
/// # Examples
///
/// ```
/// use arcsafe_core::{ExtractOptions, ThresholdConfig};
/// use arcsafe_core::extraction::{DiscardSink, EngineState, ExtractionEngine};
/// use arcsafe_core::formats::TarArchive;
/// use arcsafe_core::security::{EntryValidator, PathResolver, ThresholdEnforcer};
/// use arcsafe_core::formats::ArchiveFormat;
/// use arcsafe_core::test_utils::TarTestBuilder;
/// use std::io::Cursor;
///
/// let data = TarTestBuilder::new().add_file("a.txt", b"hello").build();
/// let size = data.len() as u64;
/// let mut archive = TarArchive::from_reader(Box::new(Cursor::new(data)), size, None);
///
/// let validator = EntryValidator::new(
///     PathResolver::new(None),
///     ThresholdEnforcer::new(ThresholdConfig::unlimited(), archive.ratio_basis()),
///     &ExtractOptions::default(),
/// );
/// let mut engine = ExtractionEngine::new(validator, DiscardSink);
/// let summary = engine.run(&mut archive)?;
/// assert_eq!(summary.files, 1);
/// assert_eq!(engine.state(), EngineState::Succeeded);
/// # Ok::<(), arcsafe_core::ExtractionError>(())
/// ```
#[derive(Debug)]
pub struct ExtractionEngine<S: EntrySink> {
    validator: Option<EntryValidator>,
    sink: S,
    state: EngineState,
}

impl<S: EntrySink> ExtractionEngine<S> {
    /// Creates an engine in the [`EngineState::Opened`] state.
    #[must_use]
    pub const fn new(validator: EntryValidator, sink: S) -> Self {
        Self {
            validator: Some(validator),
            sink,
            state: EngineState::Opened,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Consumes the engine, returning its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Walks `archive` to completion or to the first error.
    ///
    /// On error the sink is rolled back before returning. If the rollback
    /// itself fails, the original error is returned wrapped in
    /// `RollbackFailed`.
    ///
    /// # Errors
    ///
    /// Any validation, quota, format or I/O error. Calling `run` a second
    /// time fails without touching the archive.
    pub fn run(&mut self, archive: &mut dyn ArchiveFormat) -> Result<WalkSummary> {
        let Some(validator) = self.validator.take() else {
            return Err(ExtractionError::Io(io::Error::other(format!(
                "extraction engine cannot run from state {:?}",
                self.state
            ))));
        };
        self.transition(EngineState::Walking);

        match walk(validator, &mut self.sink, archive) {
            Ok(summary) => {
                self.transition(EngineState::Succeeded);
                Ok(summary)
            }
            Err(err) => {
                self.transition(EngineState::Failed);
                tracing::warn!(error = %err, "archive rejected, rolling back");
                match self.sink.rollback() {
                    Ok(()) => Err(err),
                    Err(cleanup) => {
                        tracing::warn!(error = %cleanup, "rollback incomplete");
                        Err(ExtractionError::RollbackFailed {
                            source: Box::new(err),
                            cleanup,
                        })
                    }
                }
            }
        }
    }

    fn transition(&mut self, next: EngineState) {
        tracing::trace!(from = ?self.state, to = ?next, "engine state");
        self.state = next;
    }
}

fn walk<S: EntrySink>(
    mut validator: EntryValidator,
    sink: &mut S,
    archive: &mut dyn ArchiveFormat,
) -> Result<WalkSummary> {
    let mut buffer = CopyBuffer::new();
    let mut walker = Walker {
        validator: &mut validator,
        sink: &mut *sink,
        buffer: &mut buffer,
        summary: WalkSummary::default(),
    };
    archive.walk(&mut walker)?;
    let mut summary = walker.summary;

    summary.compressed_basis = validator.compressed_basis();
    summary.totals = validator.finish()?;
    sink.finish()?;
    Ok(summary)
}

struct Walker<'a, S: EntrySink> {
    validator: &'a mut EntryValidator,
    sink: &'a mut S,
    buffer: &'a mut CopyBuffer,
    summary: WalkSummary,
}

impl<S: EntrySink> EntryVisitor for Walker<'_, S> {
    fn screen(&mut self, entry: &EntryDescriptor) -> Result<()> {
        self.validator.screen(entry)
    }

    fn visit(&mut self, entry: &EntryDescriptor, contents: &mut dyn Read) -> Result<()> {
        let validated = self.validator.validate_entry(entry)?;
        tracing::debug!(
            name = %entry.name,
            path = %validated.safe_path.as_path().display(),
            kind = entry.kind.label(),
            declared = entry.uncompressed_size,
            compressed = ?entry.compressed_size,
            "entry accepted for processing"
        );

        let target = validated.safe_path.clone();
        let mode = validated.mode;

        match validated.entry_type.clone() {
            ValidatedEntryType::File => {
                let mut staged = self.sink.stage_file(&target)?;
                let written = stream_entry(
                    contents,
                    &mut staged,
                    self.validator,
                    &validated,
                    self.buffer,
                )?;
                self.validator.commit(validated, written)?;
                self.sink.publish_file(&target, mode, staged)?;

                self.summary.files += 1;
                self.summary.bytes_written = self
                    .summary
                    .bytes_written
                    .checked_add(written)
                    .ok_or(ExtractionError::QuotaExceeded {
                        resource: crate::QuotaResource::IntegerOverflow,
                    })?;
            }
            ValidatedEntryType::Directory => {
                self.validator.commit(validated, 0)?;
                self.sink.create_directory(&target, mode)?;
                self.summary.directories += 1;
            }
            ValidatedEntryType::Symlink(link) => {
                // The reader already consumed the target; count what it declared.
                let declared = validated.declared_size();
                self.validator.commit(validated, declared)?;
                self.sink.create_symlink(&link)?;
                self.summary.symlinks += 1;
            }
        }
        Ok(())
    }
}
