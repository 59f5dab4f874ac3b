//! All-or-nothing extraction support.
//!
//! Files are staged under a hidden temporary name and renamed into place
//! only once they have been fully checked. Everything an extraction creates
//! is written to an [`ExtractionJournal`], which removes it again if the
//! call fails.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

// Atomic counter for generating unique temporary file names
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Returns a unique hidden sibling of `final_path` to stage its contents in.
#[must_use]
pub fn temp_path_for(final_path: &Path) -> PathBuf {
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = process::id();
    let original_name = final_path
        .file_name()
        .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().to_string());
    final_path.with_file_name(format!(".{original_name}.arcsafe-tmp-{pid}-{counter}"))
}

/// RAII guard for temporary files.
/// Ensures temp files are cleaned up on error.
#[derive(Debug)]
pub struct TempFileGuard {
    path: PathBuf,
    should_cleanup: bool,
}

impl TempFileGuard {
    /// Takes ownership of the temporary file at `path`.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self {
            path,
            should_cleanup: true,
        }
    }

    /// Path of the guarded file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mark the temp file as successfully processed.
    /// Prevents cleanup on drop.
    pub fn persist(mut self) {
        self.should_cleanup = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.should_cleanup {
            let _ = fs::remove_file(&self.path);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Created {
    File(PathBuf),
    Directory(PathBuf),
    Symlink(PathBuf),
}

/// Record of every filesystem object one extraction created.
///
/// Objects that already existed are never recorded, so a rollback only ever
/// removes what this call added. Dropping an uncommitted journal rolls it
/// back.
#[derive(Debug, Default)]
pub struct ExtractionJournal {
    created: Vec<Created>,
    committed: bool,
}

impl ExtractionJournal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.created.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }

    /// Creates `path` and any missing ancestors, recording each directory
    /// that did not exist before.
    ///
    /// Returns `true` if `path` itself was created.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created, or if a component
    /// exists but is not a directory.
    pub fn create_dir_all(&mut self, path: &Path) -> io::Result<bool> {
        let mut missing = Vec::new();
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            match fs::symlink_metadata(ancestor) {
                Ok(meta) if meta.is_dir() => break,
                Ok(meta) if meta.file_type().is_symlink() && ancestor.is_dir() => break,
                Ok(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("{} exists and is not a directory", ancestor.display()),
                    ));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => missing.push(ancestor),
                Err(e) => return Err(e),
            }
        }

        let created_target = !missing.is_empty();
        for dir in missing.into_iter().rev() {
            match fs::create_dir(dir) {
                Ok(()) => self.created.push(Created::Directory(dir.to_path_buf())),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(created_target)
    }

    /// Records a file this call created.
    pub fn record_file(&mut self, path: PathBuf) {
        self.created.push(Created::File(path));
    }

    /// Records a symlink this call created.
    pub fn record_symlink(&mut self, path: PathBuf) {
        self.created.push(Created::Symlink(path));
    }

    /// Keeps everything; the journal will no longer roll back.
    pub fn commit(&mut self) {
        self.committed = true;
        self.created.clear();
    }

    /// Removes every recorded object, newest first.
    ///
    /// Cleanup is best-effort: every object is attempted even after a
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns the first error hit while removing.
    pub fn rollback(&mut self) -> io::Result<()> {
        let mut first_error = None;
        let mut removed = 0usize;

        while let Some(entry) = self.created.pop() {
            let result = match &entry {
                Created::File(path) | Created::Symlink(path) => fs::remove_file(path),
                Created::Directory(path) => fs::remove_dir(path),
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(object = ?entry, error = %e, "rollback could not remove object");
                    first_error.get_or_insert(e);
                }
            }
        }

        self.committed = true;
        tracing::debug!(removed, "rollback finished");
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for ExtractionJournal {
    fn drop(&mut self) {
        if !self.committed && !self.created.is_empty() {
            tracing::warn!(
                objects = self.created.len(),
                "uncommitted extraction dropped, rolling back"
            );
            let _ = self.rollback();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        let temp = temp_path_for(Path::new("/dest/dir/file.txt"));
        assert_eq!(temp.parent(), Some(Path::new("/dest/dir")));
        let name = temp.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(".file.txt.arcsafe-tmp-"));
        assert_ne!(temp, temp_path_for(Path::new("/dest/dir/file.txt")));
    }

    #[test]
    fn test_temp_guard_cleans_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("staged");
        fs::write(&path, b"x").unwrap();
        drop(TempFileGuard::new(path.clone()));
        assert!(!path.exists());

        fs::write(&path, b"x").unwrap();
        TempFileGuard::new(path.clone()).persist();
        assert!(path.exists());
    }

    #[test]
    fn test_create_dir_all_records_only_new_dirs() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("existing")).unwrap();

        let mut journal = ExtractionJournal::new();
        let target = dir.path().join("existing/a/b");
        assert!(journal.create_dir_all(&target).unwrap());
        assert_eq!(journal.len(), 2);
        assert!(!journal.create_dir_all(&target).unwrap());
        assert_eq!(journal.len(), 2);

        journal.rollback().unwrap();
        assert!(!dir.path().join("existing/a").exists());
        assert!(dir.path().join("existing").exists());
    }

    #[test]
    fn test_create_dir_all_through_file_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("file"), b"x").unwrap();
        let mut journal = ExtractionJournal::new();
        assert!(journal.create_dir_all(&dir.path().join("file/sub")).is_err());
        assert!(journal.is_empty());
    }

    #[test]
    fn test_rollback_removes_newest_first() {
        let dir = TempDir::new().unwrap();
        let mut journal = ExtractionJournal::new();
        let sub = dir.path().join("sub");
        journal.create_dir_all(&sub).unwrap();
        let file = sub.join("f.txt");
        fs::write(&file, b"data").unwrap();
        journal.record_file(file.clone());

        journal.rollback().unwrap();
        assert!(!file.exists());
        assert!(!sub.exists());
    }

    #[test]
    fn test_rollback_leaves_unrecorded_files() {
        let dir = TempDir::new().unwrap();
        let mut journal = ExtractionJournal::new();
        let sub = dir.path().join("sub");
        journal.create_dir_all(&sub).unwrap();
        fs::write(sub.join("foreign"), b"not ours").unwrap();

        assert!(journal.rollback().is_err());
        assert!(sub.join("foreign").exists());
    }

    #[test]
    fn test_drop_rolls_back_unless_committed() {
        let dir = TempDir::new().unwrap();
        {
            let mut journal = ExtractionJournal::new();
            journal.create_dir_all(&dir.path().join("dropped")).unwrap();
        }
        assert!(!dir.path().join("dropped").exists());

        {
            let mut journal = ExtractionJournal::new();
            journal.create_dir_all(&dir.path().join("kept")).unwrap();
            journal.commit();
        }
        assert!(dir.path().join("kept").exists());
    }
}
