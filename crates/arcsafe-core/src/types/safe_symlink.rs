//! Validated symlink type.

use std::path::Path;
use std::path::PathBuf;

use super::SafePath;

/// A symlink whose location and target have both been checked.
///
/// The target is kept exactly as stored in the archive; it is never
/// rewritten. Construction goes through
/// [`validate_symlink`](crate::security::validate_symlink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeSymlink {
    link: SafePath,
    target: PathBuf,
}

impl SafeSymlink {
    pub(crate) fn new(link: SafePath, target: PathBuf) -> Self {
        Self { link, target }
    }

    /// Where the link itself is created, relative to the root.
    #[inline]
    #[must_use]
    pub fn link(&self) -> &SafePath {
        &self.link
    }

    /// The raw target the link points at.
    #[inline]
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }
}
