//! Validated entry path relative to the extraction root.

use crate::ExtractionError;
use crate::Result;
use std::path::Path;
use std::path::PathBuf;

/// A root-relative path that has passed the path safety checks.
///
/// `SafePath` contains only normal components: no `..`, no `.`, no root or
/// drive prefix, and every component except possibly the last has been
/// followed through any symlinks that exist on disk or earlier in the
/// archive. The empty path denotes the root itself.
///
/// There is no `From<PathBuf>`; instances come from
/// [`PathResolver::resolve`](crate::security::PathResolver::resolve).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SafePath(PathBuf);

impl SafePath {
    /// Lexically normalizes a raw archive entry name.
    ///
    /// Both `/` and `\` are treated as separators. Rejects names that are
    /// empty, contain a NUL byte, are absolute (leading separator or a
    /// `C:`-style drive), or contain a `..` component anywhere. `.` and
    /// empty components are dropped, so `./a//b/` becomes `a/b`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEntryName` for empty or NUL-containing names and
    /// `PathTraversal` for absolute or `..`-containing ones.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcsafe_core::types::SafePath;
    /// use std::path::PathBuf;
    ///
    /// assert_eq!(SafePath::normalize("./docs//a.txt").unwrap(), PathBuf::from("docs/a.txt"));
    /// assert!(SafePath::normalize("docs/../../etc/passwd").is_err());
    /// assert!(SafePath::normalize("/etc/passwd").is_err());
    /// ```
    pub fn normalize(raw_name: &str) -> Result<PathBuf> {
        if raw_name.is_empty() {
            return Err(ExtractionError::InvalidEntryName {
                name: raw_name.to_string(),
                reason: "empty name",
            });
        }

        if raw_name.contains('\0') {
            return Err(ExtractionError::InvalidEntryName {
                name: raw_name.to_string(),
                reason: "name contains a NUL byte",
            });
        }

        if is_absolute_name(raw_name) {
            return Err(ExtractionError::PathTraversal {
                path: PathBuf::from(raw_name),
            });
        }

        let mut normalized = PathBuf::new();
        for component in raw_name.split(['/', '\\']) {
            match component {
                "" | "." => {}
                ".." => {
                    return Err(ExtractionError::PathTraversal {
                        path: PathBuf::from(raw_name),
                    });
                }
                name => normalized.push(name),
            }
        }

        Ok(normalized)
    }

    pub(crate) fn from_resolved(path: PathBuf) -> Self {
        Self(path)
    }

    /// Returns the root-relative path.
    #[inline]
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Returns `true` if this path denotes the extraction root itself.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.as_os_str().is_empty()
    }

    /// Converts into the inner `PathBuf`.
    #[inline]
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

fn is_absolute_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    let drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    name.starts_with(['/', '\\']) || drive
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plain() {
        assert_eq!(SafePath::normalize("a/b.txt").unwrap(), PathBuf::from("a/b.txt"));
    }

    #[test]
    fn test_normalize_strips_dots_and_empty_components() {
        assert_eq!(
            SafePath::normalize("./a/./b//c/").unwrap(),
            PathBuf::from("a/b/c")
        );
    }

    #[test]
    fn test_normalize_backslash_separator() {
        assert_eq!(SafePath::normalize("a\\b.txt").unwrap(), PathBuf::from("a/b.txt"));
    }

    #[test]
    fn test_normalize_root_only() {
        assert_eq!(SafePath::normalize("./").unwrap(), PathBuf::new());
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(
            SafePath::normalize(""),
            Err(ExtractionError::InvalidEntryName { .. })
        ));
    }

    #[test]
    fn test_nul_rejected() {
        assert!(matches!(
            SafePath::normalize("file\0.txt"),
            Err(ExtractionError::InvalidEntryName { .. })
        ));
    }

    #[test]
    fn test_parent_component_anywhere_rejected() {
        for name in ["../x", "a/../b", "a/b/..", "a\\..\\b", ".."] {
            assert!(
                matches!(
                    SafePath::normalize(name),
                    Err(ExtractionError::PathTraversal { .. })
                ),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_absolute_rejected() {
        for name in ["/etc/passwd", "\\windows\\system32", "C:\\evil", "c:evil"] {
            assert!(
                matches!(
                    SafePath::normalize(name),
                    Err(ExtractionError::PathTraversal { .. })
                ),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_dotted_names_are_not_parent() {
        assert_eq!(
            SafePath::normalize("..hidden/...").unwrap(),
            PathBuf::from("..hidden/...")
        );
    }

    #[test]
    fn test_is_root() {
        assert!(SafePath::from_resolved(PathBuf::new()).is_root());
        assert!(!SafePath::from_resolved(PathBuf::from("a")).is_root());
    }
}
