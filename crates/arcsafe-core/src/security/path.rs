//! Path safety checks.
//!
//! [`PathResolver`] maps raw entry names onto root-relative paths the way
//! the operating system would, following symlinks component by component.
//! It sees two layers: whatever already exists under the destination, and
//! an overlay of what earlier entries of the current archive produced (or,
//! when validating, would have produced). Resolution fails the moment it
//! would step above the root, whether through a `..` or a symlink.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use crate::ExtractionError;
use crate::Result;
use crate::types::DestDir;
use crate::types::SafePath;

/// Symlink hops allowed in one resolution, matching Linux `MAXSYMLINKS`.
pub const MAX_SYMLINK_HOPS: usize = 40;

/// What occupies a path in the destination tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Regular file, or anything that is neither a directory nor a symlink.
    File,
    /// Directory.
    Directory,
    /// Symlink with its raw target.
    Symlink(PathBuf),
}

#[derive(Debug)]
pub(crate) enum ResolveError {
    Escape,
    Loop,
    NotADirectory,
    Io(std::io::Error),
}

enum Step {
    Parent,
    Name(OsString),
}

/// Resolves entry names against the destination root and the archive's own
/// earlier entries.
#[derive(Debug)]
pub struct PathResolver {
    root: Option<DestDir>,
    overlay: HashMap<PathBuf, Node>,
}

impl PathResolver {
    /// Creates a resolver.
    ///
    /// With `root = None` nothing on disk is consulted and only the
    /// archive's own entries are taken into account.
    #[must_use]
    pub fn new(root: Option<DestDir>) -> Self {
        Self {
            root,
            overlay: HashMap::new(),
        }
    }

    /// The destination root, if resolving against disk.
    #[must_use]
    pub fn root(&self) -> Option<&DestDir> {
        self.root.as_ref()
    }

    /// Computes the safe target path for a raw entry name.
    ///
    /// The name is normalized with [`SafePath::normalize`], then every
    /// component but the last is resolved through existing symlinks. The last
    /// component is kept literally: an entry replaces a symlink, it never
    /// writes through one.
    ///
    /// # Errors
    ///
    /// - `InvalidEntryName` / `PathTraversal` from normalization
    /// - `PathTraversal` if a symlink component leads outside the root
    /// - `FileExists` if an intermediate component is a file
    /// - `Io` if the destination cannot be inspected
    ///
    /// # Examples
    ///
    /// ```
    /// use arcsafe_core::security::PathResolver;
    ///
    /// let resolver = PathResolver::new(None);
    /// let safe = resolver.resolve("docs/./readme.md").unwrap();
    /// assert_eq!(safe.as_path(), std::path::Path::new("docs/readme.md"));
    /// assert!(resolver.resolve("../../etc/passwd").is_err());
    /// ```
    pub fn resolve(&self, raw_name: &str) -> Result<SafePath> {
        let lexical = SafePath::normalize(raw_name)?;
        let resolved = self
            .walk(Vec::new(), &lexical, false)
            .map_err(|e| match e {
                ResolveError::Escape | ResolveError::Loop => ExtractionError::PathTraversal {
                    path: PathBuf::from(raw_name),
                },
                ResolveError::NotADirectory => ExtractionError::FileExists {
                    path: lexical.clone(),
                },
                ResolveError::Io(e) => ExtractionError::Io(e),
            })?;
        Ok(SafePath::from_resolved(join(&resolved)))
    }

    /// Follows `target` as the OS would for a symlink located at `link`.
    ///
    /// Returns `Ok(())` if the chain stays inside the root, including when it
    /// dangles or runs through a file.
    pub(crate) fn follow_link_target(
        &self,
        link: &SafePath,
        target: &Path,
    ) -> std::result::Result<(), ResolveError> {
        let mut start = components(link.as_path());
        start.pop();
        match self.walk(start, target, true) {
            Ok(_) | Err(ResolveError::NotADirectory) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Looks up what currently occupies `path`, without following a final
    /// symlink.
    pub fn existing(&self, path: &SafePath) -> Result<Option<Node>> {
        self.node_at(path.as_path()).map_err(ExtractionError::Io)
    }

    /// Records that an entry now occupies `path`.
    ///
    /// Missing ancestors are recorded as directories, mirroring the parent
    /// directories the extractor creates.
    pub fn record(&mut self, path: &SafePath, node: Node) {
        for ancestor in path.as_path().ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.overlay
                .entry(ancestor.to_path_buf())
                .or_insert(Node::Directory);
        }
        self.overlay.insert(path.as_path().to_path_buf(), node);
    }

    /// Symlinks recorded so far, with their raw targets.
    pub fn recorded_symlinks(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.overlay.iter().filter_map(|(path, node)| match node {
            Node::Symlink(target) => Some((path.as_path(), target.as_path())),
            _ => None,
        })
    }

    fn node_at(&self, rel: &Path) -> std::io::Result<Option<Node>> {
        if rel.as_os_str().is_empty() {
            return Ok(Some(Node::Directory));
        }
        if let Some(node) = self.overlay.get(rel) {
            return Ok(Some(node.clone()));
        }
        let Some(root) = &self.root else {
            return Ok(None);
        };

        let full = root.as_path().join(rel);
        match std::fs::symlink_metadata(&full) {
            Ok(meta) if meta.file_type().is_symlink() => {
                Ok(Some(Node::Symlink(std::fs::read_link(&full)?)))
            }
            Ok(meta) if meta.is_dir() => Ok(Some(Node::Directory)),
            Ok(_) => Ok(Some(Node::File)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Resolves `rel` starting from the root-relative `start` directory.
    fn walk(
        &self,
        start: Vec<OsString>,
        rel: &Path,
        follow_last: bool,
    ) -> std::result::Result<Vec<OsString>, ResolveError> {
        let mut resolved = start;
        let mut pending = VecDeque::new();
        self.push_steps(&mut pending, &mut resolved, rel)?;
        let mut hops = 0;

        while let Some(step) = pending.pop_front() {
            let name = match step {
                Step::Parent => {
                    resolved.pop().ok_or(ResolveError::Escape)?;
                    continue;
                }
                Step::Name(name) => name,
            };

            resolved.push(name);
            let is_last = pending.is_empty();
            if is_last && !follow_last {
                break;
            }

            match self.node_at(&join(&resolved)).map_err(ResolveError::Io)? {
                Some(Node::Symlink(target)) => {
                    hops += 1;
                    if hops > MAX_SYMLINK_HOPS {
                        return Err(ResolveError::Loop);
                    }
                    resolved.pop();
                    let mut expanded = VecDeque::new();
                    self.push_steps(&mut expanded, &mut resolved, &target)?;
                    while let Some(step) = expanded.pop_back() {
                        pending.push_front(step);
                    }
                }
                Some(Node::File) if !is_last => return Err(ResolveError::NotADirectory),
                _ => {}
            }
        }

        Ok(resolved)
    }

    /// Appends the steps of `path` to `steps`. An absolute path resets
    /// `resolved` to the root, or escapes if it points elsewhere.
    fn push_steps(
        &self,
        steps: &mut VecDeque<Step>,
        resolved: &mut Vec<OsString>,
        path: &Path,
    ) -> std::result::Result<(), ResolveError> {
        let path = if path.is_absolute() {
            let root = self.root.as_ref().ok_or(ResolveError::Escape)?;
            let inside = path
                .strip_prefix(root.as_path())
                .map_err(|_| ResolveError::Escape)?;
            resolved.clear();
            inside
        } else {
            path
        };

        for component in path.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => steps.push_back(Step::Parent),
                Component::Normal(name) => steps.push_back(Step::Name(name.to_os_string())),
                Component::RootDir | Component::Prefix(_) => return Err(ResolveError::Escape),
            }
        }
        Ok(())
    }
}

fn components(path: &Path) -> Vec<OsString> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_os_string()),
            _ => None,
        })
        .collect()
}

fn join(parts: &[OsString]) -> PathBuf {
    parts.iter().collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_dest() -> (TempDir, DestDir) {
        let temp = TempDir::new().expect("failed to create temp dir");
        let dest = DestDir::new(temp.path()).expect("failed to create dest");
        (temp, dest)
    }

    fn safe(path: &str) -> SafePath {
        SafePath::from_resolved(PathBuf::from(path))
    }

    #[test]
    fn test_resolve_plain_name() {
        let resolver = PathResolver::new(None);
        let path = resolver.resolve("a/b/c.txt").unwrap();
        assert_eq!(path.as_path(), Path::new("a/b/c.txt"));
    }

    #[test]
    fn test_resolve_root_entry() {
        let resolver = PathResolver::new(None);
        assert!(resolver.resolve("./").unwrap().is_root());
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let resolver = PathResolver::new(None);
        let result = resolver.resolve("safe/../../etc/passwd");
        assert!(matches!(result, Err(ExtractionError::PathTraversal { .. })));
    }

    #[test]
    fn test_resolve_through_overlay_symlink() {
        let mut resolver = PathResolver::new(None);
        resolver.record(&safe("link"), Node::Symlink(PathBuf::from("real")));
        let path = resolver.resolve("link/file.txt").unwrap();
        assert_eq!(path.as_path(), Path::new("real/file.txt"));
    }

    #[test]
    fn test_resolve_escaping_overlay_symlink() {
        let mut resolver = PathResolver::new(None);
        resolver.record(&safe("up"), Node::Symlink(PathBuf::from("..")));
        let result = resolver.resolve("up/evil.txt");
        assert!(matches!(result, Err(ExtractionError::PathTraversal { .. })));
    }

    #[test]
    fn test_final_component_not_followed() {
        let mut resolver = PathResolver::new(None);
        resolver.record(&safe("link"), Node::Symlink(PathBuf::from("../outside")));
        let path = resolver.resolve("link").unwrap();
        assert_eq!(path.as_path(), Path::new("link"));
    }

    #[test]
    fn test_file_as_directory_is_conflict() {
        let mut resolver = PathResolver::new(None);
        resolver.record(&safe("a"), Node::File);
        let result = resolver.resolve("a/b");
        assert!(matches!(result, Err(ExtractionError::FileExists { .. })));
    }

    #[test]
    fn test_record_adds_parent_directories() {
        let mut resolver = PathResolver::new(None);
        resolver.record(&safe("a/b/c.txt"), Node::File);
        assert_eq!(resolver.existing(&safe("a")).unwrap(), Some(Node::Directory));
        assert_eq!(resolver.existing(&safe("a/b")).unwrap(), Some(Node::Directory));
        assert_eq!(resolver.existing(&safe("a/b/c.txt")).unwrap(), Some(Node::File));
    }

    #[test]
    fn test_symlink_loop_is_rejected() {
        let mut resolver = PathResolver::new(None);
        resolver.record(&safe("a"), Node::Symlink(PathBuf::from("b")));
        resolver.record(&safe("b"), Node::Symlink(PathBuf::from("a")));
        let result = resolver.resolve("a/file");
        assert!(matches!(result, Err(ExtractionError::PathTraversal { .. })));
    }

    #[test]
    fn test_link_to_dot_then_parent_escapes() {
        let mut resolver = PathResolver::new(None);
        resolver.record(&safe("b"), Node::Symlink(PathBuf::from(".")));
        let result = resolver.follow_link_target(&safe("a"), Path::new("b/.."));
        assert!(matches!(result, Err(ResolveError::Escape)));
    }

    #[test]
    fn test_existing_on_disk() {
        let (temp, dest) = create_test_dest();
        fs::create_dir(temp.path().join("dir")).unwrap();
        fs::write(temp.path().join("file"), "x").unwrap();
        let resolver = PathResolver::new(Some(dest));

        assert_eq!(resolver.existing(&safe("dir")).unwrap(), Some(Node::Directory));
        assert_eq!(resolver.existing(&safe("file")).unwrap(), Some(Node::File));
        assert_eq!(resolver.existing(&safe("missing")).unwrap(), None);
    }

    #[test]
    #[cfg(unix)]
    fn test_disk_symlink_outside_root_rejected() {
        let (temp, dest) = create_test_dest();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("escape")).unwrap();
        let resolver = PathResolver::new(Some(dest));

        let result = resolver.resolve("escape/payload.sh");
        assert!(matches!(result, Err(ExtractionError::PathTraversal { .. })));
    }

    #[test]
    #[cfg(unix)]
    fn test_disk_symlink_absolute_inside_root() {
        let (temp, dest) = create_test_dest();
        fs::create_dir(temp.path().join("real")).unwrap();
        std::os::unix::fs::symlink(dest.as_path().join("real"), temp.path().join("alias")).unwrap();
        let resolver = PathResolver::new(Some(dest));

        let path = resolver.resolve("alias/x.txt").unwrap();
        assert_eq!(path.as_path(), Path::new("real/x.txt"));
    }
}
