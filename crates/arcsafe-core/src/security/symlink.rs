//! Symlink target validation.

use std::path::Component;
use std::path::Path;

use crate::ExtractionError;
use crate::Result;
use crate::security::path::PathResolver;
use crate::security::path::ResolveError;
use crate::types::SafePath;
use crate::types::SafeSymlink;

/// Validates that a symlink placed at `link` and pointing at `target` stays
/// inside the root.
///
/// Two passes run. The lexical pass places `target` next to `link` and
/// rejects it if `..` components climb above the root. The resolving pass
/// follows the target through symlinks known to `resolver`, which catches
/// chains such as a link to `b/..` where `b` is itself a link to `.`.
///
/// Links recorded after this one can still change what it resolves to, so
/// callers re-check every recorded link once the whole archive has been
/// walked (see [`verify_recorded_symlinks`]).
///
/// # Errors
///
/// - `InvalidEntryName` if the target is empty or contains a NUL byte
/// - `SymlinkEscape` if the target is absolute or resolves outside the root
///
/// # Examples
///
/// ```
/// use arcsafe_core::security::{PathResolver, validate_symlink};
/// use std::path::Path;
///
/// let resolver = PathResolver::new(None);
/// let link = resolver.resolve("lib/libfoo.so").unwrap();
///
/// assert!(validate_symlink(&resolver, &link, Path::new("libfoo.so.1")).is_ok());
/// assert!(validate_symlink(&resolver, &link, Path::new("../../etc/shadow")).is_err());
/// assert!(validate_symlink(&resolver, &link, Path::new("/etc/shadow")).is_err());
/// ```
pub fn validate_symlink(
    resolver: &PathResolver,
    link: &SafePath,
    target: &Path,
) -> Result<SafeSymlink> {
    let escape = || ExtractionError::SymlinkEscape {
        path: link.as_path().to_path_buf(),
        target: target.to_path_buf(),
    };

    if target.as_os_str().is_empty() {
        return Err(ExtractionError::InvalidEntryName {
            name: link.as_path().display().to_string(),
            reason: "empty symlink target",
        });
    }

    if target.as_os_str().as_encoded_bytes().contains(&0) {
        return Err(ExtractionError::InvalidEntryName {
            name: link.as_path().display().to_string(),
            reason: "symlink target contains a NUL byte",
        });
    }

    if target.is_absolute() || target.has_root() {
        return Err(escape());
    }

    let mut depth = link.as_path().components().count().saturating_sub(1);
    for component in target.components() {
        match component {
            Component::ParentDir => depth = depth.checked_sub(1).ok_or_else(escape)?,
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return Err(escape()),
        }
    }

    match resolver.follow_link_target(link, target) {
        Ok(()) | Err(ResolveError::Loop) => {}
        Err(ResolveError::Io(e)) => return Err(ExtractionError::Io(e)),
        Err(_) => return Err(escape()),
    }

    Ok(SafeSymlink::new(link.clone(), target.to_path_buf()))
}

/// Re-resolves every symlink the resolver has recorded.
///
/// Run after the last entry: a link that was safe when written may escape
/// once later entries add the links it runs through.
pub fn verify_recorded_symlinks(resolver: &PathResolver) -> Result<()> {
    let links: Vec<_> = resolver
        .recorded_symlinks()
        .map(|(link, target)| (link.to_path_buf(), target.to_path_buf()))
        .collect();

    for (link, target) in links {
        let safe = SafePath::from_resolved(link);
        match resolver.follow_link_target(&safe, &target) {
            Ok(()) | Err(ResolveError::Loop) => {}
            Err(ResolveError::Io(e)) => return Err(ExtractionError::Io(e)),
            Err(_) => {
                return Err(ExtractionError::SymlinkEscape {
                    path: safe.into_path_buf(),
                    target,
                });
            }
        }
    }
    Ok(())
}
