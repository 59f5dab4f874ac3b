//! Permission bit sanitizing.

/// Keeps only the rwx bits of an archive-supplied mode.
///
/// setuid, setgid and sticky are always dropped, as are any file-type bits
/// zip and tar store in the upper half.
///
/// # Examples
///
/// ```
/// use arcsafe_core::security::sanitize_permissions;
///
/// assert_eq!(sanitize_permissions(0o4755), 0o755);
/// assert_eq!(sanitize_permissions(0o100_644), 0o644);
/// ```
#[must_use]
pub const fn sanitize_permissions(mode: u32) -> u32 {
    mode & 0o777
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_setuid_setgid_sticky() {
        assert_eq!(sanitize_permissions(0o4755), 0o755);
        assert_eq!(sanitize_permissions(0o2755), 0o755);
        assert_eq!(sanitize_permissions(0o1777), 0o777);
        assert_eq!(sanitize_permissions(0o7777), 0o777);
    }

    #[test]
    fn test_strips_file_type_bits() {
        assert_eq!(sanitize_permissions(0o040_755), 0o755);
        assert_eq!(sanitize_permissions(0o120_777), 0o777);
    }

    #[test]
    fn test_plain_modes_unchanged() {
        assert_eq!(sanitize_permissions(0o644), 0o644);
        assert_eq!(sanitize_permissions(0o600), 0o600);
    }
}
