//! Threshold and extraction configuration.

use crate::settings;

/// Built-in entry count limit.
pub const DEFAULT_MAX_OBJECTS: u64 = 100_000;

/// Built-in cumulative uncompressed size limit (4 TiB).
pub const DEFAULT_MAX_SIZE: u64 = 4 * 1024 * 1024 * 1024 * 1024;

/// Built-in cumulative compression ratio limit.
pub const DEFAULT_MAX_RATIO: f64 = 100.0;

/// Resource limits applied while walking an archive.
///
/// Each limit is independent; `None` disables that check.
///
/// `ThresholdConfig::default()` takes every limit from the process-wide
/// defaults (see [`settings`](crate::settings)), so a caller that only cares
/// about one limit overrides just that one:
///
/// ```
/// use arcsafe_core::ThresholdConfig;
///
/// let config = ThresholdConfig::default().with_max_objects(Some(500));
/// assert_eq!(config.max_objects, Some(500));
///
/// let no_ratio = ThresholdConfig::default().with_max_ratio(None);
/// assert!(no_ratio.max_ratio.is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdConfig {
    /// Maximum number of entries, of any kind.
    pub max_objects: Option<u64>,

    /// Maximum cumulative uncompressed bytes.
    pub max_size: Option<u64>,

    /// Maximum cumulative uncompressed / compressed ratio.
    pub max_ratio: Option<f64>,
}

impl Default for ThresholdConfig {
    /// Returns the process-wide defaults, loading them on first use.
    fn default() -> Self {
        *settings::defaults()
    }
}

impl ThresholdConfig {
    /// The compiled-in limits: 100 000 objects, 4 TiB, ratio 100.
    #[must_use]
    pub const fn builtin() -> Self {
        Self {
            max_objects: Some(DEFAULT_MAX_OBJECTS),
            max_size: Some(DEFAULT_MAX_SIZE),
            max_ratio: Some(DEFAULT_MAX_RATIO),
        }
    }

    /// Disables every limit.
    ///
    /// Path safety checks still apply; only resource quotas are off.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_objects: None,
            max_size: None,
            max_ratio: None,
        }
    }

    /// Sets or clears the entry count limit.
    #[must_use]
    pub const fn with_max_objects(mut self, max: Option<u64>) -> Self {
        self.max_objects = max;
        self
    }

    /// Sets or clears the cumulative size limit.
    #[must_use]
    pub const fn with_max_size(mut self, max: Option<u64>) -> Self {
        self.max_size = max;
        self
    }

    /// Sets or clears the compression ratio limit.
    #[must_use]
    pub const fn with_max_ratio(mut self, max: Option<f64>) -> Self {
        self.max_ratio = max;
        self
    }
}

/// Options that change how entries are materialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Replace files and symlinks that already exist at an entry's target.
    ///
    /// When `false` (the default) any collision fails the call with
    /// [`ExtractionError::FileExists`](crate::ExtractionError::FileExists),
    /// including two entries of the same archive mapping to one path.
    /// Directories are never replaced by other kinds, whatever this says.
    pub allow_overwrite: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_limits() {
        let config = ThresholdConfig::builtin();
        assert_eq!(config.max_objects, Some(100_000));
        assert_eq!(config.max_size, Some(4_398_046_511_104));
        assert_eq!(config.max_ratio, Some(100.0));
    }

    #[test]
    fn test_unlimited() {
        let config = ThresholdConfig::unlimited();
        assert!(config.max_objects.is_none());
        assert!(config.max_size.is_none());
        assert!(config.max_ratio.is_none());
    }

    #[test]
    fn test_builder_overrides_single_limit() {
        let config = ThresholdConfig::builtin()
            .with_max_size(Some(1024))
            .with_max_ratio(None);
        assert_eq!(config.max_objects, Some(DEFAULT_MAX_OBJECTS));
        assert_eq!(config.max_size, Some(1024));
        assert!(config.max_ratio.is_none());
    }

    #[test]
    fn test_extract_options_default_denies_overwrite() {
        assert!(!ExtractOptions::default().allow_overwrite);
    }
}
