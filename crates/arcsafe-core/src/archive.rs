//! Builder front end for validation and extraction.

use std::path::PathBuf;

use crate::ExtractOptions;
use crate::ExtractionError;
use crate::ExtractionReport;
use crate::Result;
use crate::ThresholdConfig;
use crate::ValidationReport;

/// Builder for configuring a validate or extract call.
///
/// Limits that are never set come from the process-wide defaults; passing
/// `None` disables a limit.
///
/// # Examples
///
/// ```no_run
/// use arcsafe_core::ArchiveBuilder;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let report = ArchiveBuilder::new()
///     .archive("archive.tar.gz")
///     .destination("/tmp/output")
///     .max_objects(Some(10_000))
///     .max_ratio(None)
///     .extract()?;
/// println!("{} files", report.files_extracted);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ArchiveBuilder {
    archive_path: Option<PathBuf>,
    destination: Option<PathBuf>,
    max_objects: Option<Option<u64>>,
    max_size: Option<Option<u64>>,
    max_ratio: Option<Option<f64>>,
    options: ExtractOptions,
}

impl ArchiveBuilder {
    /// Creates a new `ArchiveBuilder`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the archive file path.
    #[must_use]
    pub fn archive(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive_path = Some(path.into());
        self
    }

    /// Sets the destination directory.
    ///
    /// Required for [`extract`](Self::extract). For
    /// [`validate`](Self::validate) it enables on-disk collision checks.
    #[must_use]
    pub fn destination(mut self, path: impl Into<PathBuf>) -> Self {
        self.destination = Some(path.into());
        self
    }

    /// Overrides the entry count limit.
    #[must_use]
    pub const fn max_objects(mut self, max: Option<u64>) -> Self {
        self.max_objects = Some(max);
        self
    }

    /// Overrides the cumulative size limit.
    #[must_use]
    pub const fn max_size(mut self, max: Option<u64>) -> Self {
        self.max_size = Some(max);
        self
    }

    /// Overrides the compression ratio limit.
    #[must_use]
    pub const fn max_ratio(mut self, max: Option<f64>) -> Self {
        self.max_ratio = Some(max);
        self
    }

    /// Allows existing files and symlinks to be replaced.
    #[must_use]
    pub const fn allow_overwrite(mut self, allow: bool) -> Self {
        self.options.allow_overwrite = allow;
        self
    }

    /// The limits this builder would apply.
    #[must_use]
    pub fn thresholds(&self) -> ThresholdConfig {
        let defaults = ThresholdConfig::default();
        ThresholdConfig {
            max_objects: self.max_objects.unwrap_or(defaults.max_objects),
            max_size: self.max_size.unwrap_or(defaults.max_size),
            max_ratio: self.max_ratio.unwrap_or(defaults.max_ratio),
        }
    }

    /// Validates the archive.
    ///
    /// # Errors
    ///
    /// Returns an error if no archive path was set, or if validation fails.
    pub fn validate(self) -> Result<ValidationReport> {
        let config = self.thresholds();
        let archive_path = Self::require(self.archive_path, "archive path not set")?;
        match self.destination {
            Some(dest) => crate::api::validate_into(archive_path, dest, &config, &self.options),
            None => crate::api::validate(archive_path, &config),
        }
    }

    /// Extracts the archive.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive path or destination is not set, or if
    /// extraction fails.
    pub fn extract(self) -> Result<ExtractionReport> {
        let config = self.thresholds();
        let archive_path = Self::require(self.archive_path, "archive path not set")?;
        let destination = Self::require(self.destination, "destination not set")?;
        crate::api::extract_with_options(archive_path, destination, &config, &self.options)
    }

    fn require(value: Option<PathBuf>, what: &str) -> Result<PathBuf> {
        value.ok_or_else(|| {
            ExtractionError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, what))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::test_utils::TarTestBuilder;
    use crate::test_utils::write_archive;
    use tempfile::TempDir;

    #[test]
    fn test_archive_builder() {
        let builder = ArchiveBuilder::new()
            .archive("test.tar")
            .destination("/tmp/test");

        assert!(builder.archive_path.is_some());
        assert!(builder.destination.is_some());
    }

    #[test]
    fn test_archive_builder_missing_path() {
        let result = ArchiveBuilder::new().destination("/tmp/test").extract();
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Io);
    }

    #[test]
    fn test_archive_builder_missing_destination() {
        let result = ArchiveBuilder::new().archive("test.tar").extract();
        assert!(result.is_err());
    }

    #[test]
    fn test_unset_limits_fall_back_to_defaults() {
        let defaults = ThresholdConfig::default();
        let config = ArchiveBuilder::new().max_ratio(None).thresholds();
        assert_eq!(config.max_objects, defaults.max_objects);
        assert_eq!(config.max_size, defaults.max_size);
        assert!(config.max_ratio.is_none());
    }

    #[test]
    fn test_builder_enforces_object_limit() {
        let temp = TempDir::new().unwrap();
        let data = TarTestBuilder::new()
            .add_file("a", b"1")
            .add_file("b", b"2")
            .add_file("c", b"3")
            .build();
        let path = write_archive(temp.path(), "three.tar", &data);

        let err = ArchiveBuilder::new()
            .archive(&path)
            .max_objects(Some(2))
            .max_ratio(None)
            .validate()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ObjectCountExceeded);

        let report = ArchiveBuilder::new()
            .archive(&path)
            .destination(temp.path().join("out"))
            .max_objects(Some(3))
            .max_ratio(None)
            .extract()
            .unwrap();
        assert_eq!(report.files_extracted, 3);
    }
}
