//! High-level public API for archive validation and extraction.

use std::path::Path;
use std::time::Instant;

use crate::ExtractOptions;
use crate::ExtractionReport;
use crate::Result;
use crate::ThresholdConfig;
use crate::ValidationReport;
use crate::extraction::DiscardSink;
use crate::extraction::DiskSink;
use crate::extraction::ExtractionEngine;
use crate::extraction::ExtractionJournal;
use crate::formats::open_archive;
use crate::security::EntryValidator;
use crate::security::PathResolver;
use crate::security::ThresholdEnforcer;
use crate::types::DestDir;

/// Checks an archive without writing anything.
///
/// Every entry is run through the same path, entry type, collision and
/// quota checks as [`extract`], and file contents are decompressed and
/// discarded to measure their actual size. Success means `extract` under the
/// same thresholds into an empty destination would succeed too.
///
/// # Errors
///
/// Returns the first error hit; see [`ExtractionError`](crate::ExtractionError).
///
/// # Examples
///
/// ```no_run
/// use arcsafe_core::ThresholdConfig;
/// use arcsafe_core::validate;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let report = validate("upload.zip", &ThresholdConfig::default())?;
/// println!("{} entries, {} bytes", report.entries, report.uncompressed_bytes);
/// # Ok(())
/// # }
/// ```
pub fn validate<P: AsRef<Path>>(
    archive_path: P,
    config: &ThresholdConfig,
) -> Result<ValidationReport> {
    run_validation(archive_path.as_ref(), None, config, &ExtractOptions::default())
}

/// Checks an archive against an existing destination without writing.
///
/// Like [`validate`], but collisions with files already under `output_dir`
/// and symlinks already on disk are taken into account.
///
/// # Errors
///
/// As [`validate`], plus `Io` if `output_dir` is not an existing directory.
pub fn validate_into<P: AsRef<Path>, Q: AsRef<Path>>(
    archive_path: P,
    output_dir: Q,
    config: &ThresholdConfig,
    options: &ExtractOptions,
) -> Result<ValidationReport> {
    let dest = DestDir::new(output_dir)?;
    run_validation(archive_path.as_ref(), Some(dest), config, options)
}

fn run_validation(
    archive_path: &Path,
    root: Option<DestDir>,
    config: &ThresholdConfig,
    options: &ExtractOptions,
) -> Result<ValidationReport> {
    tracing::info!(archive = %archive_path.display(), "validating archive");

    let mut archive = open_archive(archive_path)?;
    let validator = EntryValidator::new(
        PathResolver::new(root),
        ThresholdEnforcer::new(*config, archive.ratio_basis()),
        options,
    );
    let mut engine = ExtractionEngine::new(validator, DiscardSink);
    let summary = engine.run(&mut *archive)?;

    let report = ValidationReport::new(
        archive.format_name(),
        summary.totals,
        summary.compressed_basis,
    );
    tracing::info!(
        archive = %archive_path.display(),
        format = report.format,
        entries = report.entries,
        bytes = report.uncompressed_bytes,
        "archive validated"
    );
    Ok(report)
}

/// Extracts an archive to the specified output directory.
///
/// The archive format is detected from its contents. `output_dir` is created
/// if missing. Existing files are never replaced; see
/// [`extract_with_options`] to allow that.
///
/// On failure everything this call created is removed again, including
/// `output_dir` if it did not exist before.
///
/// # Errors
///
/// Returns an error if:
/// - the archive cannot be opened or its format is not recognized
/// - an entry name or symlink target would escape `output_dir`
/// - a quota is exceeded
/// - an I/O operation fails
///
/// # Examples
///
/// ```no_run
/// use arcsafe_core::ThresholdConfig;
/// use arcsafe_core::extract;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ThresholdConfig::default().with_max_objects(Some(1000));
/// let report = extract("archive.tar.gz", "/tmp/output", &config)?;
/// println!("Extracted {} files", report.files_extracted);
/// # Ok(())
/// # }
/// ```
pub fn extract<P: AsRef<Path>, Q: AsRef<Path>>(
    archive_path: P,
    output_dir: Q,
    config: &ThresholdConfig,
) -> Result<ExtractionReport> {
    extract_with_options(archive_path, output_dir, config, &ExtractOptions::default())
}

/// Extracts an archive with explicit [`ExtractOptions`].
///
/// # Errors
///
/// As [`extract`].
pub fn extract_with_options<P: AsRef<Path>, Q: AsRef<Path>>(
    archive_path: P,
    output_dir: Q,
    config: &ThresholdConfig,
    options: &ExtractOptions,
) -> Result<ExtractionReport> {
    let archive_path = archive_path.as_ref();
    let output_dir = output_dir.as_ref();
    let start = Instant::now();
    tracing::info!(
        archive = %archive_path.display(),
        dest = %output_dir.display(),
        "extracting archive"
    );

    let mut archive = open_archive(archive_path)?;

    // Dropping the journal on an early return removes a freshly created root.
    let mut journal = ExtractionJournal::new();
    journal.create_dir_all(output_dir)?;
    let dest = DestDir::new(output_dir)?;

    let validator = EntryValidator::new(
        PathResolver::new(Some(dest.clone())),
        ThresholdEnforcer::new(*config, archive.ratio_basis()),
        options,
    );
    let mut engine = ExtractionEngine::new(validator, DiskSink::new(dest, journal));
    let summary = engine.run(&mut *archive)?;

    let report = ExtractionReport {
        files_extracted: summary.files,
        directories_created: summary.directories,
        symlinks_created: summary.symlinks,
        bytes_written: summary.bytes_written,
        duration: start.elapsed(),
    };
    tracing::info!(
        archive = %archive_path.display(),
        files = report.files_extracted,
        directories = report.directories_created,
        symlinks = report.symlinks_created,
        bytes = report.bytes_written,
        elapsed_ms = report.duration.as_millis(),
        "archive extracted"
    );
    Ok(report)
}
